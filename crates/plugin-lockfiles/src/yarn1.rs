//! Hand-rolled parser for yarn.lock classic (v1, "syml") format.
//!
//! The grammar is small enough not to need a parser generator: the file is a
//! sequence of blocks separated by blank lines. Each block starts with one or
//! more comma-separated `"name@specifier"` keys on an unindented line ending in
//! `:`, followed by 2-space-indented `key value` pairs, with `dependencies:` and
//! `optionalDependencies:` introducing a further 4-space-indented sub-block of
//! `name "specifier"` pairs.

use std::collections::HashMap;

use crate::{split_name_specifier, Error, Lockfile, LockfileEntry};

#[derive(Debug, Default, Clone)]
pub struct Yarn1Lockfile {
    /// keyed by each individual `"name@specifier"` alias found in a block header
    entries: HashMap<String, LockfileEntry>,
}

impl Yarn1Lockfile {
    pub fn parse(contents: &str) -> Result<Self, Error> {
        let mut lockfile = Yarn1Lockfile::default();
        let mut lines = contents.lines().peekable();

        while let Some(line) = lines.next() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with(char::is_whitespace) {
                // stray indented line outside of a block header; ignore defensively
                continue;
            }

            let header = line
                .trim_end()
                .strip_suffix(':')
                .ok_or_else(|| Error::MalformedYarn1(format!("expected block header, got: {line}")))?;
            let keys: Vec<String> = header
                .split(", ")
                .map(|raw| raw.trim().trim_matches('"').to_string())
                .collect();

            let mut version = None;
            let mut dependencies = HashMap::new();

            while let Some(next) = lines.peek() {
                if next.trim().is_empty() {
                    lines.next();
                    break;
                }
                if !next.starts_with(' ') {
                    // unindented line: start of the next block header
                    break;
                }
                let body = lines.next().unwrap();
                let trimmed = body.trim_start();
                let indent = body.len() - trimmed.len();

                if indent == 2 {
                    if trimmed == "dependencies:" || trimmed == "optionalDependencies:" {
                        while let Some(dep_line) = lines.peek() {
                            let dep_trimmed = dep_line.trim_start();
                            let dep_indent = dep_line.len() - dep_trimmed.len();
                            if dep_indent < 4 || dep_trimmed.is_empty() {
                                break;
                            }
                            let dep_line = lines.next().unwrap();
                            if let Some((name, spec)) = parse_kv_line(dep_line.trim_start()) {
                                dependencies.insert(name, spec);
                            }
                        }
                    } else if let Some((name, v)) = parse_kv_line(trimmed) {
                        if name == "version" {
                            version = Some(v);
                        }
                    }
                }
            }

            let version = version.ok_or_else(|| {
                Error::MalformedYarn1(format!("block {header} missing a version field"))
            })?;
            let entry = LockfileEntry {
                version,
                dependencies,
            };
            for key in keys {
                lockfile.entries.insert(key, entry.clone());
            }
        }

        Ok(lockfile)
    }
}

/// Parses `name "value"` or `name value` into (name, value), stripping quotes.
fn parse_kv_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    let split_at = line.find(' ')?;
    let (name, rest) = line.split_at(split_at);
    let value = rest.trim().trim_matches('"').to_string();
    Some((name.trim_matches('"').to_string(), value))
}

impl Lockfile for Yarn1Lockfile {
    fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    fn entry(&self, key: &str) -> Option<&LockfileEntry> {
        self.entries.get(key)
    }
}

pub fn package_name(key: &str) -> &str {
    split_name_specifier(key).0
}
