#![deny(clippy::all)]

//! Parsing and enumeration for the lock file formats this tool cares about:
//! yarn classic (v1) and yarn berry (v2+). Everything here exists to answer
//! two questions for the Backend/Frontend Exporter: "what package versions
//! did the installer actually resolve" (the shared-leakage check) and "what
//! does this installed package depend on" (leakage suggestion derivation).

mod berry;
mod error;
mod yarn1;

use std::collections::HashMap;

pub use berry::BerryLockfile;
pub use error::Error;
pub use yarn1::Yarn1Lockfile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockfileEntry {
    pub version: String,
    pub dependencies: HashMap<String, String>,
}

/// A parsed, enumerable lock file. Keys are of the form `<name>@<specifier>`.
pub trait Lockfile {
    fn keys(&self) -> Vec<&str>;
    fn entry(&self, key: &str) -> Option<&LockfileEntry>;

    /// All entries whose package name matches `name`, i.e. whose key starts with
    /// `<name>@`.
    fn entries_for_package(&self, name: &str) -> Vec<(&str, &LockfileEntry)> {
        self.keys()
            .into_iter()
            .filter(|key| split_name_specifier(key).0 == name)
            .filter_map(|key| self.entry(key).map(|entry| (key, entry)))
            .collect()
    }
}

/// Which lockfile family is present, mirroring the CLI's yarn-version detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockfileFormat {
    Yarn1,
    Berry,
}

pub const YARN_LOCKFILE_NAME: &str = "yarn.lock";

pub fn detect_format(contents: &str) -> LockfileFormat {
    if contents.lines().take(5).any(|l| l.trim() == "__metadata:") {
        LockfileFormat::Berry
    } else {
        LockfileFormat::Yarn1
    }
}

pub fn parse(contents: &str) -> Result<Box<dyn Lockfile>, Error> {
    match detect_format(contents) {
        LockfileFormat::Yarn1 => Ok(Box::new(Yarn1Lockfile::parse(contents)?)),
        LockfileFormat::Berry => Ok(Box::new(BerryLockfile::parse(contents)?)),
    }
}

/// Splits a lockfile key of the form `<name>@<specifier>` on the *last* `@`,
/// since scoped package names (`@scope/name@^1.0.0`) contain a leading `@`
/// that is not the separator.
pub fn split_name_specifier(key: &str) -> (&str, &str) {
    let search_from = if key.starts_with('@') { 1 } else { 0 };
    match key[search_from..].find('@') {
        Some(offset) => {
            let at = search_from + offset;
            (&key[..at], &key[at + 1..])
        }
        None => (key, ""),
    }
}
