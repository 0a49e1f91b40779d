//! Yarn Berry (v2+) lockfiles are valid YAML, so parsing is a direct
//! `serde_yaml_ng` deserialization rather than a hand-written grammar.

use std::collections::HashMap;

use serde::Deserialize;

use crate::{split_name_specifier, Error, Lockfile, LockfileEntry};

#[derive(Debug, Deserialize)]
struct RawEntry {
    version: String,
    #[serde(default)]
    dependencies: HashMap<String, String>,
}

#[derive(Debug, Default, Clone)]
pub struct BerryLockfile {
    entries: HashMap<String, LockfileEntry>,
}

impl BerryLockfile {
    pub fn parse(contents: &str) -> Result<Self, Error> {
        let raw: HashMap<String, RawEntry> = serde_yaml_ng::from_str(contents)?;
        let mut entries = HashMap::new();
        for (header, entry) in raw {
            if header == "__metadata" {
                continue;
            }
            let lockfile_entry = LockfileEntry {
                version: entry.version,
                dependencies: entry.dependencies,
            };
            for key in header.split(", ") {
                entries.insert(key.trim().to_string(), lockfile_entry.clone());
            }
        }
        Ok(BerryLockfile { entries })
    }
}

impl Lockfile for BerryLockfile {
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

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
__metadata:
  version: 6
  cacheKey: 8

"lodash@npm:^4.17.0, lodash@npm:^4.0.0":
  version: 4.17.21
  resolution: "lodash@npm:4.17.21"
  dependencies:
    react: "npm:^18.2.0"
  checksum: deadbeef
  languageName: node
  linkType: hard
"#;

    #[test]
    fn parses_multi_alias_header_and_dependencies() {
        let lockfile = BerryLockfile::parse(SAMPLE).unwrap();
        let a = lockfile.entry("lodash@npm:^4.17.0").unwrap();
        let b = lockfile.entry("lodash@npm:^4.0.0").unwrap();
        assert_eq!(a.version, "4.17.21");
        assert_eq!(b.version, "4.17.21");
        assert_eq!(a.dependencies.get("react").unwrap(), "npm:^18.2.0");
    }

    #[test]
    fn ignores_metadata_block() {
        let lockfile = BerryLockfile::parse(SAMPLE).unwrap();
        assert!(lockfile.entry("__metadata").is_none());
    }
}
