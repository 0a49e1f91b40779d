//! Enumerates sibling packages of a monorepo: name -> (version, directory).
//! Driven by the root `package.json`'s `workspaces` glob list (or a
//! `pnpm-workspace.yaml`-style list, when present), matched with `wax`.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use plugin_errors::ExportError;
use wax::{Glob, Pattern};

use crate::descriptor::PackageDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceEntry {
    pub name: String,
    pub version: String,
    pub dir: PathBuf,
}

#[derive(Debug, Default, Clone)]
pub struct WorkspaceIndex {
    by_name: HashMap<String, WorkspaceEntry>,
}

impl WorkspaceIndex {
    pub fn build(root: &Path, globs: &[String]) -> Result<Self, ExportError> {
        let mut index = WorkspaceIndex::default();
        let compiled: Vec<Glob> = globs
            .iter()
            .filter_map(|pattern| Glob::new(pattern).ok())
            .collect();

        for entry in walkdir::WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.file_name() != "package.json" {
                continue;
            }
            let dir = entry.path().parent().unwrap_or(root);
            if dir == root {
                continue;
            }
            let Ok(relative) = dir.strip_prefix(root) else {
                continue;
            };
            let Some(relative_str) = relative.to_str() else {
                continue;
            };
            if relative_str.split(std::path::MAIN_SEPARATOR).any(|c| c == "node_modules") {
                continue;
            }
            if !compiled.iter().any(|g| g.is_match(relative_str)) {
                continue;
            }

            let descriptor = PackageDescriptor::read(entry.path())?;
            let name = descriptor.name().to_string();
            if name.is_empty() {
                continue;
            }
            if let Some(existing) = index.by_name.get(&name) {
                return Err(ExportError::DuplicateMonorepoPackage {
                    name: format!("{name} (at both {} and {})", existing.dir.display(), dir.display()),
                });
            }
            index.by_name.insert(
                name.clone(),
                WorkspaceEntry {
                    name,
                    version: descriptor.version().to_string(),
                    dir: dir.to_path_buf(),
                },
            );
        }

        Ok(index)
    }

    pub fn get(&self, name: &str) -> Option<&WorkspaceEntry> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
