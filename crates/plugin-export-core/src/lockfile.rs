//! Ensures the exported package has a lock file: copies the nearest ancestor
//! lock file into the export output when one isn't already present, and
//! exposes the parsed form so other components can look up embedded
//! package entries by name.

use std::{
    fs,
    path::{Path, PathBuf},
};

use plugin_errors::ExportError;
use plugin_lockfiles::{parse, Lockfile, YARN_LOCKFILE_NAME};

pub fn find_nearest(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(YARN_LOCKFILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

pub fn ensure_present(export_dir: &Path, monorepo_root: &Path) -> Result<PathBuf, ExportError> {
    let dest = export_dir.join(YARN_LOCKFILE_NAME);
    if dest.is_file() {
        return Ok(dest);
    }
    let nearest = find_nearest(monorepo_root).ok_or_else(|| ExportError::LockFileMissing {
        dir: monorepo_root.display().to_string(),
    })?;
    fs::copy(&nearest, &dest)?;
    Ok(dest)
}

pub fn load(path: &Path) -> Result<Box<dyn Lockfile>, ExportError> {
    let contents = fs::read_to_string(path)?;
    parse(&contents)
        .map_err(|e| ExportError::LockFileMalformed(format!("lock file at {} is unreadable: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn finds_lockfile_in_ancestor_directory() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("yarn.lock"), "").unwrap();
        let nested = root.path().join("packages/foo");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_nearest(&nested), Some(root.path().join("yarn.lock")));
    }

    #[test]
    fn ensure_present_copies_when_missing() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("yarn.lock"), "foo@^1.0.0:\n  version \"1.0.0\"\n").unwrap();
        let export_dir = tempdir().unwrap();

        let dest = ensure_present(export_dir.path(), root.path()).unwrap();
        assert!(dest.is_file());
    }

    #[test]
    fn missing_lockfile_is_fatal() {
        let root = tempdir().unwrap();
        let export_dir = tempdir().unwrap();
        let err = ensure_present(export_dir.path(), root.path()).unwrap_err();
        assert!(matches!(err, ExportError::LockFileMissing { .. }));
    }
}
