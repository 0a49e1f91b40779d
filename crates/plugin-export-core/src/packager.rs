//! Copies the publishable subset of a package directory into the export
//! output, the same rule npm pack itself applies: honor `files` when present,
//! always keep the handful of conventional root files, never touch
//! `node_modules`.

use std::path::Path;

use plugin_errors::ExportError;

use crate::descriptor::PackageDescriptor;

pub fn package_into(src: &Path, dst: &Path, descriptor: &PackageDescriptor) -> Result<(), ExportError> {
    plugin_fs::copy_publishable_subset(src, dst, &descriptor.files())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn packages_respect_files_allowlist() {
        let src = tempdir().unwrap();
        fs::write(src.path().join("package.json"), r#"{"name":"x"}"#).unwrap();
        fs::create_dir_all(src.path().join("dist")).unwrap();
        fs::write(src.path().join("dist/index.js"), "module.exports = {}").unwrap();
        fs::write(src.path().join("internal-notes.md"), "private").unwrap();

        let descriptor = PackageDescriptor::from_str(r#"{"name": "x", "files": ["dist"]}"#).unwrap();
        let dst = tempdir().unwrap();
        package_into(src.path(), dst.path(), &descriptor).unwrap();

        assert!(dst.path().join("package.json").is_file());
        assert!(dst.path().join("dist/index.js").is_file());
        assert!(!dst.path().join("internal-notes.md").exists());
    }
}
