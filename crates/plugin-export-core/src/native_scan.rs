//! Detects native (compiled) modules in an installed dependency tree. Backend
//! exports forbid these outright since the host process can't load a native
//! addon built for a different Node ABI across a dynamic boundary, unless the
//! caller explicitly allows or suppresses the offending package by name.

use std::{
    fs,
    path::{Path, PathBuf},
};

use plugin_errors::ExportError;

use crate::descriptor::PackageDescriptor;

const NATIVE_MARKERS: &[&str] = &["binding.gyp"];
const NATIVE_SCRIPT_HOOKS: &[&str] = &["install", "preinstall"];

/// A package is native if it declares `gypfile: true`, carries a
/// `binding.gyp` build recipe, or shells out to node-gyp/prebuild-install
/// from an install hook.
pub fn package_is_native(dir: &Path, descriptor: &PackageDescriptor) -> bool {
    if descriptor.gypfile() {
        return true;
    }
    if NATIVE_MARKERS.iter().any(|marker| dir.join(marker).is_file()) {
        return true;
    }
    let scripts = descriptor.scripts();
    NATIVE_SCRIPT_HOOKS
        .iter()
        .filter_map(|hook| scripts.get(*hook))
        .any(|script| script.contains("node-gyp") || script.contains("prebuild-install"))
}

/// Walks an installed `node_modules` tree (one level, plus one level of scope
/// directories) looking for native packages. A name in `suppress` gets a stub
/// written in its place instead of failing the export; a name in `allow`
/// passes through unsuppressed; anything else is a hard failure.
pub fn scan_installed_tree(node_modules: &Path, allow: &[String], suppress: &[String]) -> Result<(), ExportError> {
    let mut offenders = Vec::new();

    for (name, dir) in installed_packages(node_modules) {
        let Ok(descriptor) = PackageDescriptor::read(dir.join("package.json")) else {
            continue;
        };
        if !package_is_native(&dir, &descriptor) {
            continue;
        }
        if suppress.iter().any(|s| s == &name) {
            materialize_stub(&dir, &name)?;
        } else if !allow.iter().any(|a| a == &name) {
            offenders.push(name);
        }
    }

    if offenders.is_empty() {
        Ok(())
    } else {
        Err(ExportError::NativePackageForbidden {
            packages: offenders.join(", "),
        })
    }
}

fn installed_packages(node_modules: &Path) -> Vec<(String, PathBuf)> {
    let mut found = Vec::new();
    let Ok(entries) = fs::read_dir(node_modules) else {
        return found;
    };

    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        if let Some(scope) = file_name.strip_prefix('@') {
            let _ = scope;
            let Ok(scoped_entries) = fs::read_dir(&path) else {
                continue;
            };
            for scoped_entry in scoped_entries.filter_map(Result::ok) {
                let scoped_path = scoped_entry.path();
                if scoped_path.is_dir() {
                    let name = format!("{file_name}/{}", scoped_entry.file_name().to_string_lossy());
                    found.push((name, scoped_path));
                }
            }
        } else {
            found.push((file_name, path));
        }
    }

    found
}

/// Replaces a suppressed native package's entrypoint with a stub that throws
/// on first use, so the plugin still loads but any call into the native
/// addon fails loudly instead of crashing the host process.
pub fn materialize_stub(dir: &Path, name: &str) -> Result<(), ExportError> {
    let stub = format!(
        "module.exports = new Proxy({{}}, {{ get() {{ \
         throw new Error('native package {name} was suppressed during dynamic export'); \
         }} }});\n"
    );
    fs::write(dir.join("index.js"), stub)?;

    let mut descriptor = PackageDescriptor::read(dir.join("package.json"))?;
    descriptor.set_string("main", "index.js");
    descriptor.write(dir.join("package.json"))?;
    Ok(())
}
