//! Orchestrates a backend plugin export: resolve what gets embedded, copy
//! the publishable files for the root package and every embedded package,
//! rewrite the descriptor for runtime, install production dependencies,
//! check the installed tree for shared-package leakage and native addons,
//! and finally make sure the result actually loads.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use plugin_errors::ExportError;
use plugin_lockfiles::{split_name_specifier, Lockfile, YARN_LOCKFILE_NAME};

use crate::{
    customizer::{self, CustomizeContext},
    descriptor::{embedded_slug, DependencyMap, PackageDescriptor},
    embedding::{self, ModuleResolver, ResolvedEmbedded},
    lockfile,
    module_loader::ModuleLoader,
    native_scan,
    packager,
    shared_rules::SharedPackagesRules,
    task_runner::{self, Task},
    workspace::WorkspaceIndex,
};

pub struct BackendExportOptions<'a> {
    pub package_dir: &'a Path,
    pub monorepo_root: &'a Path,
    pub workspace_globs: &'a [String],
    pub embed_seeds: Vec<String>,
    pub shared: SharedPackagesRules,
    pub resolver: &'a dyn ModuleResolver,
    pub module_loader: Option<&'a dyn ModuleLoader>,
    pub allow_native_packages: Vec<String>,
    pub suppress_native_packages: Vec<String>,
    pub ignore_version_check: bool,
    /// skip the `yarn install` step (and, with it, the lockfile-leakage and
    /// installed-tree native scan, which both need a real installed tree)
    pub skip_install: bool,
}

#[derive(Debug)]
pub struct BackendExportReport {
    pub embedded: Vec<ResolvedEmbedded>,
    pub unused_seeds: Vec<String>,
}

pub fn export_backend(opts: BackendExportOptions) -> Result<BackendExportReport, ExportError> {
    info!(package = %opts.package_dir.display(), "starting backend export");

    let root_descriptor = PackageDescriptor::read(opts.package_dir.join("package.json"))?;
    let output_dir = opts.package_dir.join("dist-dynamic");

    debug!("building workspace index");
    let workspace = WorkspaceIndex::build(opts.monorepo_root, opts.workspace_globs)?;

    debug!(seeds = ?opts.embed_seeds, "resolving embedded packages");
    let resolution = embedding::resolve_embedded(
        opts.package_dir,
        &root_descriptor,
        opts.embed_seeds,
        &workspace,
        opts.resolver,
        opts.ignore_version_check,
    )?;
    if !resolution.unused_seeds.is_empty() {
        warn!(unused = ?resolution.unused_seeds, "embed seeds never matched a dependency");
    }

    fs::create_dir_all(&output_dir)?;
    packager::package_into(opts.package_dir, &output_dir, &root_descriptor)?;

    let mut embedded_descriptors = Vec::with_capacity(resolution.resolved.len());
    for embedded in &resolution.resolved {
        let descriptor = PackageDescriptor::read(embedded.dir.join("package.json"))?;
        let slug = embedded_slug(&embedded.package_name);
        let dest = output_dir.join("embedded").join(&slug);
        fs::create_dir_all(&dest)?;
        packager::package_into(&embedded.dir, &dest, &descriptor)?;
        embedded_descriptors.push(descriptor);
    }

    let mut descriptor = root_descriptor;
    let ctx = CustomizeContext {
        workspace: &workspace,
        shared: &opts.shared,
        embedded: &resolution.resolved,
        rename_to_dynamic: true,
        additional_overrides: DependencyMap::new(),
        additional_resolutions: DependencyMap::new(),
    };
    customizer::customize(&mut descriptor, &ctx, None)?;
    customizer::hoist_peer_dependencies(&mut descriptor, &embedded_descriptors)?;

    lockfile::ensure_present(&output_dir, opts.monorepo_root)?;
    descriptor.write(output_dir.join("package.json"))?;

    if !opts.skip_install {
        install_production_dependencies(&output_dir)?;

        let lockfile_path = output_dir.join(YARN_LOCKFILE_NAME);
        let installed_lockfile = lockfile::load(&lockfile_path)?;
        check_shared_leakage(installed_lockfile.as_ref(), &opts.shared)?;

        native_scan::scan_installed_tree(
            &output_dir.join("node_modules"),
            &opts.allow_native_packages,
            &opts.suppress_native_packages,
        )?;
    }

    if let Some(loader) = opts.module_loader {
        let entrypoint = descriptor
            .main()
            .map(|m| output_dir.join(m))
            .unwrap_or_else(|| output_dir.join("index.js"));
        loader.validate(&entrypoint)?;
    }

    info!(embedded = resolution.resolved.len(), "backend export complete");

    Ok(BackendExportReport {
        embedded: resolution.resolved,
        unused_seeds: resolution.unused_seeds,
    })
}

fn install_production_dependencies(output_dir: &Path) -> Result<(), ExportError> {
    let task = Task::new("install", "yarn", output_dir.to_path_buf())
        .arg("install")
        .arg("--production")
        .arg("--frozen-lockfile");
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(task_runner::run_all(vec![task]))?;
    Ok(())
}

/// A shared package is host-provided and must never end up in the installed
/// tree; if the lock file still resolved one, `peerDependencies` didn't keep
/// it out and the caller needs to either embed it or drop it as a dependency.
fn check_shared_leakage(installed: &dyn Lockfile, shared: &SharedPackagesRules) -> Result<(), ExportError> {
    let mut offenders: Vec<String> = installed
        .keys()
        .iter()
        .map(|key| split_name_specifier(key).0.to_string())
        .filter(|name| shared.is_shared(name))
        .collect();
    offenders.sort();
    offenders.dedup();

    if offenders.is_empty() {
        Ok(())
    } else {
        let suggestions = offenders.join(", ");
        Err(ExportError::SharedPackageLeakage {
            offenders: offenders.join(", "),
            suggestions,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use crate::{embedding::NodeModulesResolver, module_loader::FakeModuleLoader};

    use super::*;

    fn write_package(dir: &Path, json: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("package.json"), json).unwrap();
    }

    fn base_options<'a>(
        package_dir: &'a Path,
        monorepo_root: &'a Path,
        shared: SharedPackagesRules,
        resolver: &'a dyn ModuleResolver,
    ) -> BackendExportOptions<'a> {
        BackendExportOptions {
            package_dir,
            monorepo_root,
            workspace_globs: &[],
            embed_seeds: Vec::new(),
            shared,
            resolver,
            module_loader: None,
            allow_native_packages: Vec::new(),
            suppress_native_packages: Vec::new(),
            ignore_version_check: false,
            skip_install: true,
        }
    }

    #[test]
    fn exports_root_package_with_no_embedded_dependencies() {
        let monorepo = tempdir().unwrap();
        let package_dir = monorepo.path().join("plugins/foo-backend");
        write_package(
            &package_dir,
            r#"{"name": "@x/foo-backend", "version": "1.0.0", "main": "dist/index.js", "files": ["dist"]}"#,
        );
        fs::create_dir_all(package_dir.join("dist")).unwrap();
        fs::write(package_dir.join("dist/index.js"), "module.exports = {}").unwrap();
        fs::write(monorepo.path().join("yarn.lock"), "").unwrap();

        let shared = SharedPackagesRules::from_cli(&[]).unwrap();
        let mut opts = base_options(&package_dir, monorepo.path(), shared, &NodeModulesResolver);
        let workspace_globs = ["plugins/*".to_string()];
        opts.workspace_globs = &workspace_globs;
        opts.module_loader = Some(&FakeModuleLoader { should_fail: false });
        let report = export_backend(opts).unwrap();

        assert!(report.embedded.is_empty());
        assert!(package_dir.join("dist-dynamic/package.json").is_file());
        assert!(package_dir.join("dist-dynamic/dist/index.js").is_file());
        let written = PackageDescriptor::read(package_dir.join("dist-dynamic/package.json")).unwrap();
        assert_eq!(written.name(), "@x/foo-backend-dynamic");
    }

    #[test]
    fn module_loader_failure_is_propagated() {
        let monorepo = tempdir().unwrap();
        let package_dir = monorepo.path().join("plugins/foo-backend");
        write_package(
            &package_dir,
            r#"{"name": "@x/foo-backend", "version": "1.0.0", "main": "dist/index.js"}"#,
        );
        fs::create_dir_all(package_dir.join("dist")).unwrap();
        fs::write(package_dir.join("dist/index.js"), "module.exports = {}").unwrap();
        fs::write(monorepo.path().join("yarn.lock"), "").unwrap();

        let shared = SharedPackagesRules::from_cli(&[]).unwrap();
        let mut opts = base_options(&package_dir, monorepo.path(), shared, &NodeModulesResolver);
        opts.module_loader = Some(&FakeModuleLoader { should_fail: true });
        let err = export_backend(opts).unwrap_err();

        assert!(matches!(err, ExportError::InvalidPluginEntrypoint { .. }));
    }

    #[test]
    fn shared_leakage_is_detected_from_the_installed_lock_file() {
        let contents = "# yarn lockfile v1\n\n@backstage/core-plugin-api@^1.0.0:\n  version \"1.0.0\"\n";
        let lockfile = plugin_lockfiles::parse(contents).unwrap();
        let shared = SharedPackagesRules::from_cli(&[]).unwrap();

        let err = check_shared_leakage(lockfile.as_ref(), &shared).unwrap_err();
        assert!(matches!(err, ExportError::SharedPackageLeakage { .. }));
    }

    #[test]
    fn no_leakage_when_installed_tree_has_no_shared_packages() {
        let contents = "# yarn lockfile v1\n\nlodash@^4.0.0:\n  version \"4.17.21\"\n";
        let lockfile = plugin_lockfiles::parse(contents).unwrap();
        let shared = SharedPackagesRules::from_cli(&[]).unwrap();

        check_shared_leakage(lockfile.as_ref(), &shared).unwrap();
    }
}
