//! Orchestrates a frontend plugin export. Frontend plugins don't embed
//! sibling packages the way backend plugins do (the host's module federation
//! runtime resolves shared packages instead), so this pipeline is mostly the
//! packaging and descriptor customization steps plus the asset producers
//! that emit Scalprum / module-federation metadata — gated by the CLI flags
//! that chose which of those to generate.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde_json::Value;
use tracing::{debug, info};

use plugin_errors::ExportError;

use crate::{
    asset_producer::{self, AssetProducer, ModuleFederationAssetProducer, ScalprumAssetProducer},
    customizer::{self, CustomizeContext},
    descriptor::{DependencyMap, PackageDescriptor},
    lockfile,
    packager,
    shared_rules::SharedPackagesRules,
    workspace::WorkspaceIndex,
};

pub struct FrontendExportOptions<'a> {
    pub package_dir: &'a Path,
    pub monorepo_root: &'a Path,
    pub workspace_globs: &'a [String],
    pub shared: SharedPackagesRules,
    pub generate_scalprum_assets: bool,
    pub generate_module_federation_assets: bool,
    pub scalprum_config_path: Option<PathBuf>,
    pub skip_build: bool,
}

#[derive(Debug)]
pub struct FrontendExportReport {
    pub assets: Vec<(String, Value)>,
}

pub fn export_frontend(opts: FrontendExportOptions) -> Result<FrontendExportReport, ExportError> {
    info!(package = %opts.package_dir.display(), "starting frontend export");

    if !opts.generate_scalprum_assets && !opts.generate_module_federation_assets {
        return Err(ExportError::NoFrontendAssetsRequested);
    }

    let mut root_descriptor = PackageDescriptor::read(opts.package_dir.join("package.json"))?;
    let output_dir = opts.package_dir.join("dist-dynamic");

    debug!("building workspace index");
    let workspace = WorkspaceIndex::build(opts.monorepo_root, opts.workspace_globs)?;

    fs::create_dir_all(&output_dir)?;
    packager::package_into(opts.package_dir, &output_dir, &root_descriptor)?;

    let mut producers: Vec<Box<dyn AssetProducer>> = Vec::new();
    if opts.generate_scalprum_assets {
        producers.push(Box::new(ScalprumAssetProducer {
            config_path: opts.scalprum_config_path.clone(),
        }));
    }
    if opts.generate_module_federation_assets {
        producers.push(Box::new(ModuleFederationAssetProducer {
            package_dir: opts.package_dir.to_path_buf(),
            skip_build: opts.skip_build,
        }));
    }

    let assets = asset_producer::run_all(&producers, &root_descriptor)?;
    if assets.is_empty() {
        return Err(ExportError::NoFrontendAssetsRequested);
    }

    let mut files = root_descriptor.files();
    if !files.iter().any(|f| f == "dist-scalprum") {
        files.push("dist-scalprum".to_string());
        root_descriptor.set_files(files);
    }

    let mut descriptor = root_descriptor;
    let ctx = CustomizeContext {
        workspace: &workspace,
        shared: &opts.shared,
        embedded: &[],
        rename_to_dynamic: true,
        additional_overrides: DependencyMap::new(),
        additional_resolutions: DependencyMap::new(),
    };
    customizer::customize(&mut descriptor, &ctx, None)?;

    lockfile::ensure_present(&output_dir, opts.monorepo_root)?;

    descriptor.write(output_dir.join("package.json"))?;

    info!(assets = assets.len(), "frontend export complete");

    Ok(FrontendExportReport { assets })
}
