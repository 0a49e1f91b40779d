use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use plugin_export_core::{
    backend::{export_backend, BackendExportOptions},
    cli::{Cli, Command, ExportArgs, Role},
    embedding::NodeModulesResolver,
    frontend::{export_frontend, FrontendExportOptions},
    logging,
    module_loader::{ModuleLoader, NodeProbeLoader},
    shared_rules::SharedPackagesRules,
    ExportError,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.global.verbosity, cli.global.no_color);

    let cwd = cli
        .global
        .cwd
        .unwrap_or_else(|| std::env::current_dir().expect("current directory must be readable"));

    let result = match cli.command {
        Command::Export(args) => run_export(&cwd, args),
        Command::Package(_) => Err(ExportError::NotImplemented {
            detail: "packaging a dynamic plugin into a container image is not implemented by this build"
                .to_string(),
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run_export(cwd: &std::path::Path, args: ExportArgs) -> Result<(), ExportError> {
    let package_dir = args.resolved_package_dir(cwd);
    let monorepo_root = find_monorepo_root(&package_dir).unwrap_or_else(|| cwd.to_path_buf());

    let shared = SharedPackagesRules::from_cli(&args.shared_packages)
        .map_err(|e| ExportError::InvalidArgument {
            detail: format!("invalid --shared-package pattern: {e}"),
        })?;

    if args.clean {
        let dist_dynamic = package_dir.join("dist-dynamic");
        if dist_dynamic.is_dir() {
            std::fs::remove_dir_all(&dist_dynamic)?;
        }
    }

    let descriptor = plugin_export_core::descriptor::PackageDescriptor::read(package_dir.join("package.json"))?;
    let role = match args.role {
        Some(Role::FrontendPlugin) => "frontend-plugin",
        Some(Role::BackendPlugin) => "backend-plugin",
        Some(Role::BackendPluginModule) => "backend-plugin-module",
        None => descriptor.role().unwrap_or(""),
    };

    let wants_scalprum = args.wants_scalprum_assets();
    let wants_module_federation = args.wants_module_federation_assets();
    let scalprum_config_path = args.scalprum_config.clone();
    let no_build = args.no_build;
    let ignore_version_check = args.ignore_version_check;
    let no_install = args.no_install;
    let allow_native_packages = args.allow_native_packages.clone();
    let suppress_native_packages = args.suppress_native_packages.clone();
    let embed_packages = args.embed_packages.clone();

    if role.starts_with("frontend") {
        export_frontend(FrontendExportOptions {
            package_dir: &package_dir,
            monorepo_root: &monorepo_root,
            workspace_globs: &["packages/*".to_string(), "plugins/*".to_string()],
            shared,
            generate_scalprum_assets: wants_scalprum,
            generate_module_federation_assets: wants_module_federation,
            scalprum_config_path,
            skip_build: no_build,
        })?;
    } else {
        let loader: Box<dyn ModuleLoader> = Box::new(NodeProbeLoader::default());
        export_backend(BackendExportOptions {
            package_dir: &package_dir,
            monorepo_root: &monorepo_root,
            workspace_globs: &["packages/*".to_string(), "plugins/*".to_string()],
            embed_seeds: embed_packages,
            shared,
            resolver: &NodeModulesResolver,
            module_loader: Some(loader.as_ref()),
            allow_native_packages,
            suppress_native_packages,
            ignore_version_check,
            skip_install: no_install,
        })?;
    }

    Ok(())
}

fn find_monorepo_root(start: &std::path::Path) -> Option<std::path::PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        if current.join("yarn.lock").is_file() || current.join("package-lock.json").is_file() {
            return Some(current.to_path_buf());
        }
        dir = current.parent();
    }
    None
}
