//! Command-line argument surface, shared between the `plugin-export-cli`
//! binary and anything that wants to drive an export programmatically with
//! the same flags a user would type.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "plugin-export", about = "Turn a static plugin package into a dynamic one")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// directory to treat as the current working directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Verbosity::Info, global = true)]
    pub verbosity: Verbosity,

    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Verbosity {
    Quiet,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Export(ExportArgs),
    Package(PackageArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    FrontendPlugin,
    BackendPlugin,
    BackendPluginModule,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// path to the package being exported, defaults to the cwd
    pub plugin_dir: Option<PathBuf>,

    /// path to the package being exported; takes precedence over the positional form
    #[arg(long)]
    pub package_dir: Option<PathBuf>,

    /// override the role read from the package's descriptor
    #[arg(long, value_enum)]
    pub role: Option<Role>,

    /// extra packages to pull into the embedded dependency tree
    #[arg(long = "embed-package")]
    pub embed_packages: Vec<String>,

    /// rules controlling which packages are treated as host-provided instead
    /// of embedded; `!` prefix excludes, `/.../ ` delimits a regex
    #[arg(long = "shared-package")]
    pub shared_packages: Vec<String>,

    /// native packages permitted to ship despite being compiled addons
    #[arg(long = "allow-native-package")]
    pub allow_native_packages: Vec<String>,

    /// native packages to stub out instead of rejecting the export outright
    #[arg(long = "suppress-native-package")]
    pub suppress_native_packages: Vec<String>,

    /// skip checking that workspace-protocol dependency versions actually satisfy their range
    #[arg(long)]
    pub ignore_version_check: bool,

    /// skip running the package manager install step
    #[arg(long)]
    pub no_install: bool,

    /// skip invoking a frontend package's build script before producing assets
    #[arg(long)]
    pub no_build: bool,

    /// remove a previous dist-dynamic output before exporting
    #[arg(long)]
    pub clean: bool,

    /// keep devDependencies and skip production-only pruning, for local iteration
    #[arg(long)]
    pub dev: bool,

    /// root directory dynamic plugins are installed into, used to resolve sibling packages at runtime
    #[arg(long)]
    pub dynamic_plugins_root: Option<PathBuf>,

    /// path to a scalprum config file, overriding the package's inline "scalprum" field
    #[arg(long)]
    pub scalprum_config: Option<PathBuf>,

    /// record the embedded package set and resolved versions into a manifest and lock file
    #[arg(long)]
    pub track_dynamic_manifest_and_lock_file: bool,

    /// produce a Scalprum asset bundle for frontend plugins (on by default)
    #[arg(long, default_value_t = true)]
    pub generate_scalprum_assets: bool,

    #[arg(long = "no-generate-scalprum-assets")]
    pub no_generate_scalprum_assets: bool,

    /// produce a module-federation remote entry for frontend plugins (off by default)
    #[arg(long, default_value_t = false)]
    pub generate_module_federation_assets: bool,

    #[arg(long = "no-generate-module-federation-assets")]
    pub no_generate_module_federation_assets: bool,
}

impl ExportArgs {
    pub fn resolved_package_dir(&self, cwd: &std::path::Path) -> PathBuf {
        self.package_dir
            .clone()
            .or_else(|| self.plugin_dir.clone())
            .unwrap_or_else(|| cwd.to_path_buf())
    }

    pub fn wants_scalprum_assets(&self) -> bool {
        self.generate_scalprum_assets && !self.no_generate_scalprum_assets
    }

    pub fn wants_module_federation_assets(&self) -> bool {
        self.generate_module_federation_assets && !self.no_generate_module_federation_assets
    }
}

#[derive(Debug, Args)]
pub struct PackageArgs {
    #[arg(long)]
    pub package_dir: Option<PathBuf>,

    /// container tool used to build the image; falls back to $CONTAINER_TOOL
    #[arg(long, env = "CONTAINER_TOOL", default_value = "docker")]
    pub container_tool: String,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn export_subcommand_parses_shared_package_flags() {
        let cli = Cli::parse_from([
            "plugin-export",
            "export",
            "--shared-package",
            "react",
            "--shared-package",
            "!react-dom",
        ]);
        match cli.command {
            Command::Export(args) => {
                assert_eq!(args.shared_packages, vec!["react".to_string(), "!react-dom".to_string()]);
            }
            _ => panic!("expected export subcommand"),
        }
    }

    #[test]
    fn export_subcommand_parses_native_package_and_asset_flags() {
        let cli = Cli::parse_from([
            "plugin-export",
            "export",
            "plugins/foo",
            "--allow-native-package",
            "sharp",
            "--suppress-native-package",
            "canvas",
            "--no-install",
            "--generate-module-federation-assets",
            "--no-generate-scalprum-assets",
        ]);
        match cli.command {
            Command::Export(args) => {
                assert_eq!(args.plugin_dir, Some(PathBuf::from("plugins/foo")));
                assert_eq!(args.allow_native_packages, vec!["sharp".to_string()]);
                assert_eq!(args.suppress_native_packages, vec!["canvas".to_string()]);
                assert!(args.no_install);
                assert!(args.wants_module_federation_assets());
                assert!(!args.wants_scalprum_assets());
            }
            _ => panic!("expected export subcommand"),
        }
    }

    #[test]
    fn scalprum_assets_default_on_and_module_federation_defaults_off() {
        let cli = Cli::parse_from(["plugin-export", "export"]);
        match cli.command {
            Command::Export(args) => {
                assert!(args.wants_scalprum_assets());
                assert!(!args.wants_module_federation_assets());
            }
            _ => panic!("expected export subcommand"),
        }
    }
}
