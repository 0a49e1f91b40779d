//! Produces the role-specific runtime assets a dynamic plugin needs at load
//! time: a Scalprum manifest entry for frontend plugins, a module-federation
//! remote entry for plugins that opt into it. Kept behind a trait since which
//! producers run is a CLI-level decision (`--generate-scalprum-assets`,
//! `--generate-module-federation-assets`), not something a producer decides
//! for itself.

use std::{fs, path::PathBuf};

use serde_json::{json, Value};

use plugin_errors::ExportError;

use crate::{
    descriptor::PackageDescriptor,
    task_runner::{self, Task},
};

pub trait AssetProducer {
    fn name(&self) -> &'static str;
    fn produce(&self, descriptor: &PackageDescriptor) -> Result<Option<Value>, ExportError>;
}

/// Emits a Scalprum manifest entry, preferring an explicit `--scalprum-config`
/// file over the package's inline `scalprum` field, and falling back to a
/// sensible default when neither is present — every frontend plugin gets a
/// manifest, not just the ones that happened to configure one.
pub struct ScalprumAssetProducer {
    pub config_path: Option<PathBuf>,
}

impl AssetProducer for ScalprumAssetProducer {
    fn name(&self) -> &'static str {
        "scalprum"
    }

    fn produce(&self, descriptor: &PackageDescriptor) -> Result<Option<Value>, ExportError> {
        let config = if let Some(path) = &self.config_path {
            let contents = fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else if let Some(inline) = descriptor.scalprum_config() {
            inline.clone()
        } else {
            default_scalprum_config(descriptor)
        };

        Ok(Some(json!({
            "name": descriptor.name(),
            "scalprum": config,
        })))
    }
}

fn default_scalprum_config(descriptor: &PackageDescriptor) -> Value {
    json!({
        "name": descriptor.name(),
        "exposedModules": { "PluginRoot": "./src/index.ts" },
    })
}

/// Emits a module-federation remote entry. Any previous `dist-scalprum`
/// output is cleared first, then (unless `skip_build`) the package's
/// `build:module-federation` script — or plain `build` as a fallback — runs
/// through the task runner to regenerate it.
pub struct ModuleFederationAssetProducer {
    pub package_dir: PathBuf,
    pub skip_build: bool,
}

impl AssetProducer for ModuleFederationAssetProducer {
    fn name(&self) -> &'static str {
        "module-federation"
    }

    fn produce(&self, descriptor: &PackageDescriptor) -> Result<Option<Value>, ExportError> {
        let dist_scalprum = self.package_dir.join("dist-scalprum");
        if dist_scalprum.is_dir() {
            fs::remove_dir_all(&dist_scalprum)?;
        }

        if !self.skip_build {
            let scripts = descriptor.scripts();
            let script_name = if scripts.contains_key("build:module-federation") {
                Some("build:module-federation")
            } else if scripts.contains_key("build") {
                Some("build")
            } else {
                None
            };

            if let Some(script_name) = script_name {
                let task = Task::new("module-federation-build", "yarn", self.package_dir.clone()).arg(script_name);
                let runtime = tokio::runtime::Runtime::new()?;
                runtime.block_on(task_runner::run_all(vec![task]))?;
            }
        }

        Ok(Some(json!({
            "name": descriptor.name(),
            "exposes": { ".": "./dist-scalprum/index.js" },
        })))
    }
}

pub fn run_all(
    producers: &[Box<dyn AssetProducer>],
    descriptor: &PackageDescriptor,
) -> Result<Vec<(String, Value)>, ExportError> {
    let mut produced = Vec::new();
    for producer in producers {
        if let Some(value) = producer.produce(descriptor)? {
            produced.push((producer.name().to_string(), value));
        }
    }
    Ok(produced)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn scalprum_producer_uses_default_config_when_none_is_configured() {
        let descriptor = PackageDescriptor::from_str(r#"{"name": "@x/foo"}"#).unwrap();
        let producer = ScalprumAssetProducer { config_path: None };
        let value = producer.produce(&descriptor).unwrap().unwrap();
        assert_eq!(value["scalprum"]["exposedModules"]["PluginRoot"], "./src/index.ts");
    }

    #[test]
    fn scalprum_producer_prefers_inline_config_over_default() {
        let descriptor =
            PackageDescriptor::from_str(r#"{"name": "@x/foo", "scalprum": {"exposedModules": ["./App"]}}"#)
                .unwrap();
        let producer = ScalprumAssetProducer { config_path: None };
        let value = producer.produce(&descriptor).unwrap().unwrap();
        assert_eq!(value["scalprum"]["exposedModules"][0], "./App");
    }

    #[test]
    fn scalprum_producer_prefers_file_over_inline_config() {
        let descriptor =
            PackageDescriptor::from_str(r#"{"name": "@x/foo", "scalprum": {"exposedModules": ["./App"]}}"#)
                .unwrap();
        let config_dir = tempdir().unwrap();
        let config_path = config_dir.path().join("scalprum-config.json");
        fs::write(&config_path, r#"{"exposedModules": ["./FromFile"]}"#).unwrap();

        let producer = ScalprumAssetProducer {
            config_path: Some(config_path),
        };
        let value = producer.produce(&descriptor).unwrap().unwrap();
        assert_eq!(value["scalprum"]["exposedModules"][0], "./FromFile");
    }

    #[test]
    fn module_federation_producer_skips_build_and_emits_remote_entry_when_build_is_skipped() {
        let dir = tempdir().unwrap();
        let descriptor =
            PackageDescriptor::from_str(r#"{"name": "@x/foo", "scripts": {"build": "rspack build"}}"#).unwrap();
        let producer = ModuleFederationAssetProducer {
            package_dir: dir.path().to_path_buf(),
            skip_build: true,
        };

        let value = producer.produce(&descriptor).unwrap().unwrap();
        assert_eq!(value["exposes"]["."], "./dist-scalprum/index.js");
    }

    #[test]
    fn module_federation_producer_clears_stale_dist_scalprum_output() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("dist-scalprum")).unwrap();
        fs::write(dir.path().join("dist-scalprum/stale.js"), "stale").unwrap();
        let descriptor = PackageDescriptor::from_str(r#"{"name": "@x/foo"}"#).unwrap();
        let producer = ModuleFederationAssetProducer {
            package_dir: dir.path().to_path_buf(),
            skip_build: true,
        };

        producer.produce(&descriptor).unwrap();

        assert!(!dir.path().join("dist-scalprum/stale.js").exists());
    }
}
