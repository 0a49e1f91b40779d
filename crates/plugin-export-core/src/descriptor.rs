//! In-memory form of a package manifest (`package.json`), rich enough to
//! drive dependency resolution and rewriting without losing unknown fields
//! when the descriptor is written back out.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};

use plugin_errors::ExportError;

pub type DependencyMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    /// the full JSON object, kept so unknown fields round-trip losslessly
    raw: Map<String, Value>,
}

impl PackageDescriptor {
    pub fn from_str(contents: &str) -> Result<Self, ExportError> {
        let raw: Value = serde_json::from_str(contents)?;
        let raw = raw
            .as_object()
            .cloned()
            .unwrap_or_default();
        Ok(PackageDescriptor { raw })
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let contents = fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let contents = serde_json::to_string_pretty(&Value::Object(self.raw.clone()))?;
        fs::write(path, format!("{contents}\n"))?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        self.raw.get("name").and_then(Value::as_str).unwrap_or("")
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.raw.insert("name".into(), Value::String(name.into()));
    }

    pub fn version(&self) -> &str {
        self.raw
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("0.0.0")
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.raw
            .insert("version".into(), Value::String(version.into()));
    }

    pub fn role(&self) -> Option<&str> {
        self.raw.get("role").and_then(Value::as_str)
    }

    pub fn main(&self) -> Option<&str> {
        self.raw.get("main").and_then(Value::as_str)
    }

    pub fn is_bundled(&self) -> bool {
        self.raw
            .get("bundled")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn gypfile(&self) -> bool {
        self.raw
            .get("gypfile")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn files(&self) -> Vec<String> {
        self.raw
            .get("files")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_files(&mut self, files: Vec<String>) {
        self.raw.insert(
            "files".into(),
            Value::Array(files.into_iter().map(Value::String).collect()),
        );
    }

    pub fn dependencies(&self) -> DependencyMap {
        string_map(&self.raw, "dependencies")
    }

    pub fn set_dependencies(&mut self, deps: DependencyMap) {
        set_string_map(&mut self.raw, "dependencies", deps);
    }

    pub fn dev_dependencies(&self) -> DependencyMap {
        string_map(&self.raw, "devDependencies")
    }

    pub fn set_dev_dependencies(&mut self, deps: DependencyMap) {
        set_string_map(&mut self.raw, "devDependencies", deps);
    }

    pub fn peer_dependencies(&self) -> DependencyMap {
        string_map(&self.raw, "peerDependencies")
    }

    pub fn set_peer_dependencies(&mut self, deps: DependencyMap) {
        set_string_map(&mut self.raw, "peerDependencies", deps);
    }

    pub fn overrides(&self) -> DependencyMap {
        string_map(&self.raw, "overrides")
    }

    pub fn set_overrides(&mut self, overrides: DependencyMap) {
        set_string_map(&mut self.raw, "overrides", overrides);
    }

    pub fn resolutions(&self) -> DependencyMap {
        string_map(&self.raw, "resolutions")
    }

    pub fn set_resolutions(&mut self, resolutions: DependencyMap) {
        set_string_map(&mut self.raw, "resolutions", resolutions);
    }

    pub fn scripts(&self) -> DependencyMap {
        string_map(&self.raw, "scripts")
    }

    pub fn set_scripts(&mut self, scripts: DependencyMap) {
        set_string_map(&mut self.raw, "scripts", scripts);
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.raw.insert(key.into(), Value::Bool(value));
    }

    pub fn set_string(&mut self, key: &str, value: impl Into<String>) {
        self.raw.insert(key.into(), Value::String(value.into()));
    }

    pub fn scalprum_config(&self) -> Option<&Value> {
        self.raw.get("scalprum")
    }
}

fn string_map(raw: &Map<String, Value>, key: &str) -> DependencyMap {
    raw.get(key)
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn set_string_map(raw: &mut Map<String, Value>, key: &str, map: DependencyMap) {
    let obj: Map<String, Value> = map
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    raw.insert(key.into(), Value::Object(obj));
}

/// A parsed `workspace:<spec>` dependency specifier, per the design note that
/// recommends storing the post-parse tag instead of repeating string surgery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceSpecifier {
    Star,
    CaretOnly,
    TildeOnly,
    Directory(String),
    Range(String),
}

impl WorkspaceSpecifier {
    pub fn parse(spec: &str) -> Option<Self> {
        let inner = spec.strip_prefix("workspace:")?;
        Some(match inner {
            "*" => WorkspaceSpecifier::Star,
            "^" => WorkspaceSpecifier::CaretOnly,
            "~" => WorkspaceSpecifier::TildeOnly,
            other if other.starts_with("./") || other.starts_with("../") => {
                WorkspaceSpecifier::Directory(other.to_string())
            }
            other => WorkspaceSpecifier::Range(other.to_string()),
        })
    }

    /// How this specifier should render once resolved to a concrete version,
    /// per the Descriptor Customizer's range-handling rule.
    pub fn render(&self, version: &str) -> String {
        match self {
            WorkspaceSpecifier::CaretOnly => format!("^{version}"),
            WorkspaceSpecifier::TildeOnly => format!("~{version}"),
            WorkspaceSpecifier::Star | WorkspaceSpecifier::Directory(_) | WorkspaceSpecifier::Range(_) => {
                version.to_string()
            }
        }
    }
}

/// `<slug>` derivation used for `embedded/<slug>` directories: strip a leading
/// `@` and replace `/` with `-`.
pub fn embedded_slug(package_name: &str) -> String {
    package_name.trim_start_matches('@').replace('/', "-")
}

pub fn is_unbuilt_source(main: Option<&str>) -> bool {
    main.map(|m| m.ends_with(".ts")).unwrap_or(false)
}

pub type AbsolutePath = PathBuf;
