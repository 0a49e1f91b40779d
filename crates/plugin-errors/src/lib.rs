//! Error kinds shared by the export pipeline and the CLI entry point.
//!
//! Every variant names the offending entity in its message, per the fail-fast
//! policy: nothing here is recovered locally, the top-level caller only picks
//! an exit code and prints the error.

pub mod classification;

use miette::Diagnostic;
use thiserror::Error;

pub use classification::{Classify, ErrorClassification};

#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("package {name} has \"bundled\": true and cannot be exported as a dynamic plugin")]
    BundledPackageRejected { name: String },

    #[error("monorepo has more than one package named {name}")]
    DuplicateMonorepoPackage { name: String },

    #[error("dependency {name} specifies workspace:{specifier} but no matching monorepo package was found")]
    MissingWorkspacePackage { name: String, specifier: String },

    #[error("dependency {name} specifies {specifier} but monorepo package version {actual} does not satisfy it")]
    WorkspaceVersionMismatch {
        name: String,
        specifier: String,
        actual: String,
    },

    #[error("embedded package {name} has \"bundled\": true")]
    EmbeddedPackageBundled { name: String },

    #[error("dependency {name} uses workspace:{specifier} but could not be resolved against the embedded or monorepo package sets")]
    UnresolvedWorkspaceDep { name: String, specifier: String },

    #[error(
        "shared packages leaked into the installed dependency tree: {offenders}; consider \
         embedding: {suggestions}"
    )]
    SharedPackageLeakage {
        offenders: String,
        suggestions: String,
    },

    #[error("native (compiled) packages are not allowed in a dynamic plugin: {packages}")]
    NativePackageForbidden { packages: String },

    #[error("entrypoint did not export a recognizable plugin or a dynamicPluginInstaller: {detail}")]
    InvalidPluginEntrypoint { detail: String },

    #[error("peer dependency conflict on {name}: {left} does not intersect {right}")]
    PeerDependencyConflict {
        name: String,
        left: String,
        right: String,
    },

    #[error("no frontend asset kind requested; pass --generate-scalprum-assets and/or --generate-module-federation-assets")]
    NoFrontendAssetsRequested,

    #[error("command failed in {cwd}: {command} (exit code {exit_code:?})\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}")]
    SubprocessFailed {
        command: String,
        cwd: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("no lock file found in {dir} or any monorepo root above it")]
    LockFileMissing { dir: String },

    #[error("invalid argument: {detail}")]
    InvalidArgument { detail: String },

    #[error("lock file is malformed: {0}")]
    LockFileMalformed(String),

    #[error("not implemented: {detail}")]
    NotImplemented { detail: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Fs(#[from] plugin_fs::Error),
}

impl ExportError {
    pub fn classification(&self) -> ErrorClassification {
        match self {
            ExportError::SubprocessFailed { .. } => ErrorClassification::ProcessExecution,
            ExportError::Json(_) | ExportError::LockFileMalformed(_) => ErrorClassification::Parsing,
            ExportError::Io(_) | ExportError::Fs(_) => ErrorClassification::FileSystem,
            ExportError::NotImplemented { .. } => ErrorClassification::Internal,
            _ => ErrorClassification::Validation,
        }
    }

    /// Exit code policy: a subprocess failure surfaces its own exit code verbatim
    /// when we have one, everything else falls back to its classification's code.
    pub fn exit_code(&self) -> i32 {
        if let ExportError::SubprocessFailed {
            exit_code: Some(code),
            ..
        } = self
        {
            return *code;
        }
        self.classification().exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subprocess_failure_preserves_exit_code() {
        let err = ExportError::SubprocessFailed {
            command: "yarn install".into(),
            cwd: "/plugin".into(),
            exit_code: Some(17),
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(err.exit_code(), 17);
    }

    #[test]
    fn validation_errors_exit_with_one() {
        let err = ExportError::NoFrontendAssetsRequested;
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.classification(), ErrorClassification::Validation);
    }

    #[test]
    fn internal_classification_is_never_returned_for_named_kinds() {
        let err = ExportError::BundledPackageRejected {
            name: "@x/foo".into(),
        };
        assert_ne!(err.classification(), ErrorClassification::Internal);
    }
}
