//! Validates that a built entrypoint actually exports a loadable plugin
//! module. The real check requires a Node runtime, so it's expressed behind
//! a trait: production routes a small probe script through the task runner
//! and parses its JSON verdict, tests substitute a fake that never touches a
//! process.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use plugin_errors::ExportError;

use crate::task_runner::{self, Task};

pub trait ModuleLoader {
    fn validate(&self, entrypoint: &Path) -> Result<(), ExportError>;
}

#[derive(Debug, Deserialize)]
struct ProbeVerdict {
    ok: bool,
    kind: String,
    message: String,
}

/// Shells out to a small Node probe that requires the entrypoint and reports,
/// as JSON on stdout, whether it found a `dynamicPluginInstaller`, an
/// `.alpha`/`.default` plugin export, or neither.
pub struct NodeProbeLoader {
    pub node_binary: String,
}

impl Default for NodeProbeLoader {
    fn default() -> Self {
        NodeProbeLoader {
            node_binary: "node".to_string(),
        }
    }
}

impl ModuleLoader for NodeProbeLoader {
    fn validate(&self, entrypoint: &Path) -> Result<(), ExportError> {
        let cwd = entrypoint
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let is_ts = entrypoint.extension().and_then(|e| e.to_str()) == Some("ts");

        let mut task = Task::new("probe-entrypoint", &self.node_binary, cwd);
        if is_ts {
            task = task.arg("-r").arg("ts-node/register");
        }
        task = task.arg("-e").arg(probe_script(entrypoint));

        let runtime = tokio::runtime::Runtime::new()?;
        let mut outcomes = runtime.block_on(task_runner::run_all(vec![task]))?;
        let outcome = outcomes.remove(0);

        let verdict: ProbeVerdict = serde_json::from_str(outcome.stdout.trim()).map_err(|e| {
            ExportError::InvalidPluginEntrypoint {
                detail: format!(
                    "probe produced no parseable verdict ({e}); stdout={:?} stderr={:?}",
                    outcome.stdout, outcome.stderr
                ),
            }
        })?;

        if verdict.ok {
            debug!(kind = %verdict.kind, "entrypoint probe passed");
            Ok(())
        } else {
            Err(ExportError::InvalidPluginEntrypoint {
                detail: format!("{}: {}", verdict.kind, verdict.message),
            })
        }
    }
}

/// A `dynamicPluginInstaller` export always counts; otherwise the module (or
/// its `.default`/`.alpha` submodule) must be a loadable object or function.
fn probe_script(entrypoint: &Path) -> String {
    format!(
        "let result; \
         try {{ \
           const mod = require('{path}'); \
           const candidate = mod && (mod.default || mod.alpha || mod); \
           if (mod && mod.dynamicPluginInstaller) {{ \
             result = {{ ok: true, kind: 'dynamicPluginInstaller', message: 'found dynamicPluginInstaller export' }}; \
           }} else if (candidate && (typeof candidate === 'object' || typeof candidate === 'function')) {{ \
             result = {{ ok: true, kind: 'plugin', message: 'found a loadable plugin export' }}; \
           }} else {{ \
             result = {{ ok: false, kind: 'no-plugin-export', message: 'module does not export a recognizable plugin' }}; \
           }} \
         }} catch (e) {{ \
           result = {{ ok: false, kind: 'throw', message: String((e && e.message) || e) }}; \
         }} \
         process.stdout.write(JSON.stringify(result));",
        path = entrypoint.display()
    )
}

#[cfg(test)]
pub struct FakeModuleLoader {
    pub should_fail: bool,
}

#[cfg(test)]
impl ModuleLoader for FakeModuleLoader {
    fn validate(&self, entrypoint: &Path) -> Result<(), ExportError> {
        if self.should_fail {
            Err(ExportError::InvalidPluginEntrypoint {
                detail: format!("{} does not export a loadable module", entrypoint.display()),
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_loader_reports_failure_as_invalid_entrypoint() {
        let loader = FakeModuleLoader { should_fail: true };
        let err = loader.validate(Path::new("dist/index.js")).unwrap_err();
        assert!(matches!(err, ExportError::InvalidPluginEntrypoint { .. }));
    }

    #[test]
    fn fake_loader_passes_through_on_success() {
        let loader = FakeModuleLoader { should_fail: false };
        assert!(loader.validate(Path::new("dist/index.js")).is_ok());
    }

    #[test]
    fn probe_script_prefers_dynamic_plugin_installer_detection() {
        let script = probe_script(Path::new("dist/index.js"));
        assert!(script.contains("dynamicPluginInstaller"));
        assert!(script.contains("JSON.stringify(result)"));
    }
}
