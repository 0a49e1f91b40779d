//! Runs the handful of shell-outs an export needs (installing dependencies,
//! probing a built entrypoint) as a strictly sequential pipeline. There's no
//! concurrency to manage here, so this is a plain async loop rather than the
//! job-pool machinery a build orchestrator would need.

use std::path::PathBuf;

use tokio::process::Command;

use plugin_errors::ExportError;

#[derive(Debug, Clone)]
pub struct Task {
    pub label: String,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// a failing optional task is recorded but doesn't abort the run
    pub optional: bool,
}

impl Task {
    pub fn new(label: impl Into<String>, program: impl Into<String>, cwd: PathBuf) -> Self {
        Task {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            cwd,
            optional: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub label: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

pub async fn run_all(tasks: Vec<Task>) -> Result<Vec<TaskOutcome>, ExportError> {
    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        let output = Command::new(&task.program)
            .args(&task.args)
            .current_dir(&task.cwd)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let success = output.status.success();

        if !success && !task.optional {
            return Err(ExportError::SubprocessFailed {
                command: task.command_line(),
                cwd: task.cwd.display().to_string(),
                exit_code: output.status.code(),
                stdout,
                stderr,
            });
        }

        outcomes.push(TaskOutcome {
            label: task.label,
            success,
            stdout,
            stderr,
        });
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_tasks_in_order_and_captures_output() {
        let cwd = std::env::temp_dir();
        let outcomes = run_all(vec![
            Task::new("first", "echo", cwd.clone()).arg("one"),
            Task::new("second", "echo", cwd.clone()).arg("two"),
        ])
        .await
        .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].stdout.contains("one"));
        assert!(outcomes[1].stdout.contains("two"));
    }

    #[tokio::test]
    async fn failing_required_task_aborts_with_subprocess_error() {
        let cwd = std::env::temp_dir();
        let err = run_all(vec![Task::new("boom", "false", cwd)]).await.unwrap_err();
        assert!(matches!(err, ExportError::SubprocessFailed { .. }));
    }

    #[tokio::test]
    async fn failing_optional_task_does_not_abort() {
        let cwd = std::env::temp_dir();
        let outcomes = run_all(vec![Task::new("boom", "false", cwd).optional()])
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].success);
    }
}
