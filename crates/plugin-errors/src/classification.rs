//! Broad categories an [`ExportError`](crate::ExportError) falls into, used only to
//! pick an exit code and a retry hint. The fine-grained kind lives on the error itself.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClassification {
    /// Bad or missing CLI input, descriptor fields, workspace state.
    Validation,
    /// A spawned process (build/install/probe) exited non-zero.
    ProcessExecution,
    /// Filesystem I/O failure unrelated to validation.
    FileSystem,
    /// JSON/YAML parse failure.
    Parsing,
    /// A bug in this tool, not the input.
    Internal,
}

impl ErrorClassification {
    /// Exit code policy: validation/user errors are 1, a subprocess failure's own
    /// exit code takes precedence over this (see `ExportError::exit_code`), anything
    /// unexpected is 100.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorClassification::Validation => 1,
            ErrorClassification::ProcessExecution => 1,
            ErrorClassification::FileSystem => 1,
            ErrorClassification::Parsing => 1,
            ErrorClassification::Internal => 100,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClassification::ProcessExecution)
    }
}

impl fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClassification::Validation => "Validation",
            ErrorClassification::ProcessExecution => "Process Execution",
            ErrorClassification::FileSystem => "File System",
            ErrorClassification::Parsing => "Parsing",
            ErrorClassification::Internal => "Internal",
        };
        write!(f, "{}", name)
    }
}

pub trait Classify {
    fn classify(&self) -> ErrorClassification;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_valid() {
        for c in [
            ErrorClassification::Validation,
            ErrorClassification::ProcessExecution,
            ErrorClassification::FileSystem,
            ErrorClassification::Parsing,
            ErrorClassification::Internal,
        ] {
            let code = c.exit_code();
            assert!(code > 0 && code <= 255);
        }
    }

    #[test]
    fn only_process_execution_is_retryable() {
        assert!(ErrorClassification::ProcessExecution.is_retryable());
        assert!(!ErrorClassification::Validation.is_retryable());
        assert!(!ErrorClassification::Internal.is_retryable());
    }
}
