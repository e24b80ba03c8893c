//! errors.rs - Custom error types for the mediasan-core library.
//!
//! `MediaSanError` covers the failures that abort a whole run (missing tools,
//! unusable directories, bad configuration). `ToolError` describes a single
//! failed tool invocation; it is recorded against one sanitization attempt and
//! never aborts the run.
//!
//! License: MIT OR APACHE 2.0

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Run-level errors.
///
/// By using `#[non_exhaustive]`, we signal to consumers of this library that
/// new variants may be added in future versions.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MediaSanError {
    #[error("Required tool '{program}' ({role}) was not found on PATH")]
    ToolUnavailable { program: String, role: String },

    #[error("Failed to compile safety rule '{0}': {1}")]
    RuleCompilationError(String, regex::Error),

    #[error("Rule '{0}': pattern length ({1}) exceeds maximum allowed ({2})")]
    PatternLengthExceeded(String, usize, usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Directory '{path}' cannot be used as {role}: {reason}")]
    InvalidLayout { path: PathBuf, role: String, reason: String },

    #[error("An unexpected I/O error occurred: {0}")]
    IoError(#[from] std::io::Error),

    #[error("A critical system error occurred: {0}")]
    AnyhowWrapper(#[from] anyhow::Error),

    #[error("A fatal error occurred: {0}")]
    Fatal(String),
}

/// Failure of one external tool invocation.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("tool '{0}' is unavailable")]
    Unavailable(String),

    #[error("tool '{program}' exited with status {code:?}: {stderr}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("tool '{program}' did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("tool '{program}' produced no usable output")]
    EmptyOutput { program: String },

    #[error("I/O error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    /// The exit code reported by the tool, if it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ToolError::NonZeroExit { code, .. } => *code,
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ToolError::TimedOut { .. })
    }
}
