//! Error types for the tool bridge.

use std::path::PathBuf;
use thiserror::Error;

use super::types::ToolOperation;

/// Errors that can occur while running an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool binary not found.
    #[error("{tool} not found at path: {path}")]
    NotFound { tool: String, path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The process exited with a non-zero status.
    #[error("{operation} failed with exit code {code:?}")]
    Failed {
        operation: ToolOperation,
        code: Option<i32>,
        stderr: String,
    },

    /// The process did not finish in time.
    #[error("{operation} timed out after {timeout_secs} seconds")]
    Timeout {
        operation: ToolOperation,
        timeout_secs: u64,
    },

    /// The process output could not be understood.
    #[error("Malformed tool output: {reason}")]
    MalformedOutput { reason: String },

    /// A fixed-size read came back short.
    #[error("Incomplete read: expected {expected} bytes, got {actual}")]
    IncompleteIo { expected: usize, actual: usize },

    /// I/O error while talking to the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The invocation was abandoned by a stop request.
    #[error("Tool invocation cancelled")]
    Cancelled,
}

impl ToolError {
    /// Creates a new failed error from an exit code and captured stderr.
    pub fn failed(operation: ToolOperation, code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::Failed {
            operation,
            code,
            stderr: stderr.into(),
        }
    }

    /// Creates a new malformed output error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedOutput {
            reason: reason.into(),
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io(_))
    }

    /// Whether this error stems from missing or truncated bytes.
    pub fn is_incomplete_io(&self) -> bool {
        matches!(self, Self::IncompleteIo { .. } | Self::Io(_))
    }
}
