//! Error types for the frame processing chain.

use thiserror::Error;

use crate::frame::FrameError;

/// Errors that can occur while applying processing capabilities.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// A capability failed on a frame.
    #[error("{processor} failed: {reason}")]
    Failed { processor: String, reason: String },

    /// Loading or saving the frame failed.
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// No capability is registered under this name.
    #[error("Unknown processor: {name}")]
    UnknownProcessor { name: String },

    /// A capability refused to run in the requested mode.
    #[error("Processor {name} is not ready")]
    NotReady { name: String },
}

impl ProcessorError {
    /// Creates a new failed error.
    pub fn failed(processor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            processor: processor.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error comes from configuration rather than a frame.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UnknownProcessor { .. } | Self::NotReady { .. })
    }
}
