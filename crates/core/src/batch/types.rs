//! Types for the batch frame processor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::frame::{AudioFrame, Frame};
use crate::processing::AudioSlicer;

/// Errors that end a batch before or after it runs.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Nothing to process.
    #[error("No frames to process")]
    NoFrames,

    /// At least one frame failed; the rest were cancelled.
    #[error("Frame {index} failed: {reason}")]
    FrameFailed { index: usize, reason: String },

    /// A stop request cancelled frames that had not started.
    #[error("Batch stopped with {cancelled} frames not processed")]
    Cancelled { processed: u64, cancelled: u64 },
}

/// Inputs shared read-only by every frame of a job.
#[derive(Debug, Clone, Default)]
pub struct SharedInputs {
    /// Frame used for reference matching; the frame itself when absent.
    pub reference: Option<Frame>,
    pub sources: Vec<Frame>,
    pub audio: Option<AudioSlicer>,
    /// Number of the first frame in `frame_paths`, used to align audio.
    pub frame_offset: u64,
}

impl SharedInputs {
    pub fn audio_for(&self, frame_number: u64) -> AudioFrame {
        self.audio
            .as_ref()
            .map(|audio| audio.frame(frame_number))
            .unwrap_or_default()
    }
}

/// A set of temp frames to run through the pipeline in place.
#[derive(Debug, Clone)]
pub struct FrameJob {
    pub frame_paths: Vec<PathBuf>,
    pub inputs: Arc<SharedInputs>,
}

impl FrameJob {
    pub fn new(frame_paths: Vec<PathBuf>, inputs: SharedInputs) -> Self {
        Self {
            frame_paths,
            inputs: Arc::new(inputs),
        }
    }
}

/// Progress update, sent after each completed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub processed: u64,
    pub total: u64,
}

/// A frame that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameFailure {
    pub index: usize,
    pub reason: String,
}

/// Outcome of a batch. `processed + cancelled + failures.len() == total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: u64,
    pub processed: u64,
    pub cancelled: u64,
    pub failures: Vec<FrameFailure>,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.processed == self.total
    }

    /// Turns an incomplete batch into the error describing why.
    pub fn check(&self) -> Result<(), BatchError> {
        if let Some(failure) = self.failures.iter().min_by_key(|f| f.index) {
            return Err(BatchError::FrameFailed {
                index: failure.index,
                reason: failure.reason.clone(),
            });
        }
        if self.cancelled > 0 {
            return Err(BatchError::Cancelled {
                processed: self.processed,
                cancelled: self.cancelled,
            });
        }
        Ok(())
    }
}
