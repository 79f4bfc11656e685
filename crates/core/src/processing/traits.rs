//! The processing capability contract.

use serde::{Deserialize, Serialize};

use super::error::ProcessorError;
use crate::frame::{AudioFrame, Frame, Mask};

/// Where a capability is about to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessMode {
    /// File-based workflow producing an output file.
    Output,
    /// Live session.
    Stream,
}

/// Read-only inputs for processing one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameBundle<'a> {
    pub reference: &'a Frame,
    pub sources: &'a [Frame],
    pub source_audio: &'a AudioFrame,
    pub source_voice: &'a AudioFrame,
    /// The frame as it was before any capability touched it.
    pub target: &'a Frame,
    pub frame_number: u64,
}

/// The frame being transformed, with an optional alpha mask riding along.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingFrame {
    pub frame: Frame,
    pub mask: Option<Mask>,
}

impl WorkingFrame {
    pub fn new(frame: Frame) -> Self {
        Self { frame, mask: None }
    }

    pub fn with_mask(frame: Frame, mask: Option<Mask>) -> Self {
        Self { frame, mask }
    }
}

/// A per-frame transform such as detection, swap or enhancement.
///
/// Implementations hold only read-only state after construction, so one
/// instance is shared by every worker.
pub trait FrameProcessor: Send + Sync {
    /// Returns the name of this capability.
    fn name(&self) -> &str;

    /// Prepares for a run. Returning `false` aborts the run before any frame is touched.
    fn pre_process(&self, _mode: ProcessMode) -> bool {
        true
    }

    /// Whether this capability has anything to do for the frame.
    fn applies_to(&self, _bundle: &FrameBundle<'_>) -> bool {
        true
    }

    /// Transforms the working frame.
    fn process_frame(
        &self,
        bundle: &FrameBundle<'_>,
        working: WorkingFrame,
    ) -> Result<WorkingFrame, ProcessorError>;

    /// Releases whatever `pre_process` acquired. Runs once per batch.
    fn post_process(&self) {}
}
