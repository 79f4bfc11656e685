//! The ordered capability chain applied to every frame.

use std::sync::Arc;
use tracing::{debug, warn};

use super::error::ProcessorError;
use super::traits::{FrameBundle, FrameProcessor, ProcessMode, WorkingFrame};

/// Ordered list of capabilities, resolved once at configuration time.
#[derive(Clone, Default)]
pub struct FramePipeline {
    processors: Vec<Arc<dyn FrameProcessor>>,
}

impl FramePipeline {
    pub fn new(processors: Vec<Arc<dyn FrameProcessor>>) -> Self {
        Self { processors }
    }

    pub fn names(&self) -> Vec<String> {
        self.processors.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Runs every capability's `pre_process`; fails on the first refusal.
    pub fn pre_process_all(&self, mode: ProcessMode) -> Result<(), ProcessorError> {
        for processor in &self.processors {
            if !processor.pre_process(mode) {
                warn!(processor = processor.name(), ?mode, "Processor not ready");
                return Err(ProcessorError::NotReady {
                    name: processor.name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Applies the chain in declared order. Capabilities that decline are skipped.
    pub fn apply(
        &self,
        bundle: &FrameBundle<'_>,
        mut working: WorkingFrame,
    ) -> Result<WorkingFrame, ProcessorError> {
        for processor in &self.processors {
            if !processor.applies_to(bundle) {
                debug!(
                    processor = processor.name(),
                    frame = bundle.frame_number,
                    "Processor declined frame"
                );
                continue;
            }
            working = processor.process_frame(bundle, working)?;
        }
        Ok(working)
    }

    /// Runs every capability's `post_process`.
    pub fn post_process_all(&self) {
        for processor in &self.processors {
            processor.post_process();
        }
    }
}
