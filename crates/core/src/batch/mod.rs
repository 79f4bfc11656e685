//! Concurrent batch processing of extracted frames.
//!
//! Each frame is its own task on a pool of `thread_count` blocking workers.
//! Shared state is limited to the read-only pipeline and inputs plus one
//! atomic progress counter.

mod processor;
mod types;

pub use processor::ConcurrentFrameProcessor;
pub use types::{BatchError, BatchProgress, BatchReport, FrameFailure, FrameJob, SharedInputs};
