//! File-based workflows.
//!
//! A workflow is a fixed list of stages per [`WorkflowVariant`], run in order
//! by the [`TaskSequenceRunner`]. Each stage reports an [`ErrorCode`]; the
//! first nonzero code halts the run, but the final cleanup stage always runs.
//!
//! # Example
//!
//! ```ignore
//! use framefuse_core::workflow::{ProcessingJobContext, WorkflowEngine, WorkflowVariant};
//!
//! let engine = WorkflowEngine::new(Arc::new(executor));
//! let mut ctx = ProcessingJobContext::new("/media/clip.mp4", "/out/clip.mp4")
//!     .with_sources(vec!["/media/face.jpg".into()]);
//!
//! let outcome = engine.run_workflow(WorkflowVariant::ImageToVideo, &mut ctx).await?;
//! println!("Finished with {}", outcome);
//! ```

mod engine;
mod runner;
mod stages;
mod types;

pub use engine::{WorkflowEngine, WorkflowError};
pub use runner::{StageExecutor, TaskSequenceRunner};
pub use stages::MediaStageExecutor;
pub use types::{
    ErrorCode, MediaKind, ProcessingJobContext, StageKind, WorkflowStage, WorkflowVariant,
};
