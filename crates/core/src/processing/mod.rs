//! Frame processing capabilities and the chain that applies them.
//!
//! A [`FrameProcessor`] is a black-box per-frame transform. A
//! [`FramePipeline`] applies an ordered list of them to one frame and is
//! shared read-only by the batch workers and the streaming sessions.

mod audio;
mod error;
mod pipeline;
mod registry;
mod traits;

pub use audio::AudioSlicer;
pub use error::ProcessorError;
pub use pipeline::FramePipeline;
pub use registry::{PassthroughProcessor, ProcessorRegistry};
pub use traits::{FrameBundle, FrameProcessor, ProcessMode, WorkingFrame};
