//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external collaborators
//! (tool runner, processing capabilities, moderation classifier and raw
//! stream spawner), so workflows and sessions can be tested end to end
//! without ffmpeg or inference models.
//!
//! # Example
//!
//! ```rust,ignore
//! use framefuse_core::testing::{MockClassifier, MockProcessor, MockToolRunner};
//!
//! let runner = Arc::new(MockToolRunner::new());
//! let swap = Arc::new(MockProcessor::new("swap"));
//! let classifier = Arc::new(MockClassifier::never());
//!
//! // Build a ToolBridge and MediaStageExecutor from these...
//! ```

mod mock_classifier;
mod mock_processor;
mod mock_stream;
mod mock_tool_runner;

pub use mock_classifier::MockClassifier;
pub use mock_processor::MockProcessor;
pub use mock_stream::MockStreamSpawner;
pub use mock_tool_runner::MockToolRunner;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::frame::{save_frame, Frame, Resolution};

    /// A frame filled with one colour.
    pub fn solid_frame(resolution: Resolution, rgb: [u8; 3]) -> Frame {
        Frame::solid(resolution, rgb)
    }

    /// Writes a solid-colour image; the format follows the extension.
    pub fn write_image(path: &Path, resolution: Resolution, rgb: [u8; 3]) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture directory");
        }
        save_frame(path, &solid_frame(resolution, rgb), None).expect("write fixture image");
    }

    /// Writes `count` numbered PNG frames (`00000001.png`, ...) into `dir`.
    pub fn write_frames(dir: &Path, count: usize, resolution: Resolution, rgb: [u8; 3]) -> Vec<PathBuf> {
        (1..=count)
            .map(|n| {
                let path = dir.join(format!("{:08}.png", n));
                write_image(&path, resolution, rgb);
                path
            })
            .collect()
    }

    /// Writes a placeholder file with arbitrary content.
    pub fn write_file(path: &Path, contents: &[u8]) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture directory");
        }
        std::fs::write(path, contents).expect("write fixture file");
    }
}
