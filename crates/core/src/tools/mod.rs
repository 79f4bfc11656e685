//! Bridge to the external codec tools (ffmpeg and ffprobe).
//!
//! Argument building, process execution and output parsing are kept in
//! separate pieces:
//!
//! - [`FfmpegArgs`] and the [`ffprobe`] helpers build command lines
//! - a [`ToolRunner`] executes them ([`ProcessToolRunner`] in production)
//! - [`ToolBridge`] ties both together into typed operations
//! - [`RawFrameReader`] reads fixed-size raw frames from a tool's stdout
//!
//! # Example
//!
//! ```ignore
//! use framefuse_core::tools::{ProcessToolRunner, ToolBridge, ToolsConfig};
//!
//! let config = ToolsConfig::default();
//! let runner = Arc::new(ProcessToolRunner::new(config.clone()));
//! runner.validate().await?;
//!
//! let bridge = ToolBridge::new(runner, config, OutputConfig::default());
//! let info = bridge.probe(Path::new("/path/to/clip.mp4")).await?;
//! println!("Duration: {} seconds", info.duration_secs);
//! ```

mod bridge;
mod config;
mod error;
mod ffmpeg;
pub mod ffprobe;
mod raw_reader;
mod runner;
mod types;

pub use bridge::ToolBridge;
pub use config::ToolsConfig;
pub use error::ToolError;
pub use ffmpeg::FfmpegArgs;
pub use raw_reader::{decode_s16le, RawFrameReader};
pub use runner::{ProcessToolRunner, ToolRunner};
pub use types::{
    AudioStreamInfo, MediaInfo, ToolInvocation, ToolKind, ToolOperation, ToolOutput, TrimRange,
    VideoStreamInfo,
};
