//! Configuration for live sessions.

use serde::{Deserialize, Serialize};

use crate::frame::Resolution;

/// Which wins when a frame between fully processed frames arrives on a
/// locked session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationPrecedence {
    /// The lock is consulted first: once locked, every output is a redaction
    /// of the incoming frame.
    #[default]
    LockFirst,
    /// Reuse is consulted first: in-between frames repeat the last processed
    /// output, which is itself redacted once the lock has tripped.
    ReuseFirst,
}

/// Upper bound applied to live output frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputResolution {
    #[default]
    #[serde(rename = "original")]
    Original,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl OutputResolution {
    /// The bounding box, `None` for the original size.
    pub fn resolution(&self) -> Option<Resolution> {
        match self {
            OutputResolution::Original => None,
            OutputResolution::P480 => Some(Resolution::new(640, 480)),
            OutputResolution::P720 => Some(Resolution::new(1280, 720)),
            OutputResolution::P1080 => Some(Resolution::new(1920, 1080)),
        }
    }
}

/// Live session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Output queue capacity in frames.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Frames arriving faster than this are dropped unprocessed.
    #[serde(default = "default_max_fps")]
    pub max_fps: f64,

    /// Every Nth admitted frame is fully processed.
    #[serde(default = "default_frame_skip")]
    pub frame_skip: u64,

    /// Adaptive bitrate poll interval.
    #[serde(default = "default_bitrate_poll_interval")]
    pub bitrate_poll_interval_ms: u64,

    /// Requested bitrate in kbps; 0 selects adaptive mode.
    #[serde(default)]
    pub bitrate_kbps: u64,

    /// Classifier runs on every Nth fully processed frame.
    #[serde(default = "default_moderation_sample_interval")]
    pub moderation_sample_interval: u64,

    #[serde(default)]
    pub moderation_precedence: ModerationPrecedence,

    #[serde(default)]
    pub output_resolution: OutputResolution,
}

fn default_buffer_size() -> usize {
    30
}

fn default_max_fps() -> f64 {
    60.0
}

fn default_frame_skip() -> u64 {
    2
}

fn default_bitrate_poll_interval() -> u64 {
    500
}

fn default_moderation_sample_interval() -> u64 {
    10
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            max_fps: default_max_fps(),
            frame_skip: default_frame_skip(),
            bitrate_poll_interval_ms: default_bitrate_poll_interval(),
            bitrate_kbps: 0,
            moderation_sample_interval: default_moderation_sample_interval(),
            moderation_precedence: ModerationPrecedence::default(),
            output_resolution: OutputResolution::default(),
        }
    }
}
