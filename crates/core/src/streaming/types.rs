//! Types for live sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::config::{ModerationPrecedence, OutputResolution, StreamingConfig};
use crate::frame::{Frame, FrameError};
use crate::tools::ToolError;

/// Errors on a live session.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The session or its transport is closed.
    #[error("Session closed")]
    Closed,

    #[error("Session not found: {id}")]
    NotFound { id: Uuid },

    /// A consumer is already draining the session.
    #[error("Session already has a consumer")]
    SinkAttached,

    /// The operation needs a remote source.
    #[error("Session has no remote source")]
    NotRemote,

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Init,
    Negotiating,
    Streaming,
    Closing,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Init => "init",
            SessionState::Negotiating => "negotiating",
            SessionState::Streaming => "streaming",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side-channel notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The output queue first reached half capacity. Sent once.
    Ready,
    /// Output frame `n` was enqueued.
    Frame(u64),
    /// The target bitrate changed, bits per second.
    Bitrate(u64),
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::Ready => write!(f, "ready"),
            SessionEvent::Frame(n) => write!(f, "frame:{}", n),
            SessionEvent::Bitrate(bps) => write!(f, "bitrate:{}", bps),
        }
    }
}

/// A processed frame waiting for egress.
#[derive(Debug, Clone)]
pub struct OutputFrame {
    pub frame: Frame,
    pub sequence: u64,
    /// Time since the session was created.
    pub pts: Duration,
    /// Whether the frame went through the pipeline or repeats an earlier output.
    pub reused: bool,
    pub redacted: bool,
}

/// What happened to a pushed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued { sequence: u64, evicted: bool },
    RateLimited,
    ProcessingFailed,
    /// The frame came from a remote stream that a seek has since replaced.
    Stale,
    Closed,
}

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub buffer_size: usize,
    pub max_fps: f64,
    pub frame_skip: u64,
    pub bitrate_kbps: u64,
    pub bitrate_poll_interval: Duration,
    pub moderation_sample_interval: u64,
    pub moderation_precedence: ModerationPrecedence,
    pub output_resolution: OutputResolution,
}

impl SessionOptions {
    pub fn from_config(config: &StreamingConfig) -> Self {
        Self {
            buffer_size: config.buffer_size,
            max_fps: config.max_fps,
            frame_skip: config.frame_skip,
            bitrate_kbps: config.bitrate_kbps,
            bitrate_poll_interval: Duration::from_millis(config.bitrate_poll_interval_ms),
            moderation_sample_interval: config.moderation_sample_interval,
            moderation_precedence: config.moderation_precedence,
            output_resolution: config.output_resolution,
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_bitrate(mut self, kbps: u64) -> Self {
        self.bitrate_kbps = kbps;
        self
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&StreamingConfig::default())
    }
}

/// Snapshot of a session for listings.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub remote: bool,
    pub queued_frames: usize,
    pub queue_capacity: usize,
    pub bitrate_bps: u64,
    pub moderation_locked: bool,
}
