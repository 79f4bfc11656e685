//! Types describing tool invocations and probed media.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frame::Resolution;

/// External binaries the bridge can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Ffmpeg,
    Ffprobe,
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolKind::Ffmpeg => write!(f, "ffmpeg"),
            ToolKind::Ffprobe => write!(f, "ffprobe"),
        }
    }
}

/// What an invocation is for. Used for logging, metrics and test assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOperation {
    Probe,
    ProbeAudio,
    ExtractFrames,
    SampleFrames,
    SpawnFrames,
    MergeVideo,
    RestoreAudio,
    ReplaceAudio,
    CopyImage,
    FinalizeImage,
    ExtractAudio,
    StreamRawVideo,
}

impl ToolOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolOperation::Probe => "probe",
            ToolOperation::ProbeAudio => "probe_audio",
            ToolOperation::ExtractFrames => "extract_frames",
            ToolOperation::SampleFrames => "sample_frames",
            ToolOperation::SpawnFrames => "spawn_frames",
            ToolOperation::MergeVideo => "merge_video",
            ToolOperation::RestoreAudio => "restore_audio",
            ToolOperation::ReplaceAudio => "replace_audio",
            ToolOperation::CopyImage => "copy_image",
            ToolOperation::FinalizeImage => "finalize_image",
            ToolOperation::ExtractAudio => "extract_audio",
            ToolOperation::StreamRawVideo => "stream_raw_video",
        }
    }
}

impl fmt::Display for ToolOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully built command line, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool: ToolKind,
    pub operation: ToolOperation,
    pub args: Vec<String>,
}

impl ToolInvocation {
    pub fn ffmpeg(operation: ToolOperation, args: Vec<String>) -> Self {
        Self {
            tool: ToolKind::Ffmpeg,
            operation,
            args,
        }
    }

    pub fn ffprobe(operation: ToolOperation, args: Vec<String>) -> Self {
        Self {
            tool: ToolKind::Ffprobe,
            operation,
            args,
        }
    }

    /// Value following `flag`, if present.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

/// Output captured from a finished tool process.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code, `None` when killed by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }
}

/// Inclusive-exclusive frame range of a target that gets processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimRange {
    pub start: u64,
    pub end: u64,
}

impl TrimRange {
    /// Clamps requested bounds into `[0, frame_total]`.
    ///
    /// Missing bounds default to the full range; an end at or before the start
    /// falls back to the frame total.
    pub fn restrict(frame_total: u64, start: Option<u64>, end: Option<u64>) -> Self {
        let start = start.map(|s| s.min(frame_total)).unwrap_or(0);
        let end = end.map(|e| e.min(frame_total)).unwrap_or(frame_total);
        let end = if end <= start { frame_total } else { end };
        Self { start, end }
    }

    pub fn frame_count(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the range covers less than the whole target.
    pub fn is_trimmed(&self, frame_total: u64) -> bool {
        self.start > 0 || self.end < frame_total
    }
}

/// Video stream properties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub resolution: Resolution,
    pub fps: f64,
    pub frame_total: u64,
}

/// Audio stream properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub codec: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    /// `duration × sample_rate`.
    pub frame_total: u64,
}

/// Probed information about a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub format: String,
    pub duration_secs: f64,
    pub video: Option<VideoStreamInfo>,
    pub audio: Option<AudioStreamInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restrict_trim_defaults_to_full_range() {
        let trim = TrimRange::restrict(100, None, None);
        assert_eq!(trim, TrimRange { start: 0, end: 100 });
        assert!(!trim.is_trimmed(100));
    }

    #[test]
    fn test_restrict_trim_clamps() {
        let trim = TrimRange::restrict(100, Some(20), Some(500));
        assert_eq!(trim, TrimRange { start: 20, end: 100 });
        assert_eq!(trim.frame_count(), 80);
        assert!(trim.is_trimmed(100));
    }

    #[test]
    fn test_restrict_trim_inverted_range() {
        let trim = TrimRange::restrict(100, Some(50), Some(10));
        assert_eq!(trim, TrimRange { start: 50, end: 100 });
    }

    #[test]
    fn test_arg_after() {
        let inv = ToolInvocation::ffmpeg(
            ToolOperation::StreamRawVideo,
            vec!["-ss".into(), "2.000".into(), "-i".into(), "url".into()],
        );
        assert_eq!(inv.arg_after("-ss"), Some("2.000"));
        assert_eq!(inv.arg_after("-i"), Some("url"));
        assert_eq!(inv.arg_after("url"), None);
    }
}
