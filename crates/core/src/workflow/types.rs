//! Types for the workflow module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::batch::BatchError;
use crate::frame::Resolution;
use crate::tools::{MediaInfo, ToolError, TrimRange};

/// Integer outcome of a stage or a whole workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    ToolFailure = 1,
    IncompleteIo = 2,
    ModerationReject = 3,
    UserCancelled = 4,
    ConfigurationError = 5,
}

impl ErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn is_success(&self) -> bool {
        *self == ErrorCode::Success
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Success => "success",
            ErrorCode::ToolFailure => "tool_failure",
            ErrorCode::IncompleteIo => "incomplete_io",
            ErrorCode::ModerationReject => "moderation_reject",
            ErrorCode::UserCancelled => "user_cancelled",
            ErrorCode::ConfigurationError => "configuration_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ToolError> for ErrorCode {
    fn from(err: &ToolError) -> Self {
        match err {
            ToolError::Cancelled => ErrorCode::UserCancelled,
            ToolError::IncompleteIo { .. } | ToolError::Io(_) => ErrorCode::IncompleteIo,
            _ => ErrorCode::ToolFailure,
        }
    }
}

impl From<&BatchError> for ErrorCode {
    fn from(err: &BatchError) -> Self {
        match err {
            BatchError::Cancelled { .. } => ErrorCode::UserCancelled,
            BatchError::NoFrames | BatchError::FrameFailed { .. } => ErrorCode::ToolFailure,
        }
    }
}

/// Kind of job a workflow run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowVariant {
    ImageToImage,
    ImageToVideo,
    AudioToImage,
}

impl WorkflowVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowVariant::ImageToImage => "image-to-image",
            WorkflowVariant::ImageToVideo => "image-to-video",
            WorkflowVariant::AudioToImage => "audio-to-image",
        }
    }

    /// Stage order for this variant. The last stage is always cleanup.
    pub fn stages(&self) -> Vec<WorkflowStage> {
        use StageKind::*;
        let kinds: &[StageKind] = match self {
            WorkflowVariant::ImageToImage => &[
                AnalyseImage,
                Clear,
                Setup,
                PrepareImage,
                ProcessImage,
                FinalizeImage,
                Clear,
            ],
            WorkflowVariant::ImageToVideo => &[
                AnalyseVideo,
                Clear,
                Setup,
                ExtractFrames,
                ProcessFrames,
                MergeFrames,
                RestoreAudio,
                FinalizeVideo,
                Clear,
            ],
            WorkflowVariant::AudioToImage => &[
                AnalyseImage,
                Clear,
                Setup,
                SpawnFrames,
                ProcessFrames,
                MergeFrames,
                RestoreAudio,
                FinalizeVideo,
                Clear,
            ],
        };
        kinds
            .iter()
            .enumerate()
            .map(|(ordinal, kind)| WorkflowStage {
                ordinal,
                kind: *kind,
            })
            .collect()
    }
}

impl fmt::Display for WorkflowVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    AnalyseImage,
    AnalyseVideo,
    Clear,
    Setup,
    PrepareImage,
    ExtractFrames,
    SpawnFrames,
    ProcessImage,
    ProcessFrames,
    MergeFrames,
    RestoreAudio,
    FinalizeImage,
    FinalizeVideo,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::AnalyseImage => "analyse_image",
            StageKind::AnalyseVideo => "analyse_video",
            StageKind::Clear => "clear",
            StageKind::Setup => "setup",
            StageKind::PrepareImage => "prepare_image",
            StageKind::ExtractFrames => "extract_frames",
            StageKind::SpawnFrames => "spawn_frames",
            StageKind::ProcessImage => "process_image",
            StageKind::ProcessFrames => "process_frames",
            StageKind::MergeFrames => "merge_frames",
            StageKind::RestoreAudio => "restore_audio",
            StageKind::FinalizeImage => "finalize_image",
            StageKind::FinalizeVideo => "finalize_video",
        }
    }

    pub fn is_cleanup(&self) -> bool {
        matches!(self, StageKind::Clear)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage at its position in a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStage {
    pub ordinal: usize,
    pub kind: StageKind,
}

impl WorkflowStage {
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }
}

/// Rough classification of an input by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Unknown,
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp", "tif", "tiff"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "avi", "webm", "m4v", "wmv"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "opus", "m4a"];

impl MediaKind {
    pub fn of(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let extension = extension.as_str();
        if IMAGE_EXTENSIONS.contains(&extension) {
            MediaKind::Image
        } else if VIDEO_EXTENSIONS.contains(&extension) {
            MediaKind::Video
        } else if AUDIO_EXTENSIONS.contains(&extension) {
            MediaKind::Audio
        } else {
            MediaKind::Unknown
        }
    }
}

/// State of one workflow run, owned by that run.
#[derive(Debug, Clone)]
pub struct ProcessingJobContext {
    pub job_id: Uuid,
    pub target_path: PathBuf,
    /// Sources in the order given; images and audio may be mixed.
    pub source_paths: Vec<PathBuf>,
    pub output_path: PathBuf,
    pub trim_frame_start: Option<u64>,
    pub trim_frame_end: Option<u64>,
    /// Filled in by the setup stage.
    pub temp_dir: Option<PathBuf>,
    pub resolution: Option<Resolution>,
    pub fps: Option<f64>,
    pub trim: Option<TrimRange>,
    /// Probe result for the target, cached by the first stage that needs it.
    pub media: Option<MediaInfo>,
    /// Frames to spawn for still-image targets.
    pub spawn_frame_count: Option<u64>,
}

impl ProcessingJobContext {
    pub fn new(target_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            target_path: target_path.into(),
            source_paths: Vec::new(),
            output_path: output_path.into(),
            trim_frame_start: None,
            trim_frame_end: None,
            temp_dir: None,
            resolution: None,
            fps: None,
            trim: None,
            media: None,
            spawn_frame_count: None,
        }
    }

    pub fn with_sources(mut self, sources: Vec<PathBuf>) -> Self {
        self.source_paths = sources;
        self
    }

    pub fn with_trim(mut self, start: Option<u64>, end: Option<u64>) -> Self {
        self.trim_frame_start = start;
        self.trim_frame_end = end;
        self
    }

    pub fn image_sources(&self) -> Vec<&Path> {
        self.source_paths
            .iter()
            .filter(|p| MediaKind::of(p) == MediaKind::Image)
            .map(PathBuf::as_path)
            .collect()
    }

    /// First source that is an audio file.
    pub fn audio_source(&self) -> Option<&Path> {
        self.source_paths
            .iter()
            .find(|p| MediaKind::of(p) == MediaKind::Audio)
            .map(PathBuf::as_path)
    }

    /// Output extension without the dot, lowercased.
    pub fn output_extension(&self) -> String {
        self.output_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_variant_ends_with_cleanup() {
        for variant in [
            WorkflowVariant::ImageToImage,
            WorkflowVariant::ImageToVideo,
            WorkflowVariant::AudioToImage,
        ] {
            let stages = variant.stages();
            assert!(stages.last().unwrap().kind.is_cleanup());
            assert!(stages.iter().enumerate().all(|(i, s)| s.ordinal == i));
        }
    }

    #[test]
    fn test_image_to_video_order() {
        let names: Vec<_> = WorkflowVariant::ImageToVideo
            .stages()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(
            names,
            vec![
                "analyse_video",
                "clear",
                "setup",
                "extract_frames",
                "process_frames",
                "merge_frames",
                "restore_audio",
                "finalize_video",
                "clear"
            ]
        );
    }

    #[test]
    fn test_error_code_from_tool_error() {
        assert_eq!(ErrorCode::from(&ToolError::Cancelled), ErrorCode::UserCancelled);
        assert_eq!(
            ErrorCode::from(&ToolError::IncompleteIo {
                expected: 4,
                actual: 1
            }),
            ErrorCode::IncompleteIo
        );
        assert_eq!(
            ErrorCode::from(&ToolError::malformed("bad")),
            ErrorCode::ToolFailure
        );
        assert_eq!(ErrorCode::ModerationReject.code(), 3);
    }

    #[test]
    fn test_variant_serde() {
        let variant: WorkflowVariant = serde_json::from_str("\"audio-to-image\"").unwrap();
        assert_eq!(variant, WorkflowVariant::AudioToImage);
    }

    #[test]
    fn test_source_partition() {
        let ctx = ProcessingJobContext::new("/in/target.mp4", "/out/result.mp4").with_sources(vec![
            PathBuf::from("/in/face.jpg"),
            PathBuf::from("/in/voice.wav"),
            PathBuf::from("/in/face2.png"),
        ]);
        assert_eq!(ctx.image_sources().len(), 2);
        assert_eq!(ctx.audio_source(), Some(Path::new("/in/voice.wav")));
        assert_eq!(ctx.output_extension(), "mp4");
    }
}
