use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::frame::FrameFormat;
use crate::streaming::StreamingConfig;
use crate::tools::ToolsConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub temp: TempConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Temp directory layout configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TempConfig {
    /// Root under which per-target temp directories are created.
    #[serde(default = "default_temp_root")]
    pub root: PathBuf,
    /// Image format used for extracted frames.
    #[serde(default)]
    pub frame_format: FrameFormat,
    /// Skip removal of temp directories at the end of a run.
    #[serde(default)]
    pub keep_temp: bool,
}

impl Default for TempConfig {
    fn default() -> Self {
        Self {
            root: default_temp_root(),
            frame_format: FrameFormat::default(),
            keep_temp: false,
        }
    }
}

fn default_temp_root() -> PathBuf {
    std::env::temp_dir()
}

/// Batch execution configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Number of frames processed in parallel.
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,
    /// Ordered processing capabilities applied to every frame.
    #[serde(default = "default_processors")]
    pub processors: Vec<String>,
    /// Frame of a video target used as the reference frame.
    #[serde(default)]
    pub reference_frame_number: u64,
    /// Frames per second fed to the content classifier while analysing a video.
    #[serde(default = "default_analysis_rate")]
    pub analysis_sample_rate: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            thread_count: default_thread_count(),
            processors: default_processors(),
            reference_frame_number: 0,
            analysis_sample_rate: default_analysis_rate(),
        }
    }
}

fn default_thread_count() -> usize {
    4
}

fn default_processors() -> Vec<String> {
    vec!["passthrough".to_string()]
}

fn default_analysis_rate() -> u32 {
    1
}

/// Output encoding configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Requested output fps; capped by the target's own fps for video targets.
    #[serde(default)]
    pub video_fps: Option<f64>,
    #[serde(default = "default_scale")]
    pub video_scale: f64,
    #[serde(default = "default_scale")]
    pub image_scale: f64,
    #[serde(default = "default_video_encoder")]
    pub video_encoder: String,
    #[serde(default = "default_video_preset")]
    pub video_preset: String,
    /// 0-100, mapped onto the encoder's quality scale.
    #[serde(default = "default_quality")]
    pub video_quality: u8,
    #[serde(default = "default_quality")]
    pub image_quality: u8,
    #[serde(default = "default_audio_encoder")]
    pub audio_encoder: String,
    /// 0 disables audio restoration entirely.
    #[serde(default = "default_audio_volume")]
    pub audio_volume: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            video_fps: None,
            video_scale: default_scale(),
            image_scale: default_scale(),
            video_encoder: default_video_encoder(),
            video_preset: default_video_preset(),
            video_quality: default_quality(),
            image_quality: default_quality(),
            audio_encoder: default_audio_encoder(),
            audio_volume: default_audio_volume(),
        }
    }
}

fn default_scale() -> f64 {
    1.0
}

fn default_video_encoder() -> String {
    "libx264".to_string()
}

fn default_video_preset() -> String {
    "veryfast".to_string()
}

fn default_quality() -> u8 {
    80
}

fn default_audio_encoder() -> String {
    "aac".to_string()
}

fn default_audio_volume() -> u8 {
    100
}

/// Config view served over the API
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub temp: TempConfig,
    pub execution: ExecutionConfig,
    pub output: OutputConfig,
    pub streaming: StreamingConfig,
    pub tools: SanitizedToolsConfig,
}

/// Tool paths are reduced to their file names.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedToolsConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub timeout_secs: u64,
}

fn binary_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            temp: config.temp.clone(),
            execution: config.execution.clone(),
            output: config.output.clone(),
            streaming: config.streaming.clone(),
            tools: SanitizedToolsConfig {
                ffmpeg: binary_name(&config.tools.ffmpeg_path),
                ffprobe: binary_name(&config.tools.ffprobe_path),
                timeout_secs: config.tools.timeout_secs,
            },
        }
    }
}
