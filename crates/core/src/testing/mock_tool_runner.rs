//! Mock tool runner for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use regex_lite::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::frame::{save_frame, Frame, Resolution};
use crate::tools::{
    AudioStreamInfo, ToolError, ToolInvocation, ToolOperation, ToolOutput, ToolRunner,
    VideoStreamInfo,
};

const FRAME_PATTERN: &str = "%08d";

/// Mock implementation of the ToolRunner trait.
///
/// Instead of running ffmpeg it fabricates what ffmpeg would have left behind:
/// - Probes answer from a configurable video and audio stream
/// - Frame extraction writes solid-colour frames at the output pattern
/// - Merges and muxes write a placeholder output file
/// - Image copies write a decodable image at the requested size
///
/// Every invocation is recorded, and any operation can be made to fail.
///
/// # Example
///
/// ```rust,ignore
/// use framefuse_core::testing::MockToolRunner;
///
/// let runner = Arc::new(MockToolRunner::new().with_video(Resolution::new(8, 8), 25.0, 10));
/// runner.fail_operation(ToolOperation::MergeVideo);
///
/// let bridge = ToolBridge::new(runner.clone(), tools_config, output_config);
/// // ... run a workflow ...
/// assert_eq!(runner.invocations_for(ToolOperation::ExtractFrames).len(), 1);
/// ```
pub struct MockToolRunner {
    invocations: Mutex<Vec<ToolInvocation>>,
    failing: Mutex<HashSet<ToolOperation>>,
    video: Mutex<Option<VideoStreamInfo>>,
    audio: Mutex<Option<AudioStreamInfo>>,
    audio_duration_secs: f64,
    frame_color: [u8; 3],
    delay: Mutex<Duration>,
}

impl Default for MockToolRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockToolRunner {
    /// A 10-frame 8x8 video at 25 fps with 2 s of 48 kHz stereo audio.
    pub fn new() -> Self {
        let audio_duration_secs = 2.0;
        Self {
            invocations: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            video: Mutex::new(Some(VideoStreamInfo {
                resolution: Resolution::new(8, 8),
                fps: 25.0,
                frame_total: 10,
            })),
            audio: Mutex::new(Some(AudioStreamInfo {
                codec: Some("pcm_s16le".to_string()),
                sample_rate: 48000,
                channels: 2,
                frame_total: (48000.0 * audio_duration_secs) as u64,
            })),
            audio_duration_secs,
            frame_color: [128, 128, 128],
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn with_video(self, resolution: Resolution, fps: f64, frame_total: u64) -> Self {
        *self.video.lock() = Some(VideoStreamInfo {
            resolution,
            fps,
            frame_total,
        });
        self
    }

    /// Probes report no audio stream.
    pub fn without_audio(self) -> Self {
        *self.audio.lock() = None;
        self
    }

    /// Colour of fabricated frames.
    pub fn with_frame_color(mut self, rgb: [u8; 3]) -> Self {
        self.frame_color = rgb;
        self
    }

    /// Every invocation waits this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Makes every invocation of `operation` exit with status 1.
    pub fn fail_operation(&self, operation: ToolOperation) {
        self.failing.lock().insert(operation);
    }

    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations.lock().clone()
    }

    pub fn invocations_for(&self, operation: ToolOperation) -> Vec<ToolInvocation> {
        self.invocations
            .lock()
            .iter()
            .filter(|i| i.operation == operation)
            .cloned()
            .collect()
    }

    pub fn operations(&self) -> Vec<ToolOperation> {
        self.invocations.lock().iter().map(|i| i.operation).collect()
    }

    fn probe_json(&self) -> String {
        let video = *self.video.lock();
        let audio = self.audio.lock().clone();
        let mut streams = Vec::new();
        let mut duration = self.audio_duration_secs;

        if let Some(video) = video {
            duration = video.frame_total as f64 / video.fps;
            streams.push(serde_json::json!({
                "codec_type": "video",
                "codec_name": "h264",
                "width": video.resolution.width,
                "height": video.resolution.height,
                "avg_frame_rate": video.fps.to_string(),
                "nb_frames": video.frame_total.to_string(),
            }));
        }
        if let Some(audio) = audio {
            streams.push(serde_json::json!({
                "codec_type": "audio",
                "codec_name": audio.codec,
                "sample_rate": audio.sample_rate.to_string(),
                "channels": audio.channels,
                "duration": format!("{:.3}", self.audio_duration_secs),
            }));
        }

        serde_json::json!({
            "format": {
                "format_name": "mov,mp4,m4a,3gp",
                "duration": format!("{:.3}", duration),
            },
            "streams": streams,
        })
        .to_string()
    }

    fn probe_audio_entry(&self, invocation: &ToolInvocation) -> String {
        let Some(audio) = self.audio.lock().clone() else {
            return String::new();
        };
        match invocation.arg_after("-show_entries") {
            Some("stream=sample_rate") => audio.sample_rate.to_string(),
            Some("stream=channels") => audio.channels.to_string(),
            Some("stream=codec_name") => audio.codec.unwrap_or_default(),
            Some("format=duration") => format!("{:.6}", self.audio_duration_secs),
            _ => String::new(),
        }
    }

    /// How many frames ffmpeg would have written for this extraction.
    fn frame_count(&self, invocation: &ToolInvocation) -> u64 {
        let filter = invocation.arg_after("-vf").unwrap_or_default();
        let frame_total = self.video.lock().map(|v| v.frame_total).unwrap_or(0);

        let (start, end) = Regex::new(r"trim=start_frame=(\d+):end_frame=(\d+)")
            .ok()
            .and_then(|re| {
                let caps = re.captures(filter)?;
                Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
            })
            .unwrap_or((0, frame_total));
        let range: u64 = end.saturating_sub(start);

        match invocation.operation {
            ToolOperation::SpawnFrames => invocation
                .arg_after("-frames:v")
                .and_then(|n| n.parse().ok())
                .unwrap_or(0),
            ToolOperation::SampleFrames => {
                let step = Regex::new(r"mod\(n\\,(\d+)\)")
                    .ok()
                    .and_then(|re| re.captures(filter)?[1].parse::<u64>().ok())
                    .unwrap_or(1)
                    .max(1);
                range.div_ceil(step)
            }
            _ => range,
        }
    }

    fn resolution(&self, invocation: &ToolInvocation) -> Resolution {
        invocation
            .arg_after("-s")
            .and_then(Resolution::parse)
            .or_else(|| self.video.lock().map(|v| v.resolution))
            .unwrap_or_else(|| Resolution::new(8, 8))
    }

    fn write_frames(&self, invocation: &ToolInvocation) -> Result<(), ToolError> {
        let pattern = output_arg(invocation)?;
        let pattern = pattern.to_string_lossy().to_string();
        let frame = Frame::solid(self.resolution(invocation), self.frame_color);
        for n in 1..=self.frame_count(invocation) {
            let path = PathBuf::from(pattern.replace(FRAME_PATTERN, &format!("{:08}", n)));
            write_image(&path, &frame)?;
        }
        Ok(())
    }
}

fn output_arg(invocation: &ToolInvocation) -> Result<PathBuf, ToolError> {
    invocation
        .args
        .last()
        .map(PathBuf::from)
        .ok_or_else(|| ToolError::malformed("invocation without output"))
}

fn write_image(path: &Path, frame: &Frame) -> Result<(), ToolError> {
    save_frame(path, frame, None).map_err(|e| ToolError::Io(std::io::Error::other(e.to_string())))
}

#[async_trait]
impl ToolRunner for MockToolRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        self.invocations.lock().push(invocation.clone());

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let operation = invocation.operation;
        if self.failing.lock().contains(&operation) {
            return Err(ToolError::failed(operation, Some(1), "mock failure"));
        }

        let mut output = ToolOutput::success();
        match operation {
            ToolOperation::Probe => output.stdout = self.probe_json().into_bytes(),
            ToolOperation::ProbeAudio => output.stdout = self.probe_audio_entry(invocation).into_bytes(),
            ToolOperation::ExtractFrames
            | ToolOperation::SampleFrames
            | ToolOperation::SpawnFrames => self.write_frames(invocation)?,
            ToolOperation::MergeVideo | ToolOperation::RestoreAudio | ToolOperation::ReplaceAudio => {
                tokio::fs::write(output_arg(invocation)?, b"mock video").await?;
            }
            ToolOperation::CopyImage | ToolOperation::FinalizeImage => {
                let frame = Frame::solid(self.resolution(invocation), self.frame_color);
                write_image(&output_arg(invocation)?, &frame)?;
            }
            ToolOperation::ExtractAudio => {
                let (rate, channels) = self
                    .audio
                    .lock()
                    .as_ref()
                    .map(|a| (a.sample_rate, a.channels))
                    .unwrap_or((0, 0));
                let samples = (rate as f64 * self.audio_duration_secs) as usize * channels as usize;
                output.stdout = vec![0; samples * 2];
            }
            ToolOperation::StreamRawVideo => {}
        }
        Ok(output)
    }
}
