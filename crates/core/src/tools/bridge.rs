//! The bridge between workflow stages and the external codec tools.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::config::ToolsConfig;
use super::error::ToolError;
use super::ffmpeg::FfmpegArgs;
use super::ffprobe::{audio_entry_args, parse_entry, parse_probe_output, probe_args};
use super::raw_reader::decode_s16le;
use super::runner::ToolRunner;
use super::types::{MediaInfo, ToolInvocation, ToolOperation, ToolOutput, TrimRange};
use crate::config::OutputConfig;
use crate::frame::Resolution;

/// Typed operations over ffmpeg/ffprobe.
///
/// Every operation checks its inputs exist before spawning anything and
/// reports failure as a [`ToolError`]; mapping that onto a workflow error
/// code is the caller's business.
#[derive(Clone)]
pub struct ToolBridge {
    runner: Arc<dyn ToolRunner>,
    args: FfmpegArgs,
    config: ToolsConfig,
}

fn require_input(path: &Path) -> Result<(), ToolError> {
    if path.exists() {
        Ok(())
    } else {
        Err(ToolError::InputNotFound {
            path: path.to_path_buf(),
        })
    }
}

impl ToolBridge {
    pub fn new(runner: Arc<dyn ToolRunner>, config: ToolsConfig, output: OutputConfig) -> Self {
        let args = FfmpegArgs::new(config.log_level.clone(), output);
        Self {
            runner,
            args,
            config,
        }
    }

    pub fn args(&self) -> &FfmpegArgs {
        &self.args
    }

    pub fn config(&self) -> &ToolsConfig {
        &self.config
    }

    pub fn runner_name(&self) -> &str {
        self.runner.name()
    }

    async fn ffmpeg(&self, operation: ToolOperation, args: Vec<String>) -> Result<ToolOutput, ToolError> {
        self.runner
            .run(&ToolInvocation::ffmpeg(operation, args))
            .await
    }

    async fn ffprobe(&self, operation: ToolOperation, args: Vec<String>) -> Result<ToolOutput, ToolError> {
        self.runner
            .run(&ToolInvocation::ffprobe(operation, args))
            .await
    }

    /// Probes format and stream information.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn probe(&self, path: &Path) -> Result<MediaInfo, ToolError> {
        require_input(path)?;
        let output = self.ffprobe(ToolOperation::Probe, probe_args(path)).await?;
        let info = parse_probe_output(&output.stdout_text())?;
        debug!(format = %info.format, duration = info.duration_secs, "Probed media");
        Ok(info)
    }

    async fn audio_entry<T: std::str::FromStr>(&self, path: &Path, entries: &str) -> Result<T, ToolError> {
        require_input(path)?;
        let output = self
            .ffprobe(ToolOperation::ProbeAudio, audio_entry_args(path, entries))
            .await?;
        parse_entry(&output.stdout_text())
    }

    pub async fn detect_audio_sample_rate(&self, path: &Path) -> Result<u32, ToolError> {
        self.audio_entry(path, "stream=sample_rate").await
    }

    pub async fn detect_audio_channel_total(&self, path: &Path) -> Result<u16, ToolError> {
        self.audio_entry(path, "stream=channels").await
    }

    /// Audio duration times sample rate.
    pub async fn detect_audio_frame_total(&self, path: &Path) -> Result<u64, ToolError> {
        let duration: f64 = self.audio_entry(path, "format=duration").await?;
        let sample_rate = self.detect_audio_sample_rate(path).await?;
        Ok((duration * sample_rate as f64).floor() as u64)
    }

    pub async fn detect_audio_format(&self, path: &Path) -> Result<String, ToolError> {
        self.audio_entry(path, "stream=codec_name").await
    }

    pub async fn extract_frames(
        &self,
        target: &Path,
        frame_pattern: &Path,
        resolution: Resolution,
        fps: f64,
        trim: TrimRange,
        frame_total: u64,
    ) -> Result<(), ToolError> {
        require_input(target)?;
        let args = self
            .args
            .extract_frames(target, frame_pattern, resolution, fps, trim, frame_total);
        self.ffmpeg(ToolOperation::ExtractFrames, args).await?;
        Ok(())
    }

    pub async fn sample_frames(
        &self,
        target: &Path,
        frame_pattern: &Path,
        trim: TrimRange,
        step: u64,
    ) -> Result<(), ToolError> {
        require_input(target)?;
        let args = self.args.sample_frames(target, frame_pattern, trim, step);
        self.ffmpeg(ToolOperation::SampleFrames, args).await?;
        Ok(())
    }

    pub async fn spawn_frames(
        &self,
        target_image: &Path,
        frame_pattern: &Path,
        resolution: Resolution,
        fps: f64,
        frame_count: u64,
    ) -> Result<(), ToolError> {
        require_input(target_image)?;
        let args = self
            .args
            .spawn_frames(target_image, frame_pattern, resolution, fps, frame_count);
        self.ffmpeg(ToolOperation::SpawnFrames, args).await?;
        Ok(())
    }

    pub async fn merge_video(
        &self,
        frame_pattern: &Path,
        temp_video: &Path,
        fps: f64,
        resolution: Resolution,
    ) -> Result<(), ToolError> {
        if let Some(dir) = frame_pattern.parent() {
            require_input(dir)?;
        }
        let args = self.args.merge_video(frame_pattern, temp_video, fps, resolution);
        self.ffmpeg(ToolOperation::MergeVideo, args).await?;
        Ok(())
    }

    pub async fn restore_audio(
        &self,
        temp_video: &Path,
        target: &Path,
        trim: TrimRange,
        target_fps: f64,
        frame_total: u64,
        output: &Path,
    ) -> Result<(), ToolError> {
        require_input(temp_video)?;
        require_input(target)?;
        let args = self
            .args
            .restore_audio(temp_video, target, trim, target_fps, frame_total, output);
        self.ffmpeg(ToolOperation::RestoreAudio, args).await?;
        Ok(())
    }

    pub async fn replace_audio(&self, temp_video: &Path, audio: &Path, output: &Path) -> Result<(), ToolError> {
        require_input(temp_video)?;
        require_input(audio)?;
        let args = self.args.replace_audio(temp_video, audio, output);
        self.ffmpeg(ToolOperation::ReplaceAudio, args).await?;
        Ok(())
    }

    pub async fn copy_image(&self, target: &Path, temp_image: &Path, resolution: Resolution) -> Result<(), ToolError> {
        require_input(target)?;
        let args = self.args.copy_image(target, temp_image, resolution);
        self.ffmpeg(ToolOperation::CopyImage, args).await?;
        Ok(())
    }

    pub async fn finalize_image(&self, temp_image: &Path, output: &Path, resolution: Resolution) -> Result<(), ToolError> {
        require_input(temp_image)?;
        let args = self.args.finalize_image(temp_image, output, resolution);
        self.ffmpeg(ToolOperation::FinalizeImage, args).await?;
        Ok(())
    }

    /// Decodes an audio file to interleaved samples.
    pub async fn extract_audio_pcm(
        &self,
        audio: &Path,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Vec<i16>, ToolError> {
        require_input(audio)?;
        let args = self.args.extract_audio_pcm(audio, sample_rate, channels);
        let output = self.ffmpeg(ToolOperation::ExtractAudio, args).await?;
        decode_s16le(&output.stdout, channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockToolRunner;
    use tempfile::TempDir;

    fn bridge(runner: Arc<MockToolRunner>) -> ToolBridge {
        ToolBridge::new(runner, ToolsConfig::default(), OutputConfig::default())
    }

    #[tokio::test]
    async fn test_probe_missing_input() {
        let runner = Arc::new(MockToolRunner::new());
        let result = bridge(runner.clone())
            .probe(Path::new("/nonexistent/clip.mp4"))
            .await;
        assert!(matches!(result, Err(ToolError::InputNotFound { .. })));
        assert!(runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_probe_parses_runner_output() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("clip.mp4");
        std::fs::write(&target, b"video").unwrap();

        let runner = Arc::new(MockToolRunner::new());
        let info = bridge(runner.clone()).probe(&target).await.unwrap();
        assert!(info.video.is_some());
        assert_eq!(runner.invocations_for(ToolOperation::Probe).len(), 1);
    }

    #[tokio::test]
    async fn test_audio_queries() {
        let dir = TempDir::new().unwrap();
        let audio = dir.path().join("voice.wav");
        std::fs::write(&audio, b"audio").unwrap();

        let runner = Arc::new(MockToolRunner::new());
        let bridge = bridge(runner);
        assert_eq!(bridge.detect_audio_sample_rate(&audio).await.unwrap(), 48000);
        assert_eq!(bridge.detect_audio_channel_total(&audio).await.unwrap(), 2);
        assert_eq!(bridge.detect_audio_format(&audio).await.unwrap(), "pcm_s16le");
        assert_eq!(bridge.detect_audio_frame_total(&audio).await.unwrap(), 96000);
    }

    #[tokio::test]
    async fn test_runner_failure_is_propagated() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("clip.mp4");
        std::fs::write(&target, b"video").unwrap();

        let runner = Arc::new(MockToolRunner::new());
        runner.fail_operation(ToolOperation::CopyImage);
        let result = bridge(runner)
            .copy_image(&target, &dir.path().join("temp.png"), Resolution::new(4, 4))
            .await;
        assert!(matches!(result, Err(ToolError::Failed { .. })));
    }
}
