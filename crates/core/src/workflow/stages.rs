//! Stage implementations backed by the tool bridge, the temp layout and the
//! batch frame processor.

use async_trait::async_trait;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::runner::StageExecutor;
use super::types::{ErrorCode, MediaKind, ProcessingJobContext, StageKind};
use crate::batch::{BatchProgress, ConcurrentFrameProcessor, FrameJob, SharedInputs};
use crate::config::{Config, ExecutionConfig, OutputConfig};
use crate::frame::{load_frame, save_frame, AudioFrame, Frame, Resolution};
use crate::moderation::Classifier;
use crate::processing::{
    AudioSlicer, FrameBundle, FramePipeline, ProcessMode, ProcessorError, WorkingFrame,
};
use crate::temp::{frames_in, TempLayout};
use crate::tools::{ToolBridge, ToolError, TrimRange, VideoStreamInfo};

/// Frame rate used when a still image is turned into a video.
const STILL_IMAGE_FPS: f64 = 25.0;

const MODERATION_DIR: &str = "moderation";

/// Runs workflow stages against real media.
pub struct MediaStageExecutor {
    bridge: ToolBridge,
    layout: TempLayout,
    pipeline: Arc<FramePipeline>,
    classifier: Arc<dyn Classifier>,
    execution: ExecutionConfig,
    output: OutputConfig,
}

fn processor_code(err: &ProcessorError) -> ErrorCode {
    match err {
        ProcessorError::Frame(_) => ErrorCode::IncompleteIo,
        ProcessorError::UnknownProcessor { .. } | ProcessorError::NotReady { .. } => {
            ErrorCode::ConfigurationError
        }
        ProcessorError::Failed { .. } => ErrorCode::ToolFailure,
    }
}

fn tool_code(stage: StageKind, err: &ToolError) -> ErrorCode {
    let code = ErrorCode::from(err);
    if code == ErrorCode::UserCancelled {
        info!(stage = %stage, "Tool invocation cancelled");
    } else {
        error!(stage = %stage, error = %err, "Tool invocation failed");
    }
    code
}

impl MediaStageExecutor {
    pub fn new(
        config: &Config,
        bridge: ToolBridge,
        pipeline: Arc<FramePipeline>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            bridge,
            layout: TempLayout::new(&config.temp),
            pipeline,
            classifier,
            execution: config.execution.clone(),
            output: config.output.clone(),
        }
    }

    pub fn layout(&self) -> &TempLayout {
        &self.layout
    }

    /// Races a tool call against the stop request; losing drops (and kills) the process.
    async fn tool<T>(
        &self,
        cancel: &CancellationToken,
        call: impl Future<Output = Result<T, ToolError>>,
    ) -> Result<T, ToolError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ToolError::Cancelled),
            result = call => result,
        }
    }

    async fn target_video(
        &self,
        ctx: &mut ProcessingJobContext,
        cancel: &CancellationToken,
    ) -> Result<VideoStreamInfo, ToolError> {
        if ctx.media.is_none() {
            let info = self.tool(cancel, self.bridge.probe(&ctx.target_path)).await?;
            ctx.media = Some(info);
        }
        ctx.media
            .as_ref()
            .and_then(|m| m.video)
            .ok_or_else(|| ToolError::malformed("target has no video stream"))
    }

    fn working_set(ctx: &ProcessingJobContext) -> Option<(Resolution, f64, TrimRange)> {
        Some((ctx.resolution?, ctx.fps?, ctx.trim?))
    }

    async fn classify_frames(&self, paths: Vec<PathBuf>) -> Result<bool, ProcessorError> {
        let classifier = Arc::clone(&self.classifier);
        tokio::task::spawn_blocking(move || -> Result<bool, ProcessorError> {
            for path in paths {
                let (frame, _) = load_frame(&path)?;
                if classifier.analyse_image(&frame) {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .await
        .map_err(|e| ProcessorError::failed("classifier", e.to_string()))?
    }

    async fn analyse_image(&self, ctx: &ProcessingJobContext) -> ErrorCode {
        match self.classify_frames(vec![ctx.target_path.clone()]).await {
            Ok(false) => ErrorCode::Success,
            Ok(true) => {
                warn!(job_id = %ctx.job_id, target = %ctx.target_path.display(), "Target rejected by moderation");
                ErrorCode::ModerationReject
            }
            Err(e) => {
                error!(job_id = %ctx.job_id, error = %e, "Failed to analyse target");
                processor_code(&e)
            }
        }
    }

    async fn analyse_video(&self, ctx: &mut ProcessingJobContext, cancel: &CancellationToken) -> ErrorCode {
        let video = match self.target_video(ctx, cancel).await {
            Ok(video) => video,
            Err(e) => return tool_code(StageKind::AnalyseVideo, &e),
        };
        let trim = TrimRange::restrict(video.frame_total, ctx.trim_frame_start, ctx.trim_frame_end);
        let rate = self.execution.analysis_sample_rate.max(1) as f64;
        let step = (video.fps / rate).round().max(1.0) as u64;

        let dir = self.layout.directory_path(&ctx.target_path).join(MODERATION_DIR);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create analysis directory");
            return ErrorCode::IncompleteIo;
        }
        let format = self.layout.frame_format();
        let pattern = dir.join(format!("%08d.{}", format.extension()));

        let sampled = self
            .tool(
                cancel,
                self.bridge.sample_frames(&ctx.target_path, &pattern, trim, step),
            )
            .await;
        let result = match sampled {
            Ok(()) => match frames_in(&dir, format).await {
                Ok(frames) => {
                    debug!(samples = frames.len(), step, "Analysing sampled frames");
                    let paths = frames.into_iter().map(|frame| frame.path).collect();
                    self.classify_frames(paths).await.map_err(|e| processor_code(&e))
                }
                Err(_) => Err(ErrorCode::IncompleteIo),
            },
            Err(e) => Err(tool_code(StageKind::AnalyseVideo, &e)),
        };
        let _ = tokio::fs::remove_dir_all(&dir).await;

        match result {
            Ok(false) => ErrorCode::Success,
            Ok(true) => {
                warn!(job_id = %ctx.job_id, target = %ctx.target_path.display(), "Target rejected by moderation");
                ErrorCode::ModerationReject
            }
            Err(code) => code,
        }
    }

    async fn clear(&self, ctx: &ProcessingJobContext) -> ErrorCode {
        match self.layout.clear(&ctx.target_path).await {
            Ok(()) => ErrorCode::Success,
            Err(e) => {
                error!(job_id = %ctx.job_id, error = %e, "Failed to clear temp directory");
                ErrorCode::IncompleteIo
            }
        }
    }

    async fn setup(&self, ctx: &mut ProcessingJobContext, cancel: &CancellationToken) -> ErrorCode {
        match self.layout.create(&ctx.target_path).await {
            Ok(dir) => ctx.temp_dir = Some(dir),
            Err(e) => {
                error!(job_id = %ctx.job_id, error = %e, "Failed to create temp directory");
                return ErrorCode::IncompleteIo;
            }
        }
        if let Some(parent) = ctx.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                error!(job_id = %ctx.job_id, error = %e, "Failed to create output directory");
                return ErrorCode::IncompleteIo;
            }
        }

        if MediaKind::of(&ctx.target_path) == MediaKind::Video {
            let video = match self.target_video(ctx, cancel).await {
                Ok(video) => video,
                Err(e) => return tool_code(StageKind::Setup, &e),
            };
            let fps = self
                .output
                .video_fps
                .map(|requested| requested.min(video.fps))
                .unwrap_or(video.fps);
            ctx.resolution = Some(video.resolution.scale(self.output.video_scale));
            ctx.fps = Some(fps);
            ctx.trim = Some(TrimRange::restrict(
                video.frame_total,
                ctx.trim_frame_start,
                ctx.trim_frame_end,
            ));
        } else {
            let dimensions = match image::image_dimensions(&ctx.target_path) {
                Ok((width, height)) => Resolution::new(width, height),
                Err(e) => {
                    error!(job_id = %ctx.job_id, error = %e, "Failed to read target image");
                    return ErrorCode::IncompleteIo;
                }
            };
            let fps = self.output.video_fps.unwrap_or(STILL_IMAGE_FPS);
            ctx.fps = Some(fps);

            if let Some(audio) = ctx.audio_source().map(Path::to_path_buf) {
                let frame_count = match self.audio_frame_count(&audio, fps, cancel).await {
                    Ok(count) => count,
                    Err(e) => return tool_code(StageKind::Setup, &e),
                };
                ctx.spawn_frame_count = Some(frame_count);
                ctx.resolution = Some(dimensions.scale(self.output.video_scale));
                ctx.trim = Some(TrimRange::restrict(
                    frame_count,
                    ctx.trim_frame_start,
                    ctx.trim_frame_end,
                ));
            } else {
                ctx.resolution = Some(dimensions.scale(self.output.image_scale));
                ctx.trim = Some(TrimRange::restrict(1, None, None));
            }
        }

        info!(
            job_id = %ctx.job_id,
            resolution = ?ctx.resolution,
            fps = ?ctx.fps,
            trim = ?ctx.trim,
            "Workflow set up"
        );
        ErrorCode::Success
    }

    async fn audio_frame_count(
        &self,
        audio: &Path,
        fps: f64,
        cancel: &CancellationToken,
    ) -> Result<u64, ToolError> {
        let samples = self
            .tool(cancel, self.bridge.detect_audio_frame_total(audio))
            .await?;
        let sample_rate = self
            .tool(cancel, self.bridge.detect_audio_sample_rate(audio))
            .await?;
        if sample_rate == 0 {
            return Err(ToolError::malformed("audio sample rate is zero"));
        }
        let duration = samples as f64 / sample_rate as f64;
        Ok(((duration * fps).ceil() as u64).max(1))
    }

    async fn prepare_image(&self, ctx: &ProcessingJobContext, cancel: &CancellationToken) -> ErrorCode {
        let Some(resolution) = ctx.resolution else {
            return ErrorCode::ConfigurationError;
        };
        let temp = self
            .layout
            .temp_file_path(&ctx.target_path, &ctx.output_extension());
        match self
            .tool(cancel, self.bridge.copy_image(&ctx.target_path, &temp, resolution))
            .await
        {
            Ok(()) => ErrorCode::Success,
            Err(e) => tool_code(StageKind::PrepareImage, &e),
        }
    }

    async fn extract_frames(&self, ctx: &mut ProcessingJobContext, cancel: &CancellationToken) -> ErrorCode {
        let Some((resolution, fps, trim)) = Self::working_set(ctx) else {
            return ErrorCode::ConfigurationError;
        };
        let video = match self.target_video(ctx, cancel).await {
            Ok(video) => video,
            Err(e) => return tool_code(StageKind::ExtractFrames, &e),
        };
        let pattern = self.layout.frame_pattern(&ctx.target_path);
        let extracted = self
            .tool(
                cancel,
                self.bridge.extract_frames(
                    &ctx.target_path,
                    &pattern,
                    resolution,
                    fps,
                    trim,
                    video.frame_total,
                ),
            )
            .await;
        if let Err(e) = extracted {
            return tool_code(StageKind::ExtractFrames, &e);
        }
        self.require_frames(ctx).await
    }

    async fn spawn_frames(&self, ctx: &ProcessingJobContext, cancel: &CancellationToken) -> ErrorCode {
        let (Some((resolution, fps, trim)), Some(_)) = (Self::working_set(ctx), ctx.spawn_frame_count)
        else {
            error!(job_id = %ctx.job_id, "Spawning frames needs an audio source");
            return ErrorCode::ConfigurationError;
        };
        let pattern = self.layout.frame_pattern(&ctx.target_path);
        let spawned = self
            .tool(
                cancel,
                self.bridge.spawn_frames(
                    &ctx.target_path,
                    &pattern,
                    resolution,
                    fps,
                    trim.frame_count(),
                ),
            )
            .await;
        if let Err(e) = spawned {
            return tool_code(StageKind::SpawnFrames, &e);
        }
        self.require_frames(ctx).await
    }

    async fn require_frames(&self, ctx: &ProcessingJobContext) -> ErrorCode {
        match self.layout.resolve_frame_paths(&ctx.target_path).await {
            Ok(frames) if !frames.is_empty() => {
                debug!(job_id = %ctx.job_id, frames = frames.len(), "Frames ready");
                ErrorCode::Success
            }
            Ok(_) => {
                error!(job_id = %ctx.job_id, "No frames were written");
                ErrorCode::ToolFailure
            }
            Err(e) => {
                error!(job_id = %ctx.job_id, error = %e, "Failed to list frames");
                ErrorCode::IncompleteIo
            }
        }
    }

    async fn load_sources(&self, ctx: &ProcessingJobContext) -> Result<Vec<Frame>, ProcessorError> {
        let paths: Vec<PathBuf> = ctx.image_sources().into_iter().map(Path::to_path_buf).collect();
        tokio::task::spawn_blocking(move || {
            paths
                .iter()
                .map(|p| load_frame(p).map(|(frame, _)| frame).map_err(ProcessorError::from))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| ProcessorError::failed("sources", e.to_string()))?
    }

    async fn process_image(&self, ctx: &ProcessingJobContext) -> ErrorCode {
        if let Err(e) = self.pipeline.pre_process_all(ProcessMode::Output) {
            return processor_code(&e);
        }
        let sources = match self.load_sources(ctx).await {
            Ok(sources) => sources,
            Err(e) => {
                error!(job_id = %ctx.job_id, error = %e, "Failed to load sources");
                return processor_code(&e);
            }
        };
        let temp = self
            .layout
            .temp_file_path(&ctx.target_path, &ctx.output_extension());
        let pipeline = Arc::clone(&self.pipeline);

        let result = tokio::task::spawn_blocking(move || -> Result<(), ProcessorError> {
            let (target, mask) = load_frame(&temp)?;
            let silence = AudioFrame::empty();
            let bundle = FrameBundle {
                reference: &target,
                sources: &sources,
                source_audio: &silence,
                source_voice: &silence,
                target: &target,
                frame_number: 0,
            };
            let working = pipeline.apply(&bundle, WorkingFrame::with_mask(target.clone(), mask))?;
            save_frame(&temp, &working.frame, working.mask.as_ref())?;
            Ok(())
        })
        .await
        .unwrap_or_else(|e| Err(ProcessorError::failed("process_image", e.to_string())));
        self.pipeline.post_process_all();

        match result {
            Ok(()) => ErrorCode::Success,
            Err(e) => {
                error!(job_id = %ctx.job_id, error = %e, "Processing image failed");
                processor_code(&e)
            }
        }
    }

    async fn source_audio(
        &self,
        ctx: &ProcessingJobContext,
        fps: f64,
        cancel: &CancellationToken,
    ) -> Result<Option<AudioSlicer>, ToolError> {
        let Some(audio) = ctx.audio_source() else {
            return Ok(None);
        };
        let sample_rate = self
            .tool(cancel, self.bridge.detect_audio_sample_rate(audio))
            .await?;
        let channels = self
            .tool(cancel, self.bridge.detect_audio_channel_total(audio))
            .await?;
        let samples = self
            .tool(cancel, self.bridge.extract_audio_pcm(audio, sample_rate, channels))
            .await?;
        Ok(Some(AudioSlicer::new(samples, channels, sample_rate, fps)))
    }

    async fn process_frames(&self, ctx: &ProcessingJobContext, cancel: &CancellationToken) -> ErrorCode {
        let Some((_, fps, trim)) = Self::working_set(ctx) else {
            return ErrorCode::ConfigurationError;
        };
        if let Err(e) = self.pipeline.pre_process_all(ProcessMode::Output) {
            return processor_code(&e);
        }

        let frame_paths: Vec<PathBuf> = match self.layout.resolve_frame_paths(&ctx.target_path).await {
            Ok(frames) if !frames.is_empty() => frames.into_iter().map(|frame| frame.path).collect(),
            Ok(_) => {
                error!(job_id = %ctx.job_id, "No frames to process");
                return ErrorCode::ToolFailure;
            }
            Err(e) => {
                error!(job_id = %ctx.job_id, error = %e, "Failed to list frames");
                return ErrorCode::IncompleteIo;
            }
        };

        let sources = match self.load_sources(ctx).await {
            Ok(sources) => sources,
            Err(e) => {
                error!(job_id = %ctx.job_id, error = %e, "Failed to load sources");
                return processor_code(&e);
            }
        };
        let audio = match self.source_audio(ctx, fps, cancel).await {
            Ok(audio) => audio,
            Err(e) => return tool_code(StageKind::ProcessFrames, &e),
        };

        let reference = if MediaKind::of(&ctx.target_path) == MediaKind::Video {
            let index = self.execution.reference_frame_number.saturating_sub(trim.start) as usize;
            frame_paths
                .get(index)
                .and_then(|p| load_frame(p).ok())
                .map(|(frame, _)| frame)
        } else {
            None
        };

        let inputs = SharedInputs {
            reference,
            sources,
            audio,
            frame_offset: trim.start,
        };

        let (progress_tx, mut progress_rx) = mpsc::channel::<BatchProgress>(64);
        let job_id = ctx.job_id;
        tokio::spawn(async move {
            while let Some(progress) = progress_rx.recv().await {
                debug!(%job_id, processed = progress.processed, total = progress.total, "Frame progress");
            }
        });

        let processor =
            ConcurrentFrameProcessor::new(Arc::clone(&self.pipeline), self.execution.thread_count);
        let report = processor
            .run(FrameJob::new(frame_paths, inputs), cancel.clone(), Some(progress_tx))
            .await
            .and_then(|report| report.check().map(|()| report));

        match report {
            Ok(report) => {
                info!(
                    job_id = %ctx.job_id,
                    frames = report.processed,
                    duration_ms = report.duration_ms,
                    "Frames processed"
                );
                ErrorCode::Success
            }
            Err(e) => {
                let code = ErrorCode::from(&e);
                if code == ErrorCode::UserCancelled {
                    info!(job_id = %ctx.job_id, "Frame processing stopped");
                } else {
                    error!(job_id = %ctx.job_id, error = %e, "Frame processing failed");
                }
                code
            }
        }
    }

    async fn merge_frames(&self, ctx: &ProcessingJobContext, cancel: &CancellationToken) -> ErrorCode {
        let Some((resolution, fps, _)) = Self::working_set(ctx) else {
            return ErrorCode::ConfigurationError;
        };
        let pattern = self.layout.frame_pattern(&ctx.target_path);
        let temp_video = self
            .layout
            .temp_file_path(&ctx.target_path, &ctx.output_extension());
        match self
            .tool(
                cancel,
                self.bridge.merge_video(&pattern, &temp_video, fps, resolution),
            )
            .await
        {
            Ok(()) => ErrorCode::Success,
            Err(e) => tool_code(StageKind::MergeFrames, &e),
        }
    }

    async fn move_temp(&self, ctx: &ProcessingJobContext) -> ErrorCode {
        match self
            .layout
            .move_temp_file(&ctx.target_path, &ctx.output_extension(), &ctx.output_path)
            .await
        {
            Ok(()) => ErrorCode::Success,
            Err(e) => {
                error!(job_id = %ctx.job_id, error = %e, "Failed to move temp file into place");
                ErrorCode::IncompleteIo
            }
        }
    }

    async fn restore_audio(&self, ctx: &ProcessingJobContext, cancel: &CancellationToken) -> ErrorCode {
        if self.output.audio_volume == 0 {
            return self.move_temp(ctx).await;
        }
        let temp_video = self
            .layout
            .temp_file_path(&ctx.target_path, &ctx.output_extension());

        let result = if let Some(audio) = ctx.audio_source() {
            self.tool(
                cancel,
                self.bridge.replace_audio(&temp_video, audio, &ctx.output_path),
            )
            .await
        } else {
            let source = ctx
                .media
                .as_ref()
                .filter(|m| m.audio.is_some())
                .and_then(|m| m.video)
                .zip(ctx.trim);
            let Some((video, trim)) = source else {
                debug!(job_id = %ctx.job_id, "Target has no audio to restore");
                return self.move_temp(ctx).await;
            };
            self.tool(
                cancel,
                self.bridge.restore_audio(
                    &temp_video,
                    &ctx.target_path,
                    trim,
                    video.fps,
                    video.frame_total,
                    &ctx.output_path,
                ),
            )
            .await
        };

        match result {
            Ok(()) => ErrorCode::Success,
            Err(ToolError::Cancelled) => ErrorCode::UserCancelled,
            Err(e) => {
                warn!(job_id = %ctx.job_id, error = %e, "Restoring audio failed, keeping silent video");
                self.move_temp(ctx).await
            }
        }
    }

    async fn finalize_image(&self, ctx: &ProcessingJobContext, cancel: &CancellationToken) -> ErrorCode {
        let Some(resolution) = ctx.resolution else {
            return ErrorCode::ConfigurationError;
        };
        let temp = self
            .layout
            .temp_file_path(&ctx.target_path, &ctx.output_extension());
        match self
            .tool(
                cancel,
                self.bridge.finalize_image(&temp, &ctx.output_path, resolution),
            )
            .await
        {
            Ok(()) => {}
            Err(ToolError::Cancelled) => return ErrorCode::UserCancelled,
            Err(e) => warn!(job_id = %ctx.job_id, error = %e, "Finalizing image failed"),
        }
        if ctx.output_path.is_file() && MediaKind::of(&ctx.output_path) == MediaKind::Image {
            ErrorCode::Success
        } else {
            error!(job_id = %ctx.job_id, output = %ctx.output_path.display(), "No output image written");
            ErrorCode::ToolFailure
        }
    }

    fn finalize_video(&self, ctx: &ProcessingJobContext) -> ErrorCode {
        if ctx.output_path.is_file() && MediaKind::of(&ctx.output_path) == MediaKind::Video {
            ErrorCode::Success
        } else {
            error!(job_id = %ctx.job_id, output = %ctx.output_path.display(), "No output video written");
            ErrorCode::ToolFailure
        }
    }
}

#[async_trait]
impl StageExecutor for MediaStageExecutor {
    async fn execute(
        &self,
        stage: StageKind,
        ctx: &mut ProcessingJobContext,
        cancel: &CancellationToken,
    ) -> ErrorCode {
        debug!(job_id = %ctx.job_id, stage = %stage, "Running stage");
        match stage {
            StageKind::AnalyseImage => self.analyse_image(ctx).await,
            StageKind::AnalyseVideo => self.analyse_video(ctx, cancel).await,
            StageKind::Clear => self.clear(ctx).await,
            StageKind::Setup => self.setup(ctx, cancel).await,
            StageKind::PrepareImage => self.prepare_image(ctx, cancel).await,
            StageKind::ExtractFrames => self.extract_frames(ctx, cancel).await,
            StageKind::SpawnFrames => self.spawn_frames(ctx, cancel).await,
            StageKind::ProcessImage => self.process_image(ctx).await,
            StageKind::ProcessFrames => self.process_frames(ctx, cancel).await,
            StageKind::MergeFrames => self.merge_frames(ctx, cancel).await,
            StageKind::RestoreAudio => self.restore_audio(ctx, cancel).await,
            StageKind::FinalizeImage => self.finalize_image(ctx, cancel).await,
            StageKind::FinalizeVideo => self.finalize_video(ctx),
        }
    }
}
