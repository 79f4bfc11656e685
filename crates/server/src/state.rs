use std::path::PathBuf;
use std::sync::Arc;

use framefuse_core::{
    frame::{load_frame, Frame, FrameError},
    moderation::Classifier,
    processing::FramePipeline,
    streaming::{RawStreamSpawner, SessionOptions},
    tools::FfmpegArgs,
    Config, SanitizedConfig, SessionRegistry, WorkflowEngine,
};

/// Shared application state
pub struct AppState {
    config: Config,
    engine: Arc<WorkflowEngine>,
    sessions: SessionRegistry,
    pipeline: Arc<FramePipeline>,
    classifier: Arc<dyn Classifier>,
    spawner: Arc<dyn RawStreamSpawner>,
}

impl AppState {
    pub fn new(
        config: Config,
        engine: Arc<WorkflowEngine>,
        pipeline: Arc<FramePipeline>,
        classifier: Arc<dyn Classifier>,
        spawner: Arc<dyn RawStreamSpawner>,
    ) -> Self {
        Self {
            config,
            engine,
            sessions: SessionRegistry::new(),
            pipeline,
            classifier,
            spawner,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn engine(&self) -> &Arc<WorkflowEngine> {
        &self.engine
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn pipeline(&self) -> Arc<FramePipeline> {
        Arc::clone(&self.pipeline)
    }

    pub fn classifier(&self) -> Arc<dyn Classifier> {
        Arc::clone(&self.classifier)
    }

    pub fn spawner(&self) -> Arc<dyn RawStreamSpawner> {
        Arc::clone(&self.spawner)
    }

    /// Session settings from the `[streaming]` section.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::from_config(&self.config.streaming)
    }

    /// Argument builder for remote ingest processes.
    pub fn ffmpeg_args(&self) -> FfmpegArgs {
        FfmpegArgs::new(
            self.config.tools.log_level.clone(),
            self.config.output.clone(),
        )
    }

    /// Decodes the source images a live session processes against.
    pub fn load_sources(&self, paths: &[PathBuf]) -> Result<Arc<Vec<Frame>>, FrameError> {
        paths
            .iter()
            .map(|path| load_frame(path).map(|(frame, _)| frame))
            .collect::<Result<Vec<_>, _>>()
            .map(Arc::new)
    }
}
