//! Workflow lifecycle integration tests.
//!
//! These tests drive whole workflows through the engine with a mock tool
//! runner and mock capabilities:
//! - Stage order and outcome codes per variant
//! - Concurrent frame processing (every frame exactly once)
//! - Cleanup after failures, moderation rejects and stop requests
//! - Single-run enforcement

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use framefuse_core::{
    moderation::Classifier,
    processing::{FrameProcessor, FramePipeline},
    testing::{fixtures, MockClassifier, MockProcessor, MockToolRunner},
    tools::{ToolBridge, ToolOperation},
    workflow::{MediaStageExecutor, WorkflowError},
    Config, ErrorCode, ProcessingJobContext, Resolution, WorkflowEngine, WorkflowVariant,
};

/// Test helper wiring an engine to mocks inside a temp directory.
struct TestHarness {
    engine: Arc<WorkflowEngine>,
    runner: Arc<MockToolRunner>,
    processor: Arc<MockProcessor>,
    dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with(
            MockToolRunner::new(),
            MockProcessor::new("swap"),
            MockClassifier::never(),
            4,
        )
    }

    fn with(
        runner: MockToolRunner,
        processor: MockProcessor,
        classifier: MockClassifier,
        thread_count: usize,
    ) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = Config::default();
        config.temp.root = dir.path().join("tmp");
        config.execution.thread_count = thread_count;

        let runner = Arc::new(runner);
        let processor = Arc::new(processor);
        let bridge = ToolBridge::new(runner.clone(), config.tools.clone(), config.output.clone());
        let pipeline = Arc::new(FramePipeline::new(vec![
            processor.clone() as Arc<dyn FrameProcessor>
        ]));
        let classifier: Arc<dyn Classifier> = Arc::new(classifier);
        let executor = MediaStageExecutor::new(&config, bridge, pipeline, classifier);

        Self {
            engine: Arc::new(WorkflowEngine::new(Arc::new(executor))),
            runner,
            processor,
            dir,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Placeholder video target; the mock runner answers probes for it.
    fn video_target(&self) -> PathBuf {
        let target = self.path("media/clip.mp4");
        fixtures::write_file(&target, b"not really a video");
        target
    }

    fn image(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        fixtures::write_image(&path, Resolution::new(8, 8), [40, 40, 40]);
        path
    }

    fn temp_dir_for(&self, target: &Path) -> PathBuf {
        let stem = target.file_stem().unwrap();
        self.path("tmp").join("facefusion").join(stem)
    }

    async fn run(&self, variant: WorkflowVariant, ctx: &mut ProcessingJobContext) -> ErrorCode {
        self.engine
            .run_workflow(variant, ctx)
            .await
            .expect("workflow should start")
    }
}

#[tokio::test]
async fn test_image_to_video_processes_every_frame_once() {
    let harness = TestHarness::new();
    let target = harness.video_target();
    let source = harness.image("sources/face.png");
    let output = harness.path("out/result.mp4");

    let mut ctx = ProcessingJobContext::new(&target, &output).with_sources(vec![source]);
    let outcome = harness.run(WorkflowVariant::ImageToVideo, &mut ctx).await;

    assert_eq!(outcome, ErrorCode::Success);
    assert_eq!(outcome.code(), 0);
    assert_eq!(harness.processor.frames_seen(), (0..10).collect::<Vec<u64>>());
    assert_eq!(harness.processor.post_process_calls(), 1);
    assert_eq!(harness.runner.invocations_for(ToolOperation::MergeVideo).len(), 1);
    assert_eq!(harness.runner.invocations_for(ToolOperation::RestoreAudio).len(), 1);
    assert!(output.is_file());
    assert!(!harness.temp_dir_for(&target).exists());
}

#[tokio::test]
async fn test_trim_range_limits_processed_frames() {
    let harness = TestHarness::new();
    let target = harness.video_target();
    let output = harness.path("out/trimmed.mp4");

    let mut ctx = ProcessingJobContext::new(&target, &output).with_trim(Some(2), Some(6));
    let outcome = harness.run(WorkflowVariant::ImageToVideo, &mut ctx).await;

    assert_eq!(outcome, ErrorCode::Success);
    assert_eq!(harness.processor.frames_seen(), vec![2, 3, 4, 5]);
    let extract = &harness.runner.invocations_for(ToolOperation::ExtractFrames)[0];
    assert!(extract
        .arg_after("-vf")
        .unwrap()
        .starts_with("trim=start_frame=2:end_frame=6"));
}

#[tokio::test]
async fn test_failed_merge_still_cleans_up() {
    let runner = MockToolRunner::new();
    runner.fail_operation(ToolOperation::MergeVideo);
    let harness = TestHarness::with(
        runner,
        MockProcessor::new("swap"),
        MockClassifier::never(),
        4,
    );
    let target = harness.video_target();
    let output = harness.path("out/result.mp4");

    let mut ctx = ProcessingJobContext::new(&target, &output);
    let outcome = harness.run(WorkflowVariant::ImageToVideo, &mut ctx).await;

    assert_eq!(outcome, ErrorCode::ToolFailure);
    // Stages after the failure are skipped, the final cleanup is not.
    assert!(harness.runner.invocations_for(ToolOperation::RestoreAudio).is_empty());
    assert!(!harness.temp_dir_for(&target).exists());
    assert!(!output.exists());
}

#[tokio::test]
async fn test_frame_failure_stops_batch() {
    let harness = TestHarness::with(
        MockToolRunner::new(),
        MockProcessor::new("swap").failing_on_frame(3),
        MockClassifier::never(),
        1,
    );
    let target = harness.video_target();
    let output = harness.path("out/result.mp4");

    let mut ctx = ProcessingJobContext::new(&target, &output);
    let outcome = harness.run(WorkflowVariant::ImageToVideo, &mut ctx).await;

    assert_eq!(outcome, ErrorCode::ToolFailure);
    assert!(harness.processor.calls() < 10);
    assert!(harness.runner.invocations_for(ToolOperation::MergeVideo).is_empty());
    assert!(!harness.temp_dir_for(&target).exists());
}

#[tokio::test]
async fn test_moderation_reject_skips_extraction() {
    let harness = TestHarness::with(
        MockToolRunner::new(),
        MockProcessor::new("swap"),
        MockClassifier::always(),
        4,
    );
    let target = harness.video_target();
    let output = harness.path("out/result.mp4");

    let mut ctx = ProcessingJobContext::new(&target, &output);
    let outcome = harness.run(WorkflowVariant::ImageToVideo, &mut ctx).await;

    assert_eq!(outcome, ErrorCode::ModerationReject);
    assert!(harness.runner.invocations_for(ToolOperation::ExtractFrames).is_empty());
    assert_eq!(harness.processor.calls(), 0);
}

#[tokio::test]
async fn test_stop_request_cancels_remaining_frames() {
    let harness = TestHarness::with(
        MockToolRunner::new(),
        MockProcessor::new("swap").with_delay(Duration::from_millis(100)),
        MockClassifier::never(),
        1,
    );
    let target = harness.video_target();
    let output = harness.path("out/result.mp4");

    let running = {
        let engine = harness.engine.clone();
        tokio::spawn(async move {
            let mut ctx = ProcessingJobContext::new(&target, &output);
            engine.run_workflow(WorkflowVariant::ImageToVideo, &mut ctx).await
        })
    };

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(harness.engine.stop());

    let outcome = running.await.unwrap().unwrap();
    assert_eq!(outcome, ErrorCode::UserCancelled);
    assert!(harness.processor.calls() < 10);
    assert!(harness.runner.invocations_for(ToolOperation::MergeVideo).is_empty());
    assert!(!harness.engine.is_running());
}

#[tokio::test]
async fn test_second_run_is_refused() {
    let harness = TestHarness::with(
        MockToolRunner::new(),
        MockProcessor::new("swap").with_delay(Duration::from_millis(50)),
        MockClassifier::never(),
        1,
    );
    let target = harness.video_target();
    let output = harness.path("out/result.mp4");

    let running = {
        let engine = harness.engine.clone();
        let (target, output) = (target.clone(), output.clone());
        tokio::spawn(async move {
            let mut ctx = ProcessingJobContext::new(&target, &output);
            engine.run_workflow(WorkflowVariant::ImageToVideo, &mut ctx).await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut ctx = ProcessingJobContext::new(&target, &output);
    let second = harness
        .engine
        .run_workflow(WorkflowVariant::ImageToVideo, &mut ctx)
        .await;
    assert!(matches!(second, Err(WorkflowError::AlreadyRunning)));

    assert_eq!(running.await.unwrap().unwrap(), ErrorCode::Success);
}

#[tokio::test]
async fn test_image_to_image() {
    let harness = TestHarness::new();
    let target = harness.image("media/portrait.png");
    let source = harness.image("sources/face.png");
    let output = harness.path("out/portrait.png");

    let mut ctx = ProcessingJobContext::new(&target, &output).with_sources(vec![source]);
    let outcome = harness.run(WorkflowVariant::ImageToImage, &mut ctx).await;

    assert_eq!(outcome, ErrorCode::Success);
    assert_eq!(harness.processor.calls(), 1);
    assert_eq!(
        harness.runner.operations(),
        vec![ToolOperation::CopyImage, ToolOperation::FinalizeImage]
    );
    assert!(output.is_file());
    assert!(!harness.temp_dir_for(&target).exists());
}

#[tokio::test]
async fn test_audio_to_image_spawns_frames_for_audio_duration() {
    let harness = TestHarness::new();
    let target = harness.image("media/speaker.png");
    let voice = harness.path("sources/voice.wav");
    fixtures::write_file(&voice, b"RIFF");
    let output = harness.path("out/speaker.mp4");

    let mut ctx = ProcessingJobContext::new(&target, &output).with_sources(vec![voice]);
    let outcome = harness.run(WorkflowVariant::AudioToImage, &mut ctx).await;

    assert_eq!(outcome, ErrorCode::Success);
    // 2 s of audio at 25 fps.
    assert_eq!(ctx.spawn_frame_count, Some(50));
    assert_eq!(harness.processor.calls(), 50);
    assert_eq!(harness.runner.invocations_for(ToolOperation::ReplaceAudio).len(), 1);
    assert!(harness.runner.invocations_for(ToolOperation::RestoreAudio).is_empty());
    assert!(output.is_file());
}
