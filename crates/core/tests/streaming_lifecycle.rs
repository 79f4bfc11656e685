//! Streaming session lifecycle integration tests.
//!
//! These tests run sessions through their transport seams:
//! - Drop-oldest backpressure under a stalled consumer
//! - Egress of frames and side-channel events to a sink
//! - Permanent moderation lock
//! - Adaptive bitrate trace
//! - Remote ingest with seek and teardown

use std::sync::Arc;
use std::time::Duration;

use framefuse_core::{
    config::OutputConfig,
    moderation::{Classifier, NoopClassifier},
    processing::FramePipeline,
    streaming::{
        ChannelSink, ChannelSource, OutputFrame, RemoteStreamOptions, SessionEvent,
        SessionOptions, SessionState, SinkMessage, StreamingSession,
    },
    testing::{fixtures, MockClassifier, MockStreamSpawner},
    tools::FfmpegArgs,
    Frame, Resolution,
};

fn options() -> SessionOptions {
    SessionOptions {
        max_fps: 0.0,
        frame_skip: 1,
        moderation_sample_interval: 1,
        ..SessionOptions::default()
    }
}

fn session(options: SessionOptions, classifier: Arc<dyn Classifier>) -> Arc<StreamingSession> {
    StreamingSession::new(
        options,
        Arc::new(FramePipeline::default()),
        Arc::new(Vec::new()),
        classifier,
    )
}

fn frame(rgb: [u8; 3]) -> Frame {
    fixtures::solid_frame(Resolution::new(8, 8), rgb)
}

async fn drain(session: &StreamingSession) -> Vec<OutputFrame> {
    let mut frames = Vec::new();
    while let Some(frame) = session.pull_frame().await {
        frames.push(frame);
    }
    frames
}

async fn pull(session: &StreamingSession) -> OutputFrame {
    tokio::time::timeout(Duration::from_secs(5), session.pull_frame())
        .await
        .expect("frame within timeout")
        .expect("session still open")
}

#[tokio::test]
async fn test_stalled_consumer_keeps_latest_frames() {
    let session = session(options().with_buffer_size(30), Arc::new(NoopClassifier));
    let (frames_tx, source) = ChannelSource::pair(64);
    session.open(source).unwrap();
    assert_eq!(session.state(), SessionState::Streaming);

    for i in 0..45u8 {
        // The producer never sees backpressure errors.
        frames_tx.send(frame([i, i, i])).await.unwrap();
    }
    drop(frames_tx);

    let frames = drain(&session).await;
    assert_eq!(frames.len(), 30);
    assert_eq!(
        frames.iter().map(|f| f.sequence).collect::<Vec<_>>(),
        (15..45).collect::<Vec<u64>>()
    );
    assert_eq!(frames[0].frame.first_pixel(), Some([15, 15, 15]));
    session.close();
}

#[tokio::test]
async fn test_sink_receives_frames_and_events() {
    // Capacity 2: the first enqueued frame already fills half the buffer.
    let session = session(options().with_buffer_size(2), Arc::new(NoopClassifier));
    let (frames_tx, source) = ChannelSource::pair(8);
    let (sink, mut output) = ChannelSink::pair(8);
    session.open(source).unwrap();
    session.attach_sink(sink).unwrap();
    assert!(session.has_sink());

    let (second, _unused) = ChannelSink::pair(8);
    assert!(matches!(
        session.attach_sink(second),
        Err(framefuse_core::StreamError::SinkAttached)
    ));

    let mut sequences = Vec::new();
    let mut events = Vec::new();
    let mut record = |message: SinkMessage| match message {
        SinkMessage::Frame(frame) => {
            sequences.push(frame.sequence);
            true
        }
        SinkMessage::Event(event) => {
            events.push(event);
            false
        }
    };

    // One frame at a time so nothing is evicted.
    for _ in 0..3 {
        frames_tx.send(frame([1, 2, 3])).await.unwrap();
        loop {
            let message = tokio::time::timeout(Duration::from_secs(5), output.recv())
                .await
                .unwrap()
                .unwrap();
            if record(message) {
                break;
            }
        }
    }
    drop(frames_tx);
    while let Ok(Some(message)) = tokio::time::timeout(Duration::from_secs(5), output.recv()).await
    {
        record(message);
    }
    drop(record);

    assert_eq!(sequences, vec![0, 1, 2]);
    assert_eq!(
        events.iter().filter(|e| **e == SessionEvent::Ready).count(),
        1
    );
    // The sink goes away once egress ends, which closes the session.
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_moderation_lock_is_permanent() {
    let classifier = Arc::new(MockClassifier::flag_at(1));
    let session = session(options(), classifier.clone());
    let (frames_tx, source) = ChannelSource::pair(16);
    session.open(source).unwrap();

    for _ in 0..8 {
        frames_tx.send(frame([200, 10, 10])).await.unwrap();
    }
    drop(frames_tx);

    let frames = drain(&session).await;
    assert_eq!(frames.len(), 8);
    assert!(!frames[0].redacted);
    assert!(frames[1..].iter().all(|f| f.redacted));
    assert!(session.is_locked());
    assert_eq!(classifier.calls(), 2);
}

#[tokio::test]
async fn test_bitrate_trace() {
    let session = session(options().with_buffer_size(10), Arc::new(NoopClassifier));
    let mut events = session.take_events().unwrap();

    // Empty queue: increases after every fourth stable poll.
    let trace: Vec<_> = (0..8).map(|_| session.poll_bitrate()).collect();
    assert_eq!(
        trace,
        vec![None, None, None, Some(150_000), None, None, None, Some(200_000)]
    );

    // Full queue: multiplicative decrease.
    for _ in 0..10 {
        session.push_frame(frame([0, 0, 0]));
    }
    assert_eq!(session.poll_bitrate(), Some(180_000));
    assert_eq!(session.poll_bitrate(), Some(162_000));

    // Half full: no change, stability window reset.
    for _ in 0..5 {
        session.try_pull_frame();
    }
    assert_eq!(session.poll_bitrate(), None);
    assert_eq!(session.bitrate(), 162_000);

    let mut bitrates = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Bitrate(bps) = event {
            bitrates.push(bps);
        }
    }
    assert_eq!(bitrates, vec![150_000, 200_000, 180_000, 162_000]);
}

#[tokio::test]
async fn test_manual_bitrate_is_fixed() {
    let session = session(options().with_bitrate(800), Arc::new(NoopClassifier));
    for _ in 0..8 {
        assert_eq!(session.poll_bitrate(), None);
    }
    assert_eq!(session.bitrate(), 800_000);
}

#[tokio::test]
async fn test_controller_task_polls_periodically() {
    let session = session(
        SessionOptions {
            bitrate_poll_interval: Duration::from_millis(10),
            ..options()
        },
        Arc::new(NoopClassifier),
    );
    let (_frames_tx, source) = ChannelSource::pair(1);
    session.open(source).unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(session.bitrate() > 100_000);

    session.close();
    let settled = session.bitrate();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.bitrate(), settled);
}

fn remote_options() -> RemoteStreamOptions {
    RemoteStreamOptions {
        url: "https://cdn.example.com/live.m3u8".to_string(),
        resolution: Resolution::new(8, 8),
        fps: 25.0,
        start_secs: 0.0,
        user_agent: Some("framefuse-test".to_string()),
    }
}

#[tokio::test]
async fn test_remote_seek_drops_old_stream() {
    let spawner = Arc::new(MockStreamSpawner::new());
    spawner.push_open_stream(Resolution::new(8, 8), [10, 10, 10], 3);
    spawner.push_open_stream(Resolution::new(8, 8), [20, 20, 20], 3);

    let session = session(options(), Arc::new(NoopClassifier));
    session
        .open_remote(
            remote_options(),
            FfmpegArgs::new("error", OutputConfig::default()),
            spawner.clone(),
        )
        .unwrap();
    assert!(session.info().remote);

    let first = pull(&session).await;
    assert_eq!(first.frame.first_pixel(), Some([10, 10, 10]));

    let start = session.seek(2.0).unwrap();
    assert_eq!(start, 50);
    assert_eq!(spawner.terminated(), 1);

    let spawned = spawner.spawned();
    assert_eq!(spawned.len(), 2);
    assert!(spawned[1].windows(2).any(|w| w[0] == "-ss" && w[1] == "2.000"));
    assert!(spawned[1].iter().any(|a| a == "-reconnect"));

    for _ in 0..3 {
        let next = pull(&session).await;
        assert_eq!(next.frame.first_pixel(), Some([20, 20, 20]));
    }

    session.close();
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(spawner.terminated(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn test_seek_async_restarts_off_the_runtime() {
    let spawner = Arc::new(MockStreamSpawner::new());
    spawner.push_open_stream(Resolution::new(8, 8), [10, 10, 10], 2);
    spawner.push_open_stream(Resolution::new(8, 8), [40, 40, 40], 2);

    let session = session(options(), Arc::new(NoopClassifier));
    session
        .open_remote(
            remote_options(),
            FfmpegArgs::new("error", OutputConfig::default()),
            spawner.clone(),
        )
        .unwrap();
    pull(&session).await;

    let start = session.seek_async(1.5).await.unwrap();
    assert_eq!(start, 37);
    assert_eq!(spawner.terminated(), 1);
    assert_eq!(pull(&session).await.frame.first_pixel(), Some([40, 40, 40]));

    session.close();
    assert!(matches!(
        session.seek_async(1.0).await,
        Err(framefuse_core::StreamError::Closed)
    ));
}

#[tokio::test]
async fn test_remote_end_of_stream_drains_then_ends() {
    let spawner = Arc::new(MockStreamSpawner::new());
    spawner.push_finite_stream(Resolution::new(8, 8), [5, 5, 5], 4);

    let session = session(options(), Arc::new(NoopClassifier));
    session
        .open_remote(
            remote_options(),
            FfmpegArgs::new("error", OutputConfig::default()),
            spawner,
        )
        .unwrap();

    let frames = tokio::time::timeout(Duration::from_secs(5), drain(&session))
        .await
        .unwrap();
    assert_eq!(frames.len(), 4);
    session.close();
    assert!(matches!(
        session.seek(1.0),
        Err(framefuse_core::StreamError::Closed)
    ));
}
