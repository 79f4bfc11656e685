//! A single live session.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::bitrate::{BitrateController, BitrateState};
use super::config::ModerationPrecedence;
use super::queue::FrameQueue;
use super::rate::{FrameSkipPolicy, RateLimiter};
use super::remote::{RawStreamSpawner, RemoteControl, RemoteSource, RemoteStreamOptions};
use super::transport::{FrameSink, FrameSource};
use super::types::{
    OutputFrame, PushOutcome, SessionEvent, SessionInfo, SessionOptions, SessionState, StreamError,
};
use crate::frame::{downscale, redact, AudioFrame, Frame};
use crate::metrics::{BITRATE_ADJUSTMENTS, FRAMES_DROPPED, FRAMES_PROCESSED, SESSION_BITRATE};
use crate::moderation::{Classifier, ModerationGate};
use crate::processing::{FrameBundle, FramePipeline, ProcessorError, WorkingFrame};
use crate::tools::FfmpegArgs;

const EVENT_BUFFER: usize = 1024;

struct Ingest {
    limiter: RateLimiter,
    skip: FrameSkipPolicy,
    /// Last fully processed output and whether it was redacted.
    last_output: Option<(Frame, bool)>,
    received: u64,
    sequence: u64,
}

/// Per-connection live pipeline.
///
/// Ingest, bitrate control and egress run as separate tasks owned by the
/// session; [`close`](Self::close) cancels all of them. Frames can also be
/// pushed and pulled directly, which is what the ingest and egress tasks do.
pub struct StreamingSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    started: Instant,
    options: SessionOptions,
    pipeline: Arc<FramePipeline>,
    sources: Arc<Vec<Frame>>,
    state: Mutex<SessionState>,
    ingest: Mutex<Ingest>,
    gate: ModerationGate,
    queue: FrameQueue<OutputFrame>,
    bitrate: Mutex<BitrateController>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
    ready_sent: AtomicBool,
    sink_attached: AtomicBool,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    remote: Mutex<Option<Arc<RemoteControl>>>,
}

impl StreamingSession {
    pub fn new(
        options: SessionOptions,
        pipeline: Arc<FramePipeline>,
        sources: Arc<Vec<Frame>>,
        classifier: Arc<dyn Classifier>,
    ) -> Arc<Self> {
        let id = Uuid::new_v4();
        let gate = ModerationGate::new(
            classifier,
            options.moderation_sample_interval,
            options.max_fps,
        )
        .with_label(id.to_string());
        let bitrate = BitrateController::new(BitrateState::from_requested(options.bitrate_kbps));
        SESSION_BITRATE
            .with_label_values(&[&id.to_string()])
            .set(bitrate.current() as i64);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

        info!(
            session = %id,
            buffer_size = options.buffer_size,
            max_fps = options.max_fps,
            frame_skip = options.frame_skip,
            bitrate_bps = bitrate.current(),
            adaptive = bitrate.state().adaptive,
            state = %SessionState::Init,
            "Session created"
        );

        Arc::new(Self {
            id,
            created_at: Utc::now(),
            started: Instant::now(),
            ingest: Mutex::new(Ingest {
                limiter: RateLimiter::new(options.max_fps),
                skip: FrameSkipPolicy::new(options.frame_skip),
                last_output: None,
                received: 0,
                sequence: 0,
            }),
            queue: FrameQueue::new(options.buffer_size),
            options,
            pipeline,
            sources,
            state: Mutex::new(SessionState::Init),
            gate,
            bitrate: Mutex::new(bitrate),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            ready_sent: AtomicBool::new(false),
            sink_attached: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            remote: Mutex::new(None),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn is_locked(&self) -> bool {
        self.gate.is_locked()
    }

    pub fn bitrate(&self) -> u64 {
        self.bitrate.lock().current()
    }

    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            state: self.state(),
            created_at: self.created_at,
            remote: self.remote.lock().is_some(),
            queued_frames: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            bitrate_bps: self.bitrate(),
            moderation_locked: self.is_locked(),
        }
    }

    fn transition(&self, allowed: &[SessionState], to: SessionState) -> bool {
        let mut state = self.state.lock();
        if !allowed.contains(&*state) {
            return false;
        }
        let from = *state;
        *state = to;
        info!(session = %self.id, from = %from, to = %to, "Session state changed");
        true
    }

    /// Marks the transport handshake as started.
    pub fn begin_negotiation(&self) -> bool {
        self.transition(&[SessionState::Init], SessionState::Negotiating)
    }

    fn begin_streaming(&self) -> Result<(), StreamError> {
        self.begin_negotiation();
        if self.transition(&[SessionState::Negotiating], SessionState::Streaming) {
            Ok(())
        } else {
            Err(StreamError::Closed)
        }
    }

    fn is_closing(&self) -> bool {
        matches!(self.state(), SessionState::Closing | SessionState::Closed)
    }

    fn emit(&self, event: SessionEvent) {
        if self.events_tx.try_send(event).is_err() {
            debug!(session = %self.id, event = %event, "Side channel full, event dropped");
        }
    }

    /// Takes the side-channel receiver. Only the first caller gets it.
    pub fn take_events(&self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.events_rx.lock().take()
    }

    /// Runs one incoming frame through rate limiting, skip, moderation and
    /// the pipeline, then enqueues the result. Never waits on the consumer.
    pub fn push_frame(&self, frame: Frame) -> PushOutcome {
        self.push_inner(frame, None)
    }

    fn push_inner(&self, frame: Frame, generation: Option<u64>) -> PushOutcome {
        if self.is_closing() {
            return PushOutcome::Closed;
        }
        let mut ingest = self.ingest.lock();

        if let Some(generation) = generation {
            let current = self.remote.lock().as_ref().map(|remote| remote.generation());
            if current != Some(generation) {
                debug!(session = %self.id, generation, "Dropping frame from replaced stream");
                return PushOutcome::Stale;
            }
        }

        if !ingest.limiter.admit(Instant::now()) {
            FRAMES_DROPPED.with_label_values(&["rate_limit"]).inc();
            debug!(session = %self.id, "Frame dropped by rate limiter");
            return PushOutcome::RateLimited;
        }

        let frame = match self.options.output_resolution.resolution() {
            Some(bound) => downscale(frame, bound),
            None => frame,
        };
        let frame_number = ingest.received;
        ingest.received += 1;

        let reuse = if ingest.skip.should_process() {
            None
        } else {
            ingest.last_output.clone()
        };
        let (output, reused, redacted) = match reuse {
            Some((cached, cached_redacted)) => {
                match (self.options.moderation_precedence, self.gate.is_locked()) {
                    (ModerationPrecedence::LockFirst, true) => (redact(&frame), false, true),
                    _ => (cached, true, cached_redacted),
                }
            }
            None => match self.render(frame, frame_number) {
                Ok((output, redacted)) => {
                    FRAMES_PROCESSED.with_label_values(&["stream"]).inc();
                    ingest.last_output = Some((output.clone(), redacted));
                    (output, false, redacted)
                }
                Err(e) => {
                    FRAMES_DROPPED.with_label_values(&["processing_error"]).inc();
                    warn!(session = %self.id, frame = frame_number, error = %e, "Frame processing failed, dropping frame");
                    return PushOutcome::ProcessingFailed;
                }
            },
        };

        let sequence = ingest.sequence;
        let item = OutputFrame {
            frame: output,
            sequence,
            pts: self.started.elapsed(),
            reused,
            redacted,
        };

        let evicted = match self.queue.push(item) {
            Some(returned) if returned.sequence == sequence => return PushOutcome::Closed,
            Some(dropped) => {
                FRAMES_DROPPED.with_label_values(&["queue_overflow"]).inc();
                debug!(session = %self.id, sequence = dropped.sequence, "Output queue full, oldest frame evicted");
                true
            }
            None => false,
        };
        ingest.sequence += 1;
        drop(ingest);

        self.emit(SessionEvent::Frame(sequence));
        if self.queue.len() * 2 >= self.queue.capacity()
            && self
                .ready_sent
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            info!(session = %self.id, queued = self.queue.len(), "Output buffer ready");
            self.emit(SessionEvent::Ready);
        }

        PushOutcome::Enqueued { sequence, evicted }
    }

    fn render(&self, frame: Frame, frame_number: u64) -> Result<(Frame, bool), ProcessorError> {
        if self.gate.check(&frame) {
            return Ok((redact(&frame), true));
        }
        let silence = AudioFrame::empty();
        let bundle = FrameBundle {
            reference: &frame,
            sources: &self.sources,
            source_audio: &silence,
            source_voice: &silence,
            target: &frame,
            frame_number,
        };
        let working = self.pipeline.apply(&bundle, WorkingFrame::new(frame.clone()))?;
        Ok((working.frame, false))
    }

    /// Waits for the next output frame; `None` once the session is closed and drained.
    pub async fn pull_frame(&self) -> Option<OutputFrame> {
        self.queue.pop().await
    }

    pub fn try_pull_frame(&self) -> Option<OutputFrame> {
        self.queue.try_pop()
    }

    /// Feeds the controller one occupancy sample. Returns the new bitrate when it changed.
    pub fn poll_bitrate(&self) -> Option<u64> {
        let ratio = self.queue.ratio();
        let (bps, direction) = self.bitrate.lock().observe(ratio)?;
        SESSION_BITRATE
            .with_label_values(&[&self.id.to_string()])
            .set(bps as i64);
        BITRATE_ADJUSTMENTS
            .with_label_values(&[direction.as_str()])
            .inc();
        info!(
            session = %self.id,
            bitrate_bps = bps,
            direction = direction.as_str(),
            queue_ratio = ratio,
            "Bitrate changed"
        );
        self.emit(SessionEvent::Bitrate(bps));
        Some(bps)
    }

    fn track(&self, handle: JoinHandle<()>) {
        self.tasks.lock().push(handle);
    }

    /// Starts ingest from `source` and, in adaptive mode, the bitrate controller.
    pub fn open(self: &Arc<Self>, source: impl FrameSource + 'static) -> Result<(), StreamError> {
        self.begin_streaming()?;
        let mut source = source;
        let session = Arc::clone(self);
        self.track(tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = session.cancel.cancelled() => return,
                    next = source.next_frame() => next,
                };
                match next {
                    Ok(Some(frame)) => {
                        if !session.ingest_frame(frame, None).await {
                            return;
                        }
                    }
                    Ok(None) => {
                        session.end_ingest();
                        return;
                    }
                    Err(e) => {
                        warn!(session = %session.id, error = %e, "Ingest failed");
                        session.close();
                        return;
                    }
                }
            }
        }));
        self.spawn_bitrate_task();
        Ok(())
    }

    /// Starts a session fed by a raw ffmpeg stream of `options.url`.
    pub fn open_remote(
        self: &Arc<Self>,
        options: RemoteStreamOptions,
        args: FfmpegArgs,
        spawner: Arc<dyn RawStreamSpawner>,
    ) -> Result<(), StreamError> {
        let (mut source, control) = RemoteSource::start(options, args, spawner)?;
        *self.remote.lock() = Some(control);
        self.begin_streaming()?;

        let session = Arc::clone(self);
        self.track(tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = session.cancel.cancelled() => return,
                    next = source.next_remote_frame() => next,
                };
                match next {
                    Some(item) => {
                        if !session.ingest_frame(item.frame, Some(item.generation)).await {
                            return;
                        }
                    }
                    None => {
                        session.end_ingest();
                        return;
                    }
                }
            }
        }));
        self.spawn_bitrate_task();
        Ok(())
    }

    async fn ingest_frame(self: &Arc<Self>, frame: Frame, generation: Option<u64>) -> bool {
        let session = Arc::clone(self);
        match tokio::task::spawn_blocking(move || session.push_inner(frame, generation)).await {
            Ok(PushOutcome::Closed) => false,
            Ok(_) => true,
            Err(e) => {
                error!(session = %self.id, error = %e, "Ingest worker panicked");
                self.close();
                false
            }
        }
    }

    fn end_ingest(&self) {
        info!(session = %self.id, "Ingest reached end of stream");
        self.queue.close();
    }

    fn spawn_bitrate_task(self: &Arc<Self>) {
        if !self.bitrate.lock().state().adaptive {
            return;
        }
        let session = Arc::clone(self);
        let period = self.options.bitrate_poll_interval;
        self.track(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = session.cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        session.poll_bitrate();
                    }
                }
            }
        }));
    }

    pub fn has_sink(&self) -> bool {
        self.sink_attached.load(Ordering::Acquire)
    }

    /// Forwards output frames and side-channel events to `sink` until the
    /// session closes or the sink goes away. A session has at most one sink.
    pub fn attach_sink(self: &Arc<Self>, sink: impl FrameSink + 'static) -> Result<(), StreamError> {
        if self
            .sink_attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StreamError::SinkAttached);
        }
        let mut sink = sink;
        let mut events = self.take_events();
        let session = Arc::clone(self);
        self.track(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = session.cancel.cancelled() => return,
                    Some(event) = next_event(&mut events) => {
                        if let Err(e) = sink.send_event(&event).await {
                            if session.sink_failed(e) {
                                return;
                            }
                        }
                    }
                    item = session.queue.pop() => {
                        let Some(item) = item else {
                            session.close();
                            return;
                        };
                        if let Err(e) = sink.send_frame(&item).await {
                            if session.sink_failed(e) {
                                return;
                            }
                        }
                    }
                }
            }
        }));
        Ok(())
    }

    /// Returns whether egress has to stop.
    fn sink_failed(&self, e: StreamError) -> bool {
        if matches!(e, StreamError::Closed) {
            info!(session = %self.id, "Consumer disconnected");
            self.close();
            return true;
        }
        warn!(session = %self.id, error = %e, "Egress write failed, frame dropped");
        false
    }

    /// Restarts a remote session at `position_secs`. Returns the first frame index of the new stream.
    pub fn seek(&self, position_secs: f64) -> Result<u64, StreamError> {
        if self.is_closing() {
            return Err(StreamError::Closed);
        }
        let remote = self.remote.lock().clone().ok_or(StreamError::NotRemote)?;
        let mut ingest = self.ingest.lock();
        let start = remote.seek(position_secs)?;
        let dropped = self.queue.clear();
        ingest.last_output = None;
        drop(ingest);
        info!(session = %self.id, position_secs, start_index = start, dropped, "Seek applied");
        Ok(start)
    }

    /// [`seek`](Self::seek) on the blocking pool. Restarting the remote
    /// process waits on the old one, which must not stall the runtime.
    pub async fn seek_async(self: &Arc<Self>, position_secs: f64) -> Result<u64, StreamError> {
        let session = Arc::clone(self);
        tokio::task::spawn_blocking(move || session.seek(position_secs))
            .await
            .map_err(|e| StreamError::Transport(format!("Seek task failed: {}", e)))?
    }

    /// Tears the session down. Safe to call more than once.
    pub fn close(&self) {
        if !self.transition(
            &[
                SessionState::Init,
                SessionState::Negotiating,
                SessionState::Streaming,
            ],
            SessionState::Closing,
        ) {
            return;
        }
        self.cancel.cancel();
        self.queue.close();
        if let Some(remote) = self.remote.lock().as_ref() {
            remote.stop();
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        let _ = SESSION_BITRATE.remove_label_values(&[&self.id.to_string()]);
        self.transition(&[SessionState::Closing], SessionState::Closed);
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<SessionEvent>>) -> Option<SessionEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Resolution;
    use crate::moderation::NoopClassifier;
    use crate::streaming::OutputResolution;
    use crate::testing::{fixtures, MockClassifier, MockProcessor};

    fn unlimited() -> SessionOptions {
        SessionOptions {
            max_fps: 0.0,
            frame_skip: 1,
            moderation_sample_interval: 1,
            ..SessionOptions::default()
        }
    }

    fn session_with(
        options: SessionOptions,
        processor: Arc<MockProcessor>,
        classifier: Arc<dyn Classifier>,
    ) -> Arc<StreamingSession> {
        let pipeline = Arc::new(FramePipeline::new(vec![processor]));
        StreamingSession::new(options, pipeline, Arc::new(Vec::new()), classifier)
    }

    fn frame(rgb: [u8; 3]) -> Frame {
        fixtures::solid_frame(Resolution::new(8, 8), rgb)
    }

    #[test]
    fn test_overflow_keeps_latest_frames() {
        let session = session_with(
            unlimited().with_buffer_size(30),
            Arc::new(MockProcessor::new("swap")),
            Arc::new(NoopClassifier),
        );
        for _ in 0..45 {
            assert!(matches!(
                session.push_frame(frame([1, 1, 1])),
                PushOutcome::Enqueued { .. }
            ));
        }
        assert_eq!(session.queued_frames(), 30);
        assert_eq!(session.try_pull_frame().unwrap().sequence, 15);
    }

    #[test]
    fn test_skip_reuses_last_output() {
        let processor = Arc::new(MockProcessor::tinting("swap", [0, 50, 0]));
        let session = session_with(
            SessionOptions {
                frame_skip: 2,
                ..unlimited()
            },
            processor.clone(),
            Arc::new(NoopClassifier),
        );

        session.push_frame(frame([10, 10, 10]));
        session.push_frame(frame([90, 90, 90]));
        session.push_frame(frame([20, 20, 20]));

        assert_eq!(processor.calls(), 2);
        let outputs: Vec<_> = std::iter::from_fn(|| session.try_pull_frame()).collect();
        assert_eq!(
            outputs.iter().map(|o| o.reused).collect::<Vec<_>>(),
            vec![false, true, false]
        );
        assert_eq!(outputs[1].frame.first_pixel(), Some([10, 60, 10]));
        assert_eq!(outputs[2].frame.first_pixel(), Some([20, 70, 20]));
    }

    #[test]
    fn test_moderation_lock_is_permanent() {
        let classifier = Arc::new(MockClassifier::flag_at(2));
        let session = session_with(
            unlimited(),
            Arc::new(MockProcessor::new("swap")),
            classifier.clone(),
        );

        for _ in 0..6 {
            session.push_frame(frame([5, 5, 5]));
        }
        assert!(session.is_locked());
        assert_eq!(classifier.calls(), 3);
        let redacted: Vec<_> = std::iter::from_fn(|| session.try_pull_frame())
            .map(|o| o.redacted)
            .collect();
        assert_eq!(redacted, vec![false, false, true, true, true, true]);
    }

    #[test]
    fn test_lock_first_redacts_reused_frames() {
        let session = session_with(
            SessionOptions {
                frame_skip: 2,
                ..unlimited()
            },
            Arc::new(MockProcessor::new("swap")),
            Arc::new(MockClassifier::flag_at(1)),
        );
        // processed, reused, processed (locks), reused
        for _ in 0..4 {
            session.push_frame(frame([5, 5, 5]));
        }
        let redacted: Vec<_> = std::iter::from_fn(|| session.try_pull_frame())
            .map(|o| o.redacted)
            .collect();
        assert_eq!(redacted, vec![false, false, true, true]);
    }

    #[test]
    fn test_rate_limit_drops_early_frames() {
        let session = session_with(
            SessionOptions {
                max_fps: 1.0,
                ..unlimited()
            },
            Arc::new(MockProcessor::new("swap")),
            Arc::new(NoopClassifier),
        );
        assert!(matches!(
            session.push_frame(frame([1, 1, 1])),
            PushOutcome::Enqueued { .. }
        ));
        assert_eq!(session.push_frame(frame([1, 1, 1])), PushOutcome::RateLimited);
        assert_eq!(session.queued_frames(), 1);
    }

    #[test]
    fn test_processing_failure_drops_frame() {
        let session = session_with(
            unlimited(),
            Arc::new(MockProcessor::new("swap").failing_on_frame(1)),
            Arc::new(NoopClassifier),
        );
        session.push_frame(frame([1, 1, 1]));
        assert_eq!(
            session.push_frame(frame([1, 1, 1])),
            PushOutcome::ProcessingFailed
        );
        session.push_frame(frame([1, 1, 1]));
        assert_eq!(session.queued_frames(), 2);
    }

    #[test]
    fn test_ready_event_sent_once() {
        let session = session_with(
            unlimited().with_buffer_size(4),
            Arc::new(MockProcessor::new("swap")),
            Arc::new(NoopClassifier),
        );
        let mut events = session.take_events().unwrap();
        assert!(session.take_events().is_none());

        for _ in 0..6 {
            session.push_frame(frame([1, 1, 1]));
        }
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event.to_string());
        }
        assert_eq!(
            seen,
            vec!["frame:0", "frame:1", "ready", "frame:2", "frame:3", "frame:4", "frame:5"]
        );
    }

    #[test]
    fn test_output_resolution_preset_downscales() {
        let session = session_with(
            SessionOptions {
                output_resolution: OutputResolution::P480,
                ..unlimited()
            },
            Arc::new(MockProcessor::new("swap")),
            Arc::new(NoopClassifier),
        );
        session.push_frame(fixtures::solid_frame(Resolution::new(1280, 720), [1, 1, 1]));
        session.push_frame(fixtures::solid_frame(Resolution::new(320, 240), [1, 1, 1]));

        let first = session.try_pull_frame().unwrap();
        assert_eq!(first.frame.resolution(), Resolution::new(640, 360));
        let second = session.try_pull_frame().unwrap();
        assert_eq!(second.frame.resolution(), Resolution::new(320, 240));
    }

    #[test]
    fn test_bitrate_polls() {
        let session = session_with(
            unlimited(),
            Arc::new(MockProcessor::new("swap")),
            Arc::new(NoopClassifier),
        );
        for _ in 0..3 {
            assert_eq!(session.poll_bitrate(), None);
        }
        assert_eq!(session.poll_bitrate(), Some(150_000));
        assert_eq!(session.bitrate(), 150_000);
    }

    #[test]
    fn test_seek_requires_remote() {
        let session = session_with(
            unlimited(),
            Arc::new(MockProcessor::new("swap")),
            Arc::new(NoopClassifier),
        );
        assert!(matches!(session.seek(3.0), Err(StreamError::NotRemote)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let session = session_with(
            unlimited(),
            Arc::new(MockProcessor::new("swap")),
            Arc::new(NoopClassifier),
        );
        session.push_frame(frame([1, 1, 1]));
        session.close();
        session.close();

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.push_frame(frame([1, 1, 1])), PushOutcome::Closed);
        // Already queued frames can still be drained.
        assert!(session.pull_frame().await.is_some());
        assert!(session.pull_frame().await.is_none());
        // Resolves immediately once closed.
        session.closed().await;
    }
}
