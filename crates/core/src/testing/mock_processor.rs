//! Mock processing capability for testing.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::processing::{FrameBundle, FrameProcessor, ProcessMode, ProcessorError, WorkingFrame};

/// Mock implementation of the FrameProcessor trait.
///
/// Provides controllable behavior for testing:
/// - Count calls and remember which frame numbers were seen
/// - Tint frames by a fixed amount so ordering is observable
/// - Decline, fail, refuse to start, or fail on a single frame
/// - Simulate slow work
///
/// # Example
///
/// ```rust,ignore
/// use framefuse_core::testing::MockProcessor;
///
/// let swap = Arc::new(MockProcessor::tinting("swap", [0, 40, 0]).failing_on_frame(3));
/// let pipeline = FramePipeline::new(vec![swap.clone()]);
/// // ...
/// assert_eq!(swap.calls(), 4);
/// ```
#[derive(Debug, Default)]
pub struct MockProcessor {
    name: String,
    tint: Option<[u8; 3]>,
    declining: bool,
    failing: bool,
    not_ready: bool,
    fail_on: Option<u64>,
    delay: Duration,
    calls: AtomicUsize,
    post_process_calls: AtomicUsize,
    last_seen: Mutex<Option<[u8; 3]>>,
    frames_seen: Mutex<Vec<u64>>,
}

impl MockProcessor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Adds `rgb` to every pixel, saturating.
    pub fn tinting(name: &str, rgb: [u8; 3]) -> Self {
        Self {
            tint: Some(rgb),
            ..Self::new(name)
        }
    }

    /// `applies_to` returns false for every frame.
    pub fn declining(mut self) -> Self {
        self.declining = true;
        self
    }

    /// Every frame fails.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// `pre_process` refuses to run.
    pub fn not_ready(mut self) -> Self {
        self.not_ready = true;
        self
    }

    pub fn failing_on_frame(mut self, frame_number: u64) -> Self {
        self.fail_on = Some(frame_number);
        self
    }

    /// Blocks for `delay` inside every `process_frame`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn post_process_calls(&self) -> usize {
        self.post_process_calls.load(Ordering::SeqCst)
    }

    /// First pixel of the last working frame handed in.
    pub fn last_seen_pixel(&self) -> Option<[u8; 3]> {
        *self.last_seen.lock()
    }

    /// Frame numbers processed, sorted.
    pub fn frames_seen(&self) -> Vec<u64> {
        let mut frames = self.frames_seen.lock().clone();
        frames.sort_unstable();
        frames
    }
}

impl FrameProcessor for MockProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn pre_process(&self, _mode: ProcessMode) -> bool {
        !self.not_ready
    }

    fn applies_to(&self, _bundle: &FrameBundle<'_>) -> bool {
        !self.declining
    }

    fn process_frame(
        &self,
        bundle: &FrameBundle<'_>,
        mut working: WorkingFrame,
    ) -> Result<WorkingFrame, ProcessorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_seen.lock() = working.frame.first_pixel();
        self.frames_seen.lock().push(bundle.frame_number);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.failing || self.fail_on == Some(bundle.frame_number) {
            return Err(ProcessorError::failed(
                &self.name,
                format!("mock failure on frame {}", bundle.frame_number),
            ));
        }

        if let Some(tint) = self.tint {
            for pixel in working.frame.image_mut().pixels_mut() {
                for (channel, add) in pixel.0.iter_mut().zip(tint) {
                    *channel = channel.saturating_add(add);
                }
            }
        }
        Ok(working)
    }

    fn post_process(&self) {
        self.post_process_calls.fetch_add(1, Ordering::SeqCst);
    }
}
