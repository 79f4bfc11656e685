use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

use super::Classifier;
use crate::frame::Frame;
use crate::metrics::MODERATION_TRIPS;

/// One-way moderation lock for a single session.
///
/// The classifier is consulted on every `sample_interval`-th frame until it
/// flags one; from then on [`check`](Self::check) returns `true` without
/// classifying anything.
pub struct ModerationGate {
    classifier: Arc<dyn Classifier>,
    locked: AtomicBool,
    sample_interval: u64,
    seen: AtomicU64,
    fps: f64,
    label: String,
}

impl ModerationGate {
    pub fn new(classifier: Arc<dyn Classifier>, sample_interval: u64, fps: f64) -> Self {
        Self {
            classifier,
            locked: AtomicBool::new(false),
            sample_interval: sample_interval.max(1),
            seen: AtomicU64::new(0),
            fps,
            label: String::new(),
        }
    }

    /// Tags log lines with the owning session.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Returns whether the gate is tripped after looking at `frame`.
    pub fn check(&self, frame: &Frame) -> bool {
        if self.is_locked() {
            return true;
        }
        let index = self.seen.fetch_add(1, Ordering::Relaxed);
        if index % self.sample_interval != 0 {
            return false;
        }
        if self.classifier.analyse_stream(frame, self.fps) {
            self.trip();
            return true;
        }
        false
    }

    pub(crate) fn trip(&self) {
        if self
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            MODERATION_TRIPS.inc();
            warn!(
                session = %self.label,
                classifier = self.classifier.name(),
                frame = self.seen.load(Ordering::Relaxed).saturating_sub(1),
                "Moderation lock tripped"
            );
        }
    }
}
