//! Mock moderation classifier for testing.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::frame::Frame;
use crate::moderation::Classifier;

/// Mock implementation of the Classifier trait.
///
/// Calls to either analyse method share one counter; every call whose
/// zero-based index is at or past the threshold is flagged.
#[derive(Debug)]
pub struct MockClassifier {
    flag_from: Option<u64>,
    calls: AtomicU64,
}

impl MockClassifier {
    /// Flags the `n`-th call and every call after it.
    pub fn flag_at(n: u64) -> Self {
        Self {
            flag_from: Some(n),
            calls: AtomicU64::new(0),
        }
    }

    pub fn always() -> Self {
        Self::flag_at(0)
    }

    pub fn never() -> Self {
        Self {
            flag_from: None,
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn classify(&self) -> bool {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.flag_from.is_some_and(|from| index >= from)
    }
}

impl Classifier for MockClassifier {
    fn name(&self) -> &str {
        "mock"
    }

    fn analyse_image(&self, _frame: &Frame) -> bool {
        self.classify()
    }

    fn analyse_stream(&self, _frame: &Frame, _fps: f64) -> bool {
        self.classify()
    }
}
