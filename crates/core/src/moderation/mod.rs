//! Content moderation.
//!
//! The [`Classifier`] is an external collaborator; the [`ModerationGate`]
//! wraps one per live session and turns a single positive sample into a
//! permanent lock.

mod gate;

pub use gate::ModerationGate;

use crate::frame::Frame;

/// Decides whether content must not be shown.
pub trait Classifier: Send + Sync {
    /// Returns the name of this classifier implementation.
    fn name(&self) -> &str;

    /// Classifies a still image (batch analyse stages).
    fn analyse_image(&self, frame: &Frame) -> bool;

    /// Classifies a frame of a live stream.
    fn analyse_stream(&self, frame: &Frame, fps: f64) -> bool;
}

/// Never flags anything.
pub struct NoopClassifier;

impl Classifier for NoopClassifier {
    fn name(&self) -> &str {
        "noop"
    }

    fn analyse_image(&self, _frame: &Frame) -> bool {
        false
    }

    fn analyse_stream(&self, _frame: &Frame, _fps: f64) -> bool {
        false
    }
}
