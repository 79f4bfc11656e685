//! Admission and frame-skip policies for live ingest.

use std::time::{Duration, Instant};

/// Enforces a minimum interval between admitted frames.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    pub fn new(max_fps: f64) -> Self {
        let min_interval = if max_fps > 0.0 {
            Duration::from_secs_f64(1.0 / max_fps)
        } else {
            Duration::ZERO
        };
        Self {
            min_interval,
            last: None,
        }
    }

    /// Whether a frame arriving at `now` is admitted.
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Fully processes every Nth admitted frame.
#[derive(Debug, Clone)]
pub struct FrameSkipPolicy {
    every: u64,
    admitted: u64,
}

impl FrameSkipPolicy {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            admitted: 0,
        }
    }

    /// Call once per admitted frame.
    pub fn should_process(&mut self) -> bool {
        let process = self.admitted % self.every == 0;
        self.admitted += 1;
        process
    }
}
