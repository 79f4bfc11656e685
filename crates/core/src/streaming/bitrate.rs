//! Adaptive bitrate control driven by output queue occupancy.

use serde::{Deserialize, Serialize};

/// Adaptive mode starting point, bits per second.
pub const ADAPTIVE_DEFAULT_BPS: u64 = 100_000;
pub const ADAPTIVE_MIN_BPS: u64 = 100_000;
pub const ADAPTIVE_MAX_BPS: u64 = 2_000_000;

const MANUAL_MIN_FLOOR_BPS: u64 = 500_000;
const MANUAL_MAX_FLOOR_BPS: u64 = 3_000_000;

/// Increase applied after a stable window.
pub const STEP_BPS: u64 = 50_000;
/// Consecutive low-occupancy polls required before increasing.
pub const STABLE_POLLS: u32 = 4;

const HIGH_WATERMARK: f64 = 0.7;
const LOW_WATERMARK: f64 = 0.3;
const DECREASE_FACTOR: f64 = 0.9;

/// Bitrate bounds and position. `min <= current <= max` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitrateState {
    pub target: u64,
    pub min: u64,
    pub max: u64,
    pub current: u64,
    pub stable_polls: u32,
    pub adaptive: bool,
}

impl BitrateState {
    /// Adaptive state with explicit bounds; `current` is clamped into them.
    pub fn new(min: u64, max: u64, current: u64) -> Self {
        let max = max.max(min);
        let current = current.clamp(min, max);
        Self {
            target: current,
            min,
            max,
            current,
            stable_polls: 0,
            adaptive: true,
        }
    }

    /// Builds the state for a requested bitrate in kbps.
    ///
    /// Zero selects adaptive mode; anything else is a fixed bitrate with
    /// bounds derived from it.
    pub fn from_requested(kbps: u64) -> Self {
        if kbps == 0 {
            return Self::new(ADAPTIVE_MIN_BPS, ADAPTIVE_MAX_BPS, ADAPTIVE_DEFAULT_BPS);
        }
        let requested = kbps.saturating_mul(1000);
        let min = MANUAL_MIN_FLOOR_BPS.max(requested / 2);
        let max = MANUAL_MAX_FLOOR_BPS.max(requested.saturating_mul(2));
        Self {
            adaptive: false,
            ..Self::new(min, max, requested)
        }
    }
}

/// Direction of a bitrate change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitrateDirection {
    Down,
    Up,
}

impl BitrateDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            BitrateDirection::Down => "down",
            BitrateDirection::Up => "up",
        }
    }
}

/// Applies the occupancy rules one poll at a time.
#[derive(Debug, Clone)]
pub struct BitrateController {
    state: BitrateState,
}

impl BitrateController {
    pub fn new(state: BitrateState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> BitrateState {
        self.state
    }

    pub fn current(&self) -> u64 {
        self.state.current
    }

    /// Feeds one queue occupancy sample and returns the new bitrate if it changed.
    pub fn observe(&mut self, queue_ratio: f64) -> Option<(u64, BitrateDirection)> {
        if !self.state.adaptive {
            return None;
        }
        let state = &mut self.state;
        let previous = state.current;

        if queue_ratio > HIGH_WATERMARK {
            state.stable_polls = 0;
            state.current = ((previous as f64 * DECREASE_FACTOR) as u64).max(state.min);
            return (state.current != previous).then_some((state.current, BitrateDirection::Down));
        }

        if queue_ratio < LOW_WATERMARK {
            state.stable_polls += 1;
            if state.stable_polls >= STABLE_POLLS {
                state.stable_polls = 0;
                state.current = (previous + STEP_BPS).min(state.max);
                return (state.current != previous).then_some((state.current, BitrateDirection::Up));
            }
            return None;
        }

        state.stable_polls = 0;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_requested_adaptive() {
        let state = BitrateState::from_requested(0);
        assert!(state.adaptive);
        assert_eq!(state.current, 100_000);
        assert_eq!(state.min, 100_000);
        assert_eq!(state.max, 2_000_000);
    }

    #[test]
    fn test_from_requested_manual_bounds() {
        let state = BitrateState::from_requested(800);
        assert!(!state.adaptive);
        assert_eq!(state.current, 800_000);
        assert_eq!(state.min, 500_000);
        assert_eq!(state.max, 3_000_000);

        let high = BitrateState::from_requested(4000);
        assert_eq!(high.min, 2_000_000);
        assert_eq!(high.max, 8_000_000);
    }

    #[test]
    fn test_manual_mode_never_adapts() {
        let mut controller = BitrateController::new(BitrateState::from_requested(800));
        for _ in 0..10 {
            assert!(controller.observe(0.95).is_none());
        }
        assert_eq!(controller.current(), 800_000);
    }

    #[test]
    fn test_high_occupancy_decreases_to_floor() {
        let mut controller = BitrateController::new(BitrateState::new(100_000, 2_000_000, 200_000));
        assert_eq!(
            controller.observe(0.8),
            Some((180_000, BitrateDirection::Down))
        );
        for _ in 0..20 {
            controller.observe(0.9);
        }
        assert_eq!(controller.current(), 100_000);
        assert!(controller.observe(0.9).is_none());
    }

    #[test]
    fn test_increase_needs_stable_window() {
        let mut controller = BitrateController::new(BitrateState::from_requested(0));
        for _ in 0..3 {
            assert!(controller.observe(0.1).is_none());
        }
        assert_eq!(controller.observe(0.1), Some((150_000, BitrateDirection::Up)));

        // A mid-range sample resets the window.
        for _ in 0..3 {
            controller.observe(0.1);
        }
        controller.observe(0.5);
        for _ in 0..3 {
            assert!(controller.observe(0.1).is_none());
        }
        assert_eq!(controller.observe(0.1), Some((200_000, BitrateDirection::Up)));
    }
}
