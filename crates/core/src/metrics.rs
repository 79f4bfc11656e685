//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Batch processing (frames processed, cancelled)
//! - Workflows (outcomes, stage durations)
//! - Streaming (dropped frames, moderation trips, sessions, bitrate)
//! - External tools (invocations, durations)

use once_cell::sync::Lazy;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
};

// =============================================================================
// Batch Metrics
// =============================================================================

/// Frames that went through the processing chain, by mode.
pub static FRAMES_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "framefuse_frames_processed_total",
            "Total frames processed",
        ),
        &["mode"], // "output", "stream"
    )
    .unwrap()
});

/// Batch frames skipped by a stop request or an earlier failure.
pub static FRAMES_CANCELLED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "framefuse_frames_cancelled_total",
        "Total batch frames cancelled before processing",
    )
    .unwrap()
});

/// Batch frames whose processing failed.
pub static FRAMES_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "framefuse_frames_failed_total",
        "Total batch frames that failed processing",
    )
    .unwrap()
});

// =============================================================================
// Workflow Metrics
// =============================================================================

/// Workflow runs by variant and outcome.
pub static WORKFLOW_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "framefuse_workflow_outcomes_total",
            "Total workflow runs by outcome",
        ),
        &["variant", "outcome"],
    )
    .unwrap()
});

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "framefuse_stage_duration_seconds",
            "Duration of workflow stages",
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0]),
        &["stage"],
    )
    .unwrap()
});

// =============================================================================
// Streaming Metrics
// =============================================================================

/// Frames dropped on live sessions, by reason.
pub static FRAMES_DROPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "framefuse_frames_dropped_total",
            "Total live frames dropped",
        ),
        &["reason"], // "rate_limit", "queue_overflow", "processing_error"
    )
    .unwrap()
});

/// Sessions whose moderation lock tripped.
pub static MODERATION_TRIPS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "framefuse_moderation_trips_total",
        "Total sessions locked by content moderation",
    )
    .unwrap()
});

/// Currently open live sessions.
pub static ACTIVE_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("framefuse_active_sessions", "Number of open live sessions").unwrap()
});

/// Current bitrate per session in bits per second.
pub static SESSION_BITRATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "framefuse_session_bitrate_bps",
            "Current target bitrate per session",
        ),
        &["session"],
    )
    .unwrap()
});

/// Bitrate adjustments by direction.
pub static BITRATE_ADJUSTMENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "framefuse_bitrate_adjustments_total",
            "Total adaptive bitrate adjustments",
        ),
        &["direction"], // "down", "up"
    )
    .unwrap()
});

// =============================================================================
// External Tool Metrics
// =============================================================================

/// Tool invocations by operation and result.
pub static TOOL_INVOCATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "framefuse_tool_invocations_total",
            "Total external tool invocations",
        ),
        &["operation", "result"], // result: "success", "failed", "timeout"
    )
    .unwrap()
});

/// Tool invocation duration in seconds.
pub static TOOL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "framefuse_tool_duration_seconds",
            "Duration of external tool invocations",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]),
        &["operation"],
    )
    .unwrap()
});

/// Returns all core metrics for registration with a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Batch
        Box::new(FRAMES_PROCESSED.clone()),
        Box::new(FRAMES_CANCELLED.clone()),
        Box::new(FRAMES_FAILED.clone()),
        // Workflow
        Box::new(WORKFLOW_OUTCOMES.clone()),
        Box::new(STAGE_DURATION.clone()),
        // Streaming
        Box::new(FRAMES_DROPPED.clone()),
        Box::new(MODERATION_TRIPS.clone()),
        Box::new(ACTIVE_SESSIONS.clone()),
        Box::new(SESSION_BITRATE.clone()),
        Box::new(BITRATE_ADJUSTMENTS.clone()),
        // Tools
        Box::new(TOOL_INVOCATIONS.clone()),
        Box::new(TOOL_DURATION.clone()),
    ]
}
