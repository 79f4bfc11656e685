//! Bounded worker pool running the frame pipeline over temp frames.

use futures::future::join_all;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::types::{BatchError, BatchProgress, BatchReport, FrameFailure, FrameJob, SharedInputs};
use crate::frame::{load_frame, save_frame};
use crate::metrics::{FRAMES_CANCELLED, FRAMES_FAILED, FRAMES_PROCESSED};
use crate::processing::{FrameBundle, FramePipeline, ProcessorError, WorkingFrame};

/// Runs a [`FramePipeline`] over every frame of a job with at most
/// `worker_count` frames in flight.
///
/// Frames are submitted in ascending order and overwritten in place;
/// completion order is not defined. A stop request (or the first failed
/// frame) prevents further submissions while in-flight frames finish.
pub struct ConcurrentFrameProcessor {
    pipeline: Arc<FramePipeline>,
    worker_count: usize,
}

impl ConcurrentFrameProcessor {
    pub fn new(pipeline: Arc<FramePipeline>, worker_count: usize) -> Self {
        Self {
            pipeline,
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Processes the job and reports how many frames made it.
    pub async fn run(
        &self,
        job: FrameJob,
        cancel: CancellationToken,
        progress_tx: Option<mpsc::Sender<BatchProgress>>,
    ) -> Result<BatchReport, BatchError> {
        let total = job.frame_paths.len() as u64;
        if total == 0 {
            return Err(BatchError::NoFrames);
        }

        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let stop = cancel.child_token();
        let processed = Arc::new(AtomicU64::new(0));
        let mut handles = Vec::with_capacity(job.frame_paths.len());
        let mut cancelled = 0u64;

        info!(frames = total, workers = self.worker_count, "Processing frames");

        for (index, path) in job.frame_paths.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = stop.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                cancelled = total - index as u64;
                break;
            };

            let pipeline = Arc::clone(&self.pipeline);
            let inputs = Arc::clone(&job.inputs);
            let processed = Arc::clone(&processed);
            let progress_tx = progress_tx.clone();
            let stop = stop.clone();

            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let frame_number = inputs.frame_offset + index as u64;
                match process_frame_file(&pipeline, &inputs, &path, frame_number) {
                    Ok(()) => {
                        let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                        FRAMES_PROCESSED.with_label_values(&["output"]).inc();
                        if let Some(tx) = &progress_tx {
                            let _ = tx.try_send(BatchProgress {
                                processed: done,
                                total,
                            });
                        }
                        None
                    }
                    Err(e) => {
                        error!(frame = index, path = %path.display(), error = %e, "Frame processing failed");
                        stop.cancel();
                        Some(FrameFailure {
                            index,
                            reason: e.to_string(),
                        })
                    }
                }
            }));
        }

        let mut failures = Vec::new();
        for result in join_all(handles).await {
            match result {
                Ok(Some(failure)) => failures.push(failure),
                Ok(None) => {}
                Err(e) => failures.push(FrameFailure {
                    index: usize::MAX,
                    reason: format!("worker panicked: {}", e),
                }),
            }
        }

        self.pipeline.post_process_all();

        let processed = processed.load(Ordering::Relaxed);
        FRAMES_CANCELLED.inc_by(cancelled);
        FRAMES_FAILED.inc_by(failures.len() as u64);

        let report = BatchReport {
            total,
            processed,
            cancelled,
            failures,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        debug!(?report, "Batch finished");
        Ok(report)
    }
}

/// Load, transform and overwrite one temp frame.
fn process_frame_file(
    pipeline: &FramePipeline,
    inputs: &SharedInputs,
    path: &Path,
    frame_number: u64,
) -> Result<(), ProcessorError> {
    let (target, mask) = load_frame(path)?;
    let audio = inputs.audio_for(frame_number);
    let bundle = FrameBundle {
        reference: inputs.reference.as_ref().unwrap_or(&target),
        sources: &inputs.sources,
        source_audio: &audio,
        source_voice: &audio,
        target: &target,
        frame_number,
    };
    let working = pipeline.apply(&bundle, WorkingFrame::with_mask(target.clone(), mask))?;
    save_frame(path, &working.frame, working.mask.as_ref())?;
    Ok(())
}
