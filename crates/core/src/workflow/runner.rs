//! Ordered stage execution with guaranteed cleanup.

use async_trait::async_trait;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::types::{ErrorCode, ProcessingJobContext, StageKind, WorkflowStage};
use crate::metrics::STAGE_DURATION;

/// Executes a single stage against a job context.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn execute(
        &self,
        stage: StageKind,
        ctx: &mut ProcessingJobContext,
        cancel: &CancellationToken,
    ) -> ErrorCode;
}

/// Runs stages strictly in order.
///
/// The first nonzero outcome skips every remaining stage except the final
/// cleanup stage, which runs exactly once. A stop request observed between
/// stages turns the result into [`ErrorCode::UserCancelled`].
pub struct TaskSequenceRunner {
    cancel: CancellationToken,
}

impl TaskSequenceRunner {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub async fn run(
        &self,
        stages: &[WorkflowStage],
        executor: &dyn StageExecutor,
        ctx: &mut ProcessingJobContext,
    ) -> ErrorCode {
        let mut outcome = ErrorCode::Success;
        let last = stages.len().saturating_sub(1);

        for (position, stage) in stages.iter().enumerate() {
            let final_cleanup = position == last && stage.kind.is_cleanup();
            if !outcome.is_success() && !final_cleanup {
                debug!(stage = stage.name(), "Skipping stage");
                continue;
            }

            let start = Instant::now();
            let result = executor.execute(stage.kind, ctx, &self.cancel).await;
            STAGE_DURATION
                .with_label_values(&[stage.name()])
                .observe(start.elapsed().as_secs_f64());

            if result.is_success() {
                debug!(job_id = %ctx.job_id, stage = stage.name(), "Stage finished");
            } else {
                error!(
                    job_id = %ctx.job_id,
                    stage = stage.name(),
                    ordinal = stage.ordinal,
                    code = result.code(),
                    "Stage failed"
                );
                if outcome.is_success() {
                    outcome = result;
                }
            }

            if !final_cleanup && self.cancel.is_cancelled() && outcome != ErrorCode::UserCancelled {
                warn!(job_id = %ctx.job_id, stage = stage.name(), "Workflow stopped");
                outcome = ErrorCode::UserCancelled;
            }
        }

        info!(job_id = %ctx.job_id, outcome = %outcome, "Workflow finished");
        outcome
    }
}
