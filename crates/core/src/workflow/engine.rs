//! Entry point for file-based workflow runs.

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::runner::{StageExecutor, TaskSequenceRunner};
use super::types::{ErrorCode, ProcessingJobContext, WorkflowVariant};
use crate::metrics::WORKFLOW_OUTCOMES;

/// Errors preventing a workflow from starting.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("A workflow is already running")]
    AlreadyRunning,
}

/// Runs one workflow at a time and accepts stop requests for it.
pub struct WorkflowEngine {
    executor: Arc<dyn StageExecutor>,
    current: Mutex<Option<CancellationToken>>,
}

/// Clears the running slot however the run ends.
struct RunGuard<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

impl WorkflowEngine {
    pub fn new(executor: Arc<dyn StageExecutor>) -> Self {
        Self {
            executor,
            current: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Requests a cooperative stop of the running workflow.
    ///
    /// Returns `false` when nothing is running.
    pub fn stop(&self) -> bool {
        match self.current.lock().as_ref() {
            Some(token) => {
                info!("Stop requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Runs every stage of `variant` against `ctx` and returns the outcome.
    pub async fn run_workflow(
        &self,
        variant: WorkflowVariant,
        ctx: &mut ProcessingJobContext,
    ) -> Result<ErrorCode, WorkflowError> {
        let token = {
            let mut current = self.current.lock();
            if current.is_some() {
                return Err(WorkflowError::AlreadyRunning);
            }
            let token = CancellationToken::new();
            *current = Some(token.clone());
            token
        };
        let _guard = RunGuard {
            slot: &self.current,
        };

        info!(
            job_id = %ctx.job_id,
            %variant,
            target = %ctx.target_path.display(),
            output = %ctx.output_path.display(),
            "Starting workflow"
        );

        let stages = variant.stages();
        let outcome = TaskSequenceRunner::new(token)
            .run(&stages, self.executor.as_ref(), ctx)
            .await;

        WORKFLOW_OUTCOMES
            .with_label_values(&[variant.as_str(), outcome.as_str()])
            .inc();
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::StageKind;
    use async_trait::async_trait;
    use std::time::Duration;

    struct SlowExecutor;

    #[async_trait]
    impl StageExecutor for SlowExecutor {
        async fn execute(
            &self,
            _stage: StageKind,
            _ctx: &mut ProcessingJobContext,
            cancel: &CancellationToken,
        ) -> ErrorCode {
            tokio::select! {
                _ = cancel.cancelled() => ErrorCode::UserCancelled,
                _ = tokio::time::sleep(Duration::from_millis(20)) => ErrorCode::Success,
            }
        }
    }

    #[tokio::test]
    async fn test_stop_and_single_run() {
        let engine = Arc::new(WorkflowEngine::new(Arc::new(SlowExecutor)));
        assert!(!engine.stop());

        let running = {
            let engine = engine.clone();
            tokio::spawn(async move {
                let mut ctx = ProcessingJobContext::new("/in/a.mp4", "/out/a.mp4");
                engine
                    .run_workflow(WorkflowVariant::ImageToVideo, &mut ctx)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(engine.is_running());

        let mut other = ProcessingJobContext::new("/in/b.mp4", "/out/b.mp4");
        assert!(matches!(
            engine
                .run_workflow(WorkflowVariant::ImageToVideo, &mut other)
                .await,
            Err(WorkflowError::AlreadyRunning)
        ));

        assert!(engine.stop());
        let outcome = running.await.unwrap().unwrap();
        assert_eq!(outcome, ErrorCode::UserCancelled);
        assert!(!engine.is_running());
    }
}
