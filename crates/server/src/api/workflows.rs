//! Workflow API handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use framefuse_core::{
    workflow::WorkflowError, ErrorCode, ProcessingJobContext, WorkflowVariant,
};

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Request body for running a workflow
#[derive(Debug, Deserialize)]
pub struct RunWorkflowBody {
    pub variant: WorkflowVariant,
    pub target_path: PathBuf,
    #[serde(default)]
    pub source_paths: Vec<PathBuf>,
    pub output_path: PathBuf,
    pub trim_frame_start: Option<u64>,
    pub trim_frame_end: Option<u64>,
}

/// Outcome of a finished run
#[derive(Debug, Serialize)]
pub struct RunWorkflowResponse {
    pub job_id: String,
    pub outcome_code: i32,
    pub outcome: ErrorCode,
}

#[derive(Debug, Serialize)]
pub struct StopWorkflowResponse {
    pub stopped: bool,
}

/// Runs a workflow to completion and reports its outcome code.
pub async fn run_workflow(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunWorkflowBody>,
) -> Result<Json<RunWorkflowResponse>, (StatusCode, Json<ErrorResponse>)> {
    if body.target_path.as_os_str().is_empty() || body.output_path.as_os_str().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            ErrorResponse::new("target_path and output_path are required"),
        ));
    }

    let mut ctx = ProcessingJobContext::new(body.target_path, body.output_path)
        .with_sources(body.source_paths)
        .with_trim(body.trim_frame_start, body.trim_frame_end);
    let job_id = ctx.job_id.to_string();
    info!(job = %job_id, variant = %body.variant, "Workflow requested");

    // The run owns its context so a dropped request cannot skip the cleanup stage.
    let engine = Arc::clone(state.engine());
    let variant = body.variant;
    let run = tokio::spawn(async move { engine.run_workflow(variant, &mut ctx).await });

    let result = run.await.map_err(|e| {
        error!(job = %job_id, error = %e, "Workflow task failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new("Workflow task failed"),
        )
    })?;

    match result {
        Ok(outcome) => Ok(Json(RunWorkflowResponse {
            job_id,
            outcome_code: outcome.code(),
            outcome,
        })),
        Err(WorkflowError::AlreadyRunning) => Err((
            StatusCode::CONFLICT,
            ErrorResponse::new("A workflow is already running"),
        )),
    }
}

/// Requests a cooperative stop of the running workflow.
pub async fn stop_workflow(State(state): State<Arc<AppState>>) -> Json<StopWorkflowResponse> {
    Json(StopWorkflowResponse {
        stopped: state.engine().stop(),
    })
}
