//! Session API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use framefuse_core::streaming::SessionInfo;

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Lists open sessions, oldest first.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionInfo>> {
    Json(state.sessions().list())
}

/// Closes a session and forgets it.
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    state
        .sessions()
        .remove(id)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|e| (StatusCode::NOT_FOUND, ErrorResponse::new(e.to_string())))
}
