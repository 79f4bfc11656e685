//! Remote stream sessions: ingest from a URL through ffmpeg, egress over WebSocket.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use framefuse_core::{
    streaming::{RemoteStreamOptions, StreamingSession},
    Resolution,
};

use super::handlers::ErrorResponse;
use super::ws::{serve_session, session_options};
use crate::state::AppState;

/// Request body for opening a remote session
#[derive(Debug, Deserialize)]
pub struct CreateRemoteBody {
    pub stream_url: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Requested bitrate in kbps; 0 or absent selects adaptive mode.
    pub bitrate: Option<u64>,
    pub buffer_size: Option<usize>,
    #[serde(default)]
    pub source_paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct CreateRemoteResponse {
    pub session_id: Uuid,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, ErrorResponse::new(message))
}

/// Starts ingesting `stream_url` into a new session.
pub async fn create_remote(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRemoteBody>,
) -> Result<(StatusCode, Json<CreateRemoteResponse>), ApiError> {
    if body.stream_url.trim().is_empty() {
        return Err(bad_request("stream_url is required"));
    }
    if body.width == 0 || body.height == 0 {
        return Err(bad_request("width and height must be positive"));
    }
    if !(body.fps.is_finite() && body.fps > 0.0) {
        return Err(bad_request("fps must be positive"));
    }

    let sources = state
        .load_sources(&body.source_paths)
        .map_err(|e| bad_request(format!("Failed to load sources: {}", e)))?;
    let options = session_options(&state, body.bitrate, body.buffer_size)?;
    let remote = RemoteStreamOptions {
        url: body.stream_url.trim().to_string(),
        resolution: Resolution::new(body.width, body.height),
        fps: body.fps,
        start_secs: 0.0,
        user_agent: state.config().tools.user_agent.clone(),
    };

    let session = StreamingSession::new(options, state.pipeline(), sources, state.classifier());
    if let Err(e) = session.open_remote(remote, state.ffmpeg_args(), state.spawner()) {
        warn!(session = %session.id(), error = %e, "Failed to start remote ingest");
        session.close();
        return Err((
            StatusCode::BAD_GATEWAY,
            ErrorResponse::new(format!("Failed to open stream: {}", e)),
        ));
    }
    state.sessions().insert(Arc::clone(&session));
    info!(session = %session.id(), url = %body.stream_url, "Remote session started");

    Ok((
        StatusCode::CREATED,
        Json(CreateRemoteResponse {
            session_id: session.id(),
        }),
    ))
}

/// `GET /stream/remote/{id}/ws`: egress of a remote session plus seek commands.
///
/// Unknown sessions get 404 and sessions that already have a consumer get 409,
/// before the upgrade itself is checked.
pub async fn remote_ws(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let session = state.sessions().get(id).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            ErrorResponse::new(format!("Session not found: {}", id)),
        )
    })?;
    if session.has_sink() {
        return Err((
            StatusCode::CONFLICT,
            ErrorResponse::new(format!("Session {} already has a consumer", id)),
        ));
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    Ok(ws
        .on_upgrade(move |socket| serve_session(socket, state, session, None))
        .into_response())
}
