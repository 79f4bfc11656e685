use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, middleware::metrics_middleware, remote, sessions, workflows, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // File-based workflows
        .route("/workflows/run", post(workflows::run_workflow))
        .route("/workflows/stop", post(workflows::stop_workflow))
        // Live sessions
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/{id}", delete(sessions::close_session))
        .route("/stream/ws", get(ws::live_stream))
        .route("/stream/remote", post(remote::create_remote))
        .route("/stream/remote/{id}/ws", get(remote::remote_ws))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
