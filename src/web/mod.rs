pub mod handlers;
pub mod sse;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/api/config", get(handlers::config_handler))
        .route("/api/playlist", get(handlers::playlist_handler))
        .route("/api/status", get(handlers::status_handler))
        .route("/update_config", post(handlers::update_config))
        .route("/toggle_preview", post(handlers::toggle_preview))
        .route("/toggle_dark_mode", post(handlers::toggle_dark_mode))
        .route("/system/restart", post(handlers::restart_system))
        .route("/system/restart_player", post(handlers::restart_player))
        .route("/system/restart_daemon", post(handlers::restart_service))
        .route("/events", get(sse::events_handler))
        .with_state(state)
}
