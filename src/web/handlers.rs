use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    display::{ConfigUpdate, Configuration},
    error::Result,
    events::PlaylistPayload,
    state::AppState,
    supervisor::PlaybackState,
};

pub async fn root_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "vitrine",
        "version": env!("CARGO_PKG_VERSION"),
        "display_name": state.sync.config().display_name,
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

pub async fn config_handler(State(state): State<AppState>) -> Json<Configuration> {
    Json(state.sync.config().as_ref().clone())
}

pub async fn playlist_handler(State(state): State<AppState>) -> Json<PlaylistPayload> {
    Json(state.sync.playlist_payload())
}

pub async fn status_handler(State(state): State<AppState>) -> Json<PlaybackState> {
    Json(state.sync.status())
}

pub async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<Value>> {
    state.sync.update_config(update).await?;
    Ok(Json(json!({ "status": "success" })))
}

pub async fn toggle_preview(State(state): State<AppState>) -> Result<Json<Value>> {
    let enabled = state.sync.toggle_preview().await?;
    Ok(Json(json!({ "status": "success", "preview_enabled": enabled })))
}

pub async fn toggle_dark_mode(State(state): State<AppState>) -> Result<Json<Value>> {
    let enabled = state.sync.toggle_dark_mode().await?;
    Ok(Json(json!({ "status": "success", "dark_mode": enabled })))
}

pub async fn restart_player(State(state): State<AppState>) -> Result<Json<Value>> {
    info!("Player restart requested from admin interface");
    state.sync.restart_player().await?;
    Ok(Json(json!({ "status": "success", "message": "Video player restarted" })))
}

pub async fn restart_system(State(state): State<AppState>) -> Result<Json<Value>> {
    info!("System restart requested from admin interface");
    state.sync.restart_system().await?;
    Ok(Json(json!({ "status": "success", "message": "System restarting..." })))
}

pub async fn restart_service(State(state): State<AppState>) -> Result<Json<Value>> {
    info!("Service restart requested from admin interface");
    state.sync.restart_service().await?;
    Ok(Json(json!({ "status": "success", "message": "Service restarting..." })))
}
