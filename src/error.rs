use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Corrupt configuration file {path}: {reason}")]
    CorruptConfig { path: PathBuf, reason: String },

    #[error("Failed to launch playback process: {0}")]
    PlaybackLaunch(String),

    #[error("Playback process exited unexpectedly: {0}")]
    PlaybackCrash(String),

    #[error("Event delivery to session {session} failed: {reason}")]
    Delivery { session: String, reason: String },

    #[error("System resources exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Sync controller is not running")]
    ControllerStopped,

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Errors the process cannot recover from on its own. The service
    /// manager is expected to restart the whole process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ResourceExhausted(_))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::ControllerStopped => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = json!({
            "status": "error",
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
