pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod events;
pub mod logging;
pub mod playlist;
pub mod supervisor;
pub mod system;
pub mod watcher;
pub mod web;

pub mod state {
    use crate::{config::AppConfig, controller::SyncHandle};
    use std::sync::Arc;
    use std::time::Instant;

    #[derive(Clone)]
    pub struct AppState {
        pub config: Arc<AppConfig>,
        pub sync: SyncHandle,
        pub started_at: Instant,
    }
}
