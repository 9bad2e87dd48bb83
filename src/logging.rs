use anyhow::{anyhow, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::display::Configuration;

/// Initialize logging. `RUST_LOG` takes precedence over `log_level`.
pub fn init_logging_with_options(log_level: Option<&str>, debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let level = log_level.unwrap_or(default_level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow!("Invalid log level '{}': {}", level, e))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow!("Logging already initialized: {}", e))?;

    info!("Logging initialized with level: {}", level);
    Ok(())
}

pub fn log_startup_info(config: &AppConfig) {
    info!("=== Vitrine Display Service Starting ===");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Process ID: {}", std::process::id());
    info!(
        "Admin interface: http://{}:{}",
        config.server.interface, config.server.port
    );
    info!(
        "Player: {} {}",
        config.player.program,
        config.player.args.join(" ")
    );
    info!(
        "Crash protection: {} attempts within {}s, backoff {}ms..{}ms",
        config.restart.max_attempts,
        config.restart.failure_window_secs,
        config.restart.backoff_initial_ms,
        config.restart.backoff_max_ms
    );
    log_video_dir_status(&config.media.video_dir, config.media.watch_for_changes);
}

fn log_video_dir_status(video_dir: &Path, watching: bool) {
    if video_dir.is_dir() {
        info!("Video directory: {} [accessible]", video_dir.display());
    } else {
        warn!(
            "Video directory: {} [inaccessible] - no videos will be found",
            video_dir.display()
        );
    }

    if watching {
        info!("Watching video directory for changes");
    } else {
        info!("Video directory watching disabled - use rescan to pick up new files");
    }
}

/// Summary of the display configuration the controller started with.
pub fn log_configuration_status(path: &Path, config: &Configuration) {
    info!("=== Display Configuration ===");
    info!("Configuration file: {}", path.display());
    info!("Display name: {}", config.display_name);

    let enabled = config.videos.iter().filter(|v| v.enabled).count();
    info!("Videos: {} in catalog, {} enabled", config.videos.len(), enabled);
    if enabled == 0 {
        warn!("No enabled videos - playback stays idle until a video is enabled");
    }
}

pub fn log_shutdown_info(graceful: bool, uptime: Duration) {
    info!("=== Vitrine Display Service Shutting Down ===");

    let shutdown_type = if graceful { "Graceful" } else { "Forced" };
    info!("Shutdown type: {}", shutdown_type);

    let uptime_seconds = uptime.as_secs();
    info!(
        "Total uptime: {}h {}m",
        uptime_seconds / 3600,
        (uptime_seconds % 3600) / 60
    );

    if !graceful {
        warn!("Forced shutdown - the player may have been left running");
    }

    info!("=== Shutdown Complete ===");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_initialization() {
        // A second call reports the existing subscriber instead of panicking.
        let _ = init_logging_with_options(Some("debug"), false);
        assert!(init_logging_with_options(Some("info"), false).is_err());
    }

    #[test]
    fn test_status_logging_does_not_panic() {
        let config = AppConfig::default();
        log_startup_info(&config);
        log_configuration_status(Path::new("/tmp/player_config.json"), &Configuration::default());
        log_shutdown_info(true, Duration::from_secs(3725));
        log_shutdown_info(false, Duration::ZERO);
    }
}
