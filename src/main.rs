use anyhow::Context;
use clap::Parser;
use std::{
    future::IntoFuture,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{error, info, warn};

use vitrine::{
    config::{AppConfig, Cli},
    controller::{ControllerParts, SyncController},
    display::{Catalog, ConfigStore},
    logging,
    state::AppState,
    supervisor::{CommandLauncher, RestartPolicy},
    system::ShellSystemControl,
    watcher::VideoDirWatcher,
    web,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let started_at = Instant::now();
    let cli = Cli::parse();

    logging::init_logging_with_options(cli.log_level.as_deref(), cli.debug)?;

    let config = AppConfig::from_cli(&cli).context("Failed to load service configuration")?;
    let config = Arc::new(config);
    logging::log_startup_info(&config);

    if !config.media.video_dir.exists() {
        std::fs::create_dir_all(&config.media.video_dir).with_context(|| {
            format!(
                "Failed to create video directory: {}",
                config.media.video_dir.display()
            )
        })?;
        info!("Created video directory: {}", config.media.video_dir.display());
    }

    let store = ConfigStore::new(config.display_config_path());
    let catalog = Catalog::new(&config.media.video_dir, &config.media.supported_extensions);

    let (sync, mut controller) = SyncController::start(ControllerParts {
        store: store.clone(),
        catalog: Some(catalog.clone()),
        launcher: Arc::new(CommandLauncher::from_config(&config.player)),
        policy: RestartPolicy::from_config(&config.player, &config.restart),
        system: Arc::new(ShellSystemControl::new(config.system.reboot_command.clone())),
        ack_delay: Duration::from_millis(config.system.ack_delay_ms),
        session_buffer: config.events.session_buffer,
    })
    .await
    .context("Failed to start playback")?;

    logging::log_configuration_status(store.path(), &sync.config());

    let watcher = if config.media.watch_for_changes {
        match VideoDirWatcher::start(&catalog, sync.clone()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!("Video directory watching unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    let app_state = AppState {
        config: config.clone(),
        sync: sync.clone(),
        started_at,
    };
    let app = web::create_router(app_state);

    let interface = config
        .server
        .interface
        .parse()
        .context("Invalid server interface")?;
    let addr = SocketAddr::new(interface, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind admin interface on {}", addr))?;
    info!("Admin interface listening on http://{}", addr);

    let server = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .into_future();

    let graceful = tokio::select! {
        result = server => {
            result.context("HTTP server failed")?;
            true
        }
        result = &mut controller => {
            match result {
                Ok(Ok(())) => warn!("Sync controller stopped unexpectedly"),
                Ok(Err(e)) => {
                    error!("Sync controller failed: {}", e);
                    return Err(e).context("Unrecoverable playback failure");
                }
                Err(e) => error!("Sync controller task panicked: {}", e),
            }
            false
        }
    };

    if let Some(watcher) = watcher {
        watcher.stop();
    }
    if let Err(e) = sync.shutdown().await {
        warn!("Controller already stopped: {}", e);
    }

    logging::log_shutdown_info(graceful, started_at.elapsed());
    Ok(())
}
