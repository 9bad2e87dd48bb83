//! The single writer of display state.
//!
//! [`SyncController`] runs as one task that owns the [`ConfigStore`], the
//! [`PlaybackSupervisor`] and the publishing side of the [`EventBus`]. Admin
//! requests arrive on a command queue and process notifications on the
//! supervisor's event channel; the task handles one at a time in arrival
//! order. Readers use [`SyncHandle`] snapshots and never wait on the queue.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::display::{Catalog, ConfigStore, ConfigUpdate, Configuration};
use crate::error::{Error, Result};
use crate::events::{BusEvent, EventBus, MetadataPayload, PlaylistPayload};
use crate::playlist::{self, Playlist};
use crate::supervisor::{
    PlaybackState, PlaybackSupervisor, PlayerLauncher, RestartPolicy, SupervisorEvent,
};
use crate::system::SystemControl;

const COMMAND_QUEUE: usize = 32;

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    Apply {
        config: Configuration,
        reply: Reply<()>,
    },
    Update {
        update: ConfigUpdate,
        reply: Reply<()>,
    },
    Rescan {
        reply: Reply<bool>,
    },
    TogglePreview {
        reply: Reply<bool>,
    },
    ToggleDarkMode {
        reply: Reply<bool>,
    },
    RestartPlayer {
        reply: Reply<()>,
    },
    RestartSystem {
        reply: Reply<()>,
    },
    RestartService {
        reply: Reply<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Everything the controller takes ownership of at start.
pub struct ControllerParts {
    pub store: ConfigStore,
    /// Video directory to reconcile against; `None` disables scanning.
    pub catalog: Option<Catalog>,
    pub launcher: Arc<dyn PlayerLauncher>,
    pub policy: RestartPolicy,
    pub system: Arc<dyn SystemControl>,
    /// Delay between acknowledging an OS-level restart and performing it.
    pub ack_delay: Duration,
    pub session_buffer: usize,
}

/// Cloneable client of a running [`SyncController`].
#[derive(Clone)]
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
    config: watch::Receiver<Arc<Configuration>>,
    status: watch::Receiver<PlaybackState>,
    bus: EventBus,
}

impl SyncHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| Error::ControllerStopped)?;
        response.await.map_err(|_| Error::ControllerStopped)?
    }

    /// Replace the whole configuration.
    pub async fn apply_config(&self, config: Configuration) -> Result<()> {
        self.request(|reply| Command::Apply { config, reply }).await
    }

    /// Merge an admin update into the current configuration and apply it.
    pub async fn update_config(&self, update: ConfigUpdate) -> Result<()> {
        self.request(|reply| Command::Update { update, reply }).await
    }

    /// Reconcile with the video directory. Returns whether anything changed.
    pub async fn rescan(&self) -> Result<bool> {
        self.request(|reply| Command::Rescan { reply }).await
    }

    /// Returns the new value.
    pub async fn toggle_preview(&self) -> Result<bool> {
        self.request(|reply| Command::TogglePreview { reply }).await
    }

    /// Returns the new value.
    pub async fn toggle_dark_mode(&self) -> Result<bool> {
        self.request(|reply| Command::ToggleDarkMode { reply }).await
    }

    pub async fn restart_player(&self) -> Result<()> {
        self.request(|reply| Command::RestartPlayer { reply }).await
    }

    /// Resolves once the request is acknowledged; the reboot follows after a short delay.
    pub async fn restart_system(&self) -> Result<()> {
        self.request(|reply| Command::RestartSystem { reply }).await
    }

    pub async fn restart_service(&self) -> Result<()> {
        self.request(|reply| Command::RestartService { reply }).await
    }

    /// Stop the player and end the controller task.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(Command::Shutdown { reply })
            .await
            .map_err(|_| Error::ControllerStopped)?;
        done.await.map_err(|_| Error::ControllerStopped)
    }

    pub fn config(&self) -> Arc<Configuration> {
        self.config.borrow().clone()
    }

    pub fn status(&self) -> PlaybackState {
        self.status.borrow().clone()
    }

    pub fn playlist(&self) -> Playlist {
        playlist::resolve(&self.config())
    }

    pub fn playlist_payload(&self) -> PlaylistPayload {
        PlaylistPayload::from(self.config().as_ref())
    }

    pub fn watch_status(&self) -> watch::Receiver<PlaybackState> {
        self.status.clone()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

pub struct SyncController {
    store: ConfigStore,
    catalog: Option<Catalog>,
    supervisor: PlaybackSupervisor,
    system: Arc<dyn SystemControl>,
    ack_delay: Duration,
    bus: EventBus,
    config: watch::Sender<Arc<Configuration>>,
    status: watch::Sender<PlaybackState>,
}

impl SyncController {
    /// Load and reconcile the display configuration, start playback and
    /// spawn the controller task.
    ///
    /// The returned task resolves when the controller shuts down, or with an
    /// error the process cannot recover from.
    pub async fn start(parts: ControllerParts) -> Result<(SyncHandle, JoinHandle<Result<()>>)> {
        let mut config = parts.store.load_or_default().normalized();

        if let Some(catalog) = &parts.catalog {
            match catalog.reconcile(&config) {
                Ok(scan) => {
                    info!("Catalog scan of {}: {}", catalog.video_dir().display(), scan.summary());
                    if scan.has_changes() {
                        if let Err(e) = parts.store.save(&scan.config) {
                            warn!("Failed to persist scanned catalog: {}", e);
                        }
                    }
                    config = scan.config;
                }
                Err(e) => warn!(
                    "Could not scan video directory {}: {}",
                    catalog.video_dir().display(),
                    e
                ),
            }
        }

        let (supervisor, supervisor_events) = PlaybackSupervisor::new(parts.launcher, parts.policy);
        let bus = EventBus::new(parts.session_buffer);
        let (config_tx, config_rx) = watch::channel(Arc::new(config.clone()));
        let (status_tx, status_rx) = watch::channel(PlaybackState::default());
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);

        let mut controller = SyncController {
            store: parts.store,
            catalog: parts.catalog,
            supervisor,
            system: parts.system,
            ack_delay: parts.ack_delay,
            bus: bus.clone(),
            config: config_tx,
            status: status_tx,
        };

        controller.supervisor.retarget(playlist::resolve(&config)).await?;
        controller.publish_config(&config).await;
        controller.publish_status().await;

        let handle = SyncHandle {
            commands: commands_tx,
            config: config_rx,
            status: status_rx,
            bus,
        };
        let task = tokio::spawn(controller.run(commands_rx, supervisor_events));

        Ok((handle, task))
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<SupervisorEvent>,
    ) -> Result<()> {
        info!("Sync controller started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await?,
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
                Some(event) = events.recv() => {
                    debug!("Supervisor event: {:?}", event);
                    let result = self.supervisor.handle_event(event);
                    self.publish_status().await;
                    result?;
                }
            }
        }

        info!("Sync controller stopped");
        Ok(())
    }

    async fn handle_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Apply { config, reply } => {
                let result = self.apply_config(config).await;
                finish(reply, result)
            }
            Command::Update { update, reply } => {
                let merged = self.current().merged_with(update);
                let result = self.apply_config(merged).await;
                finish(reply, result)
            }
            Command::Rescan { reply } => {
                let result = self.rescan().await;
                finish(reply, result)
            }
            Command::TogglePreview { reply } => {
                let mut config = self.current();
                config.preview_enabled = !config.preview_enabled;
                let enabled = config.preview_enabled;
                let result = self.apply_config(config).await.map(|_| enabled);
                finish(reply, result)
            }
            Command::ToggleDarkMode { reply } => {
                let mut config = self.current();
                config.dark_mode = !config.dark_mode;
                let enabled = config.dark_mode;
                let result = self.apply_config(config).await.map(|_| enabled);
                finish(reply, result)
            }
            Command::RestartPlayer { reply } => {
                let result = self.supervisor.force_restart().await;
                self.publish_status().await;
                finish(reply, result)
            }
            Command::RestartSystem { reply } => {
                info!("System restart requested");
                let _ = reply.send(Ok(()));

                let system = self.system.clone();
                let delay = self.ack_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = system.restart_system().await {
                        error!("System restart failed: {:#}", e);
                    }
                });
                Ok(())
            }
            Command::RestartService { reply } => {
                info!("Service restart requested");
                let _ = reply.send(Ok(()));

                self.supervisor.stop().await;
                self.publish_status().await;

                let system = self.system.clone();
                let delay = self.ack_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = system.restart_service().await {
                        error!("Service restart failed: {:#}", e);
                    }
                });
                Ok(())
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
                Ok(())
            }
        }
    }

    /// Validate, persist, retarget, publish. Nothing changes if validation
    /// or persistence fails.
    async fn apply_config(&mut self, config: Configuration) -> Result<()> {
        let config = config.normalized();
        if let Err(e) = config.validate() {
            warn!("Rejected configuration: {}", e);
            return Err(e);
        }

        self.store.save(&config)?;

        let retarget = self.supervisor.retarget(playlist::resolve(&config)).await;

        self.config.send_replace(Arc::new(config.clone()));
        self.publish_config(&config).await;
        self.publish_status().await;
        info!("Applied configuration for '{}'", config.display_name);

        retarget
    }

    async fn rescan(&mut self) -> Result<bool> {
        let Some(catalog) = &self.catalog else {
            return Ok(false);
        };

        let scan = catalog.reconcile(&self.current())?;
        info!("Rescan: {}", scan.summary());
        if !scan.has_changes() {
            return Ok(false);
        }

        self.apply_config(scan.config).await?;
        Ok(true)
    }

    async fn shutdown(&mut self) {
        info!("Stopping playback for shutdown");
        self.supervisor.stop().await;
        self.publish_status().await;
    }

    fn current(&self) -> Configuration {
        self.config.borrow().as_ref().clone()
    }

    async fn publish_config(&self, config: &Configuration) {
        self.bus
            .publish(BusEvent::MetadataUpdate(MetadataPayload::from(config)))
            .await;
        self.bus
            .publish(BusEvent::PlaylistUpdate(PlaylistPayload::from(config)))
            .await;
    }

    /// Publish the supervisor state if it differs from the last published one.
    async fn publish_status(&self) {
        let state = self.supervisor.state();
        if *self.status.borrow() == state {
            return;
        }
        self.status.send_replace(state.clone());
        self.bus.publish(BusEvent::StatusUpdate(state)).await;
    }
}

/// Send `result` to the requester. Fatal errors also stop the controller.
fn finish<T>(reply: Reply<T>, result: Result<T>) -> Result<()> {
    match result {
        Err(Error::ResourceExhausted(reason)) => {
            let _ = reply.send(Err(Error::ResourceExhausted(reason.clone())));
            Err(Error::ResourceExhausted(reason))
        }
        result => {
            let _ = reply.send(result);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::VideoEntry;
    use crate::supervisor::fake::FakeLauncher;
    use crate::supervisor::{Phase, PlaybackStatus};
    use crate::system::fake::RecordingSystem;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        launcher: Arc<FakeLauncher>,
        system: Arc<RecordingSystem>,
        handle: SyncHandle,
        task: JoinHandle<Result<()>>,
    }

    impl Harness {
        fn video(&self, name: &str) -> PathBuf {
            self.dir.path().join("videos").join(name)
        }

        fn store(&self) -> ConfigStore {
            ConfigStore::new(self.dir.path().join("state").join("player_config.json"))
        }

        fn persisted(&self) -> Configuration {
            self.store().load().unwrap().unwrap()
        }
    }

    fn policy() -> RestartPolicy {
        RestartPolicy {
            max_attempts: 2,
            failure_window: Duration::from_secs(60),
            backoff_initial: Duration::from_millis(1),
            backoff_max: Duration::from_millis(5),
            grace_period: Duration::from_millis(50),
            startup_grace: Duration::from_secs(3600),
        }
    }

    type Started = (TempDir, Arc<RecordingSystem>, SyncHandle, JoinHandle<Result<()>>);

    async fn start_with(files: &[&str], launcher: Arc<dyn PlayerLauncher>) -> Result<Started> {
        let dir = TempDir::new().unwrap();
        let videos = dir.path().join("videos");
        std::fs::create_dir_all(&videos).unwrap();
        for name in files {
            std::fs::write(videos.join(name), b"").unwrap();
        }

        let system = Arc::new(RecordingSystem::default());
        let parts = ControllerParts {
            store: ConfigStore::new(dir.path().join("state").join("player_config.json")),
            catalog: Some(Catalog::new(&videos, &["mp4".to_string()])),
            launcher,
            policy: policy(),
            system: system.clone(),
            ack_delay: Duration::ZERO,
            session_buffer: 16,
        };

        let (handle, task) = SyncController::start(parts).await?;
        Ok((dir, system, handle, task))
    }

    async fn start(files: &[&str]) -> Harness {
        let launcher = FakeLauncher::new();
        let (dir, system, handle, task) = start_with(files, launcher.clone()).await.unwrap();
        Harness {
            dir,
            launcher,
            system,
            handle,
            task,
        }
    }

    async fn wait_until(what: &str, condition: impl Fn() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {}", what);
    }

    fn entry(path: &Path, enabled: bool, order: i64) -> VideoEntry {
        let mut entry = VideoEntry::discovered(path.to_path_buf(), order);
        entry.enabled = enabled;
        entry
    }

    fn lobby(h: &Harness) -> Configuration {
        Configuration {
            display_name: "Lobby".into(),
            videos: vec![
                entry(&h.video("a.mp4"), true, 0),
                entry(&h.video("b.mp4"), true, 1),
                entry(&h.video("c.mp4"), false, 2),
            ],
            ..Configuration::default()
        }
    }

    #[tokio::test]
    async fn test_start_scans_catalog_and_plays() {
        let h = start(&["b.mp4", "a.mp4"]).await;

        assert_eq!(h.launcher.launches(), 1);
        assert_eq!(
            h.launcher.last_playlist().unwrap().paths(),
            &[h.video("a.mp4"), h.video("b.mp4")]
        );
        assert_eq!(h.persisted().videos.len(), 2);

        let status = h.handle.status();
        assert_eq!(status.status, PlaybackStatus::Playing);
        assert_eq!(status.current_path, Some(h.video("a.mp4")));
    }

    #[tokio::test]
    async fn test_empty_catalog_stays_idle() {
        let h = start(&[]).await;
        assert_eq!(h.launcher.launches(), 0);
        assert_eq!(h.handle.status(), PlaybackState::default());
        assert!(h.handle.playlist().is_empty());
    }

    #[tokio::test]
    async fn test_lobby_toggle_triggers_exactly_one_retarget() {
        let h = start(&["a.mp4", "b.mp4", "c.mp4"]).await;
        assert_eq!(h.launcher.launches(), 1);

        let mut config = lobby(&h);
        h.handle.apply_config(config.clone()).await.unwrap();
        assert_eq!(h.handle.playlist().paths(), &[h.video("a.mp4"), h.video("b.mp4")]);
        assert_eq!(h.launcher.launches(), 2);

        config.videos[1].enabled = false;
        h.handle.apply_config(config.clone()).await.unwrap();
        assert_eq!(h.handle.playlist().paths(), &[h.video("a.mp4")]);
        assert_eq!(h.launcher.launches(), 3);
        assert_eq!(h.persisted(), config);

        config.display_name = "Lobby East".into();
        h.handle.apply_config(config).await.unwrap();
        assert_eq!(h.launcher.launches(), 3);
        assert_eq!(h.handle.config().display_name, "Lobby East");
    }

    #[tokio::test]
    async fn test_duplicate_paths_leave_state_untouched() {
        let h = start(&["a.mp4", "b.mp4", "c.mp4"]).await;
        h.handle.apply_config(lobby(&h)).await.unwrap();
        let launches = h.launcher.launches();
        let persisted = h.persisted();
        let mut events = h.handle.bus().connect().await;
        for _ in 0..3 {
            events.recv().await.unwrap();
        }

        let mut broken = lobby(&h);
        broken.videos.push(entry(&h.video("a.mp4"), true, 9));
        let result = h.handle.apply_config(broken).await;

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert_eq!(h.persisted(), persisted);
        assert_eq!(*h.handle.config(), persisted);
        assert_eq!(h.launcher.launches(), launches);
        assert!(tokio::time::timeout(Duration::from_millis(50), events.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_concurrent_applies_last_wins() {
        let h = start(&["a.mp4", "b.mp4", "c.mp4"]).await;

        let first = Configuration {
            display_name: "First".into(),
            videos: vec![entry(&h.video("a.mp4"), true, 0)],
            ..Configuration::default()
        };
        let second = Configuration {
            display_name: "Second".into(),
            videos: vec![entry(&h.video("b.mp4"), true, 0), entry(&h.video("c.mp4"), true, 1)],
            ..Configuration::default()
        };

        let (a, b) = tokio::join!(
            h.handle.apply_config(first.clone()),
            h.handle.apply_config(second.clone())
        );
        a.unwrap();
        b.unwrap();

        let persisted = h.persisted();
        assert!(persisted == first || persisted == second);
        assert_eq!(*h.handle.config(), persisted);
        assert_eq!(
            h.launcher.last_playlist().unwrap(),
            playlist::resolve(&persisted)
        );
    }

    #[tokio::test]
    async fn test_snapshot_matches_resolved_playlist() {
        let h = start(&["a.mp4", "b.mp4", "c.mp4"]).await;
        h.handle.apply_config(lobby(&h)).await.unwrap();

        let mut sub = h.handle.bus().connect().await;
        let mut playlist = None;
        let mut status = None;
        for _ in 0..3 {
            match sub.recv().await.unwrap().event {
                BusEvent::PlaylistUpdate(payload) => playlist = Some(payload),
                BusEvent::StatusUpdate(state) => status = Some(state),
                BusEvent::MetadataUpdate(meta) => assert_eq!(meta.display_name, "Lobby"),
            }
        }

        let paths: Vec<PathBuf> = playlist.unwrap().playlist.into_iter().map(|v| v.path).collect();
        assert_eq!(paths, playlist::resolve(&h.handle.config()).paths());
        assert_eq!(status.unwrap(), h.handle.status());
    }

    #[tokio::test]
    async fn test_crash_loop_parks_and_restart_player_resumes() {
        let h = start(&["a.mp4"]).await;

        for launches in 1..=3 {
            wait_until("relaunch", || h.launcher.launches() == launches).await;
            assert!(h.launcher.crash_latest(1));
        }

        let mut status = h.handle.watch_status();
        status
            .wait_for(|s| s.phase == Phase::Failed)
            .await
            .unwrap();
        assert_eq!(h.handle.status().status, PlaybackStatus::Error);
        assert_eq!(h.launcher.launches(), 3);

        h.handle.restart_player().await.unwrap();
        let state = h.handle.status();
        assert_eq!(h.launcher.launches(), 4);
        assert_eq!(state.status, PlaybackStatus::Playing);
        assert_eq!(state.restart_attempts, 0);
    }

    #[tokio::test]
    async fn test_toggles_persist_without_restarting_player() {
        let h = start(&["a.mp4"]).await;

        assert!(h.handle.toggle_preview().await.unwrap());
        assert!(!h.handle.toggle_dark_mode().await.unwrap());

        let persisted = h.persisted();
        assert!(persisted.preview_enabled);
        assert!(!persisted.dark_mode);
        assert_eq!(h.launcher.launches(), 1);
    }

    #[tokio::test]
    async fn test_update_config_merges_with_current() {
        let h = start(&["a.mp4", "b.mp4"]).await;
        let update: ConfigUpdate = serde_json::from_value(serde_json::json!({
            "display_name": "West Wing",
            "videos": [
                {"path": h.video("b.mp4"), "enabled": true, "order": "0"},
                {"path": h.video("a.mp4"), "enabled": true, "order": 1}
            ]
        }))
        .unwrap();

        h.handle.update_config(update).await.unwrap();

        let config = h.handle.config();
        assert_eq!(config.display_name, "West Wing");
        assert_eq!(config.video(&h.video("a.mp4")).unwrap().title, "A");
        assert_eq!(h.handle.playlist().paths(), &[h.video("b.mp4"), h.video("a.mp4")]);
    }

    #[tokio::test]
    async fn test_rescan_picks_up_new_files() {
        let h = start(&["a.mp4"]).await;
        assert!(!h.handle.rescan().await.unwrap());

        std::fs::write(h.video("new.mp4"), b"").unwrap();
        assert!(h.handle.rescan().await.unwrap());

        assert_eq!(h.handle.playlist().paths(), &[h.video("a.mp4"), h.video("new.mp4")]);
        assert_eq!(h.launcher.launches(), 2);
        assert_eq!(h.persisted().videos.len(), 2);
    }

    #[tokio::test]
    async fn test_restart_system_is_acknowledged_then_performed() {
        let h = start(&["a.mp4"]).await;
        h.handle.restart_system().await.unwrap();
        wait_until("reboot", || h.system.reboots() == 1).await;
        assert_eq!(h.launcher.terminations(), 0);
    }

    #[tokio::test]
    async fn test_restart_service_stops_player_first() {
        let h = start(&["a.mp4"]).await;
        h.handle.restart_service().await.unwrap();
        wait_until("service restart", || h.system.service_restarts() == 1).await;
        assert_eq!(h.launcher.terminations(), 1);
        assert_eq!(h.handle.status().phase, Phase::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_ends_controller() {
        let h = start(&["a.mp4"]).await;
        h.handle.shutdown().await.unwrap();
        h.task.await.unwrap().unwrap();

        assert_eq!(h.launcher.terminations(), 1);
        assert!(matches!(h.handle.restart_player().await, Err(Error::ControllerStopped)));
    }

    struct ExhaustedLauncher;

    impl PlayerLauncher for ExhaustedLauncher {
        fn launch(
            &self,
            _playlist: &Playlist,
        ) -> Result<Box<dyn crate::supervisor::PlayerProcess>> {
            Err(Error::ResourceExhausted("fork: Resource temporarily unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_resource_exhaustion_stops_controller() {
        let (dir, _system, handle, task) =
            start_with(&[], Arc::new(ExhaustedLauncher)).await.unwrap();
        let video = dir.path().join("videos").join("a.mp4");
        std::fs::write(&video, b"").unwrap();

        let config = Configuration {
            videos: vec![entry(&video, true, 0)],
            ..Configuration::default()
        };
        let result = handle.apply_config(config).await;
        assert!(matches!(result, Err(Error::ResourceExhausted(_))));

        let outcome = task.await.unwrap();
        assert!(matches!(outcome, Err(ref e) if e.is_fatal()));
    }

    #[tokio::test]
    async fn test_resource_exhaustion_at_start_is_an_error() {
        let result = start_with(&["a.mp4"], Arc::new(ExhaustedLauncher)).await;
        assert!(matches!(result, Err(Error::ResourceExhausted(_))));
    }
}
