use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub mod process;

#[cfg(test)]
pub(crate) mod fake;

pub use process::{ChildProcess, CommandLauncher, PlayerLauncher, PlayerProcess, ProcessExit};

use crate::config::{PlayerConfig, RestartConfig};
use crate::error::{Error, Result};
use crate::playlist::Playlist;

/// Crash recovery and termination timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Automatic relaunches allowed in a row before parking in `Failed`.
    pub max_attempts: u32,
    /// A process that dies sooner than this after launch counts as a rapid failure.
    pub failure_window: Duration,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    /// Time between SIGTERM and a forced kill.
    pub grace_period: Duration,
    /// Time a fresh process must stay up before it is reported as running.
    pub startup_grace: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            failure_window: Duration::from_secs(60),
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            grace_period: Duration::from_secs(3),
            startup_grace: Duration::from_secs(2),
        }
    }
}

impl RestartPolicy {
    pub fn from_config(player: &PlayerConfig, restart: &RestartConfig) -> Self {
        Self {
            max_attempts: restart.max_attempts,
            failure_window: Duration::from_secs(restart.failure_window_secs),
            backoff_initial: Duration::from_millis(restart.backoff_initial_ms),
            backoff_max: Duration::from_millis(restart.backoff_max_ms),
            grace_period: Duration::from_millis(player.grace_period_ms),
            startup_grace: Duration::from_millis(player.startup_grace_ms),
        }
    }

    /// Delay before relaunch number `attempt` (1-based): doubles each time, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.backoff_initial.saturating_mul(factor).min(self.backoff_max)
    }
}

/// Lifecycle of the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Stopped,
    Starting,
    Running,
    /// Exited unexpectedly, relaunch scheduled.
    Crashed,
    /// Too many rapid failures, waiting for an explicit restart or a new playlist.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Idle,
    Playing,
    /// Part of the status contract; the supported players never report it.
    Paused,
    Error,
}

/// Point-in-time view of playback, safe to hand to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub current_path: Option<PathBuf>,
    pub process_alive: bool,
    pub phase: Phase,
    pub restart_attempts: u32,
    pub last_error: Option<String>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Idle,
            current_path: None,
            process_alive: false,
            phase: Phase::Stopped,
            restart_attempts: 0,
            last_error: None,
        }
    }
}

/// Notifications from monitor and backoff tasks. Each carries the process
/// generation it concerns so late arrivals for replaced processes are ignored.
#[derive(Debug)]
pub enum SupervisorEvent {
    Confirmed { generation: u64 },
    Exited { generation: u64, exit: ProcessExit },
    RelaunchDue { generation: u64 },
}

struct ActiveProcess {
    generation: u64,
    pid: Option<u32>,
    launched_at: Instant,
    playing: Playlist,
    stop: oneshot::Sender<()>,
    monitor: JoinHandle<()>,
}

/// Owns the one external player process and keeps it aligned with a target playlist.
///
/// All methods take `&mut self`; the owner serializes them together with the
/// [`SupervisorEvent`]s drained from the receiver returned by [`PlaybackSupervisor::new`].
pub struct PlaybackSupervisor {
    launcher: Arc<dyn PlayerLauncher>,
    policy: RestartPolicy,
    events: mpsc::UnboundedSender<SupervisorEvent>,
    phase: Phase,
    target: Playlist,
    active: Option<ActiveProcess>,
    generation: u64,
    attempts: u32,
    last_error: Option<String>,
}

impl PlaybackSupervisor {
    pub fn new(
        launcher: Arc<dyn PlayerLauncher>,
        policy: RestartPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<SupervisorEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let supervisor = Self {
            launcher,
            policy,
            events,
            phase: Phase::Stopped,
            target: Playlist::default(),
            active: None,
            generation: 0,
            attempts: 0,
            last_error: None,
        };
        (supervisor, receiver)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> PlaybackState {
        let status = match self.phase {
            Phase::Stopped | Phase::Crashed => PlaybackStatus::Idle,
            Phase::Starting | Phase::Running => PlaybackStatus::Playing,
            Phase::Failed => PlaybackStatus::Error,
        };

        PlaybackState {
            status,
            current_path: self
                .active
                .as_ref()
                .and_then(|a| a.playing.first())
                .map(Path::to_path_buf),
            process_alive: self.active.is_some(),
            phase: self.phase,
            restart_attempts: self.attempts,
            last_error: self.last_error.clone(),
        }
    }

    /// Make the player loop over `playlist`. Unchanged targets are left alone.
    pub async fn retarget(&mut self, playlist: Playlist) -> Result<()> {
        if playlist == self.target && self.phase != Phase::Stopped {
            debug!("Playlist unchanged, keeping current playback");
            return Ok(());
        }

        if playlist.is_empty() {
            info!("Playlist is empty, playback idle");
            self.target = playlist;
            self.stop().await;
            return Ok(());
        }

        info!("Retargeting player to {} videos", playlist.len());
        self.target = playlist;
        self.attempts = 0;
        self.last_error = None;
        self.terminate().await;
        self.launch()
    }

    /// Unconditional stop and start of the current target.
    pub async fn force_restart(&mut self) -> Result<()> {
        info!("Player restart requested");
        self.attempts = 0;
        self.last_error = None;
        self.terminate().await;

        if self.target.is_empty() {
            self.phase = Phase::Stopped;
            return Ok(());
        }
        self.launch()
    }

    pub async fn stop(&mut self) {
        self.terminate().await;
        self.phase = Phase::Stopped;
        self.attempts = 0;
        self.last_error = None;
    }

    pub fn handle_event(&mut self, event: SupervisorEvent) -> Result<()> {
        match event {
            SupervisorEvent::Confirmed { generation } => {
                if self.is_current(generation) && self.phase == Phase::Starting {
                    info!("Player is running (generation {})", generation);
                    self.phase = Phase::Running;
                }
            }
            SupervisorEvent::Exited { generation, exit } => {
                if !self.is_current(generation) {
                    debug!("Ignoring exit of replaced player (generation {})", generation);
                    return Ok(());
                }
                let uptime = self
                    .active
                    .take()
                    .map(|a| a.launched_at.elapsed())
                    .unwrap_or_default();

                let crash = Error::PlaybackCrash(format!(
                    "{} after {:.1}s",
                    exit.detail,
                    uptime.as_secs_f64()
                ));
                warn!("{}", crash);

                if uptime >= self.policy.failure_window {
                    self.attempts = 0;
                }
                self.record_failure(crash.to_string());
            }
            SupervisorEvent::RelaunchDue { generation } => {
                if self.phase == Phase::Crashed && generation == self.generation {
                    self.launch()?;
                }
            }
        }
        Ok(())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .map(|a| a.generation == generation)
            .unwrap_or(false)
    }

    fn launch(&mut self) -> Result<()> {
        let playable = self.target.playable();
        if playable.is_empty() {
            warn!(
                "None of the {} playlist videos exist on disk, playback idle",
                self.target.len()
            );
            self.phase = Phase::Stopped;
            self.last_error = Some("no playable videos found".to_string());
            return Ok(());
        }

        self.generation += 1;
        let generation = self.generation;

        match self.launcher.launch(&playable) {
            Ok(process) => {
                let pid = process.id();
                let (stop, stop_rx) = oneshot::channel();
                let monitor = process::spawn_monitor(
                    process,
                    generation,
                    self.policy.grace_period,
                    self.policy.startup_grace,
                    self.events.clone(),
                    stop_rx,
                );
                self.active = Some(ActiveProcess {
                    generation,
                    pid,
                    launched_at: Instant::now(),
                    playing: playable,
                    stop,
                    monitor,
                });
                self.phase = Phase::Starting;
                Ok(())
            }
            Err(e) if e.is_fatal() => {
                error!("{}", e);
                self.phase = Phase::Failed;
                self.last_error = Some(e.to_string());
                Err(e)
            }
            Err(e) => {
                error!("{}", e);
                self.record_failure(e.to_string());
                Ok(())
            }
        }
    }

    fn record_failure(&mut self, reason: String) {
        self.last_error = Some(reason);

        if self.attempts >= self.policy.max_attempts {
            error!(
                "Player failed {} times in a row, not restarting until asked to",
                self.attempts + 1
            );
            self.phase = Phase::Failed;
            return;
        }

        self.attempts += 1;
        self.phase = Phase::Crashed;

        let delay = self.policy.backoff(self.attempts);
        warn!(
            "Relaunching player in {}ms (attempt {}/{})",
            delay.as_millis(),
            self.attempts,
            self.policy.max_attempts
        );

        let generation = self.generation;
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SupervisorEvent::RelaunchDue { generation });
        });
    }

    async fn terminate(&mut self) {
        if let Some(active) = self.active.take() {
            info!("Stopping player (pid {:?})", active.pid);
            let _ = active.stop.send(());
            if let Err(e) = active.monitor.await {
                warn!("Player monitor task failed: {}", e);
            }
        }
    }
}
