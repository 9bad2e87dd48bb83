use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::SupervisorEvent;
use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::playlist::Playlist;

/// How a playback process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
    pub detail: String,
}

impl From<std::process::ExitStatus> for ProcessExit {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
            detail: status.to_string(),
        }
    }
}

/// A running external player.
#[async_trait]
pub trait PlayerProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Wait for the process to exit. Must be cancel-safe.
    async fn wait(&mut self) -> io::Result<ProcessExit>;

    /// Ask the process to exit, escalating to a forced kill after `grace`.
    async fn terminate(&mut self, grace: Duration) -> io::Result<()>;
}

/// Starts external players looping over a playlist.
pub trait PlayerLauncher: Send + Sync {
    fn launch(&self, playlist: &Playlist) -> Result<Box<dyn PlayerProcess>>;
}

/// Launches the configured player binary with the playlist paths appended
/// to its arguments.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
}

impl CommandLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }
}

impl PlayerLauncher for CommandLauncher {
    fn launch(&self, playlist: &Playlist) -> Result<Box<dyn PlayerProcess>> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.args(playlist.paths());
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| launch_error(&self.program, e))?;
        info!(
            "Started {} (pid {:?}) with {} videos",
            self.program,
            child.id(),
            playlist.len()
        );
        Ok(Box::new(ChildProcess { child }))
    }
}

/// Running out of processes or memory is not something a retry fixes.
fn launch_error(program: &str, e: io::Error) -> Error {
    #[cfg(unix)]
    {
        if matches!(e.raw_os_error(), Some(libc::EAGAIN) | Some(libc::ENOMEM)) {
            return Error::ResourceExhausted(format!("cannot spawn {}: {}", program, e));
        }
    }
    Error::PlaybackLaunch(format!("{}: {}", program, e))
}

pub struct ChildProcess {
    child: Child,
}

#[async_trait]
impl PlayerProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> io::Result<ProcessExit> {
        self.child.wait().await.map(ProcessExit::from)
    }

    async fn terminate(&mut self, grace: Duration) -> io::Result<()> {
        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                // SAFETY: pid belongs to a child we have not reaped yet.
                unsafe {
                    libc::kill(pid as libc::pid_t, libc::SIGTERM);
                }
                match tokio::time::timeout(grace, self.child.wait()).await {
                    Ok(status) => {
                        debug!("Player pid {} exited after SIGTERM: {:?}", pid, status);
                        return Ok(());
                    }
                    Err(_) => warn!(
                        "Player pid {} ignored SIGTERM for {}ms, killing",
                        pid,
                        grace.as_millis()
                    ),
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = grace;
        }

        self.child.kill().await
    }
}

/// Watches one process generation.
///
/// Reports `Confirmed` once the process has stayed up for `startup_grace`
/// and `Exited` if it dies on its own. Dropping or firing `stop` terminates
/// the process without reporting an exit.
pub(crate) fn spawn_monitor(
    mut process: Box<dyn PlayerProcess>,
    generation: u64,
    grace: Duration,
    startup_grace: Duration,
    events: mpsc::UnboundedSender<SupervisorEvent>,
    mut stop: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let confirm = tokio::time::sleep(startup_grace);
        tokio::pin!(confirm);
        let mut confirmed = false;

        loop {
            tokio::select! {
                result = process.wait() => {
                    let exit = result.unwrap_or_else(|e| ProcessExit {
                        code: None,
                        detail: format!("wait failed: {}", e),
                    });
                    let _ = events.send(SupervisorEvent::Exited { generation, exit });
                    return;
                }
                _ = &mut confirm, if !confirmed => {
                    confirmed = true;
                    let _ = events.send(SupervisorEvent::Confirmed { generation });
                }
                _ = &mut stop => {
                    if let Err(e) = process.terminate(grace).await {
                        warn!("Failed to terminate player (generation {}): {}", generation, e);
                    }
                    return;
                }
            }
        }
    })
}
