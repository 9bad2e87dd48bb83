use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

/// OS-level actions outside the playback engine.
#[async_trait]
pub trait SystemControl: Send + Sync {
    /// Reboot the display unit.
    async fn restart_system(&self) -> Result<()>;

    /// End this service so the service manager starts a fresh instance.
    async fn restart_service(&self) -> Result<()>;
}

pub struct ShellSystemControl {
    reboot_command: Vec<String>,
}

impl ShellSystemControl {
    pub fn new(reboot_command: Vec<String>) -> Self {
        Self { reboot_command }
    }
}

#[async_trait]
impl SystemControl for ShellSystemControl {
    async fn restart_system(&self) -> Result<()> {
        let Some((program, args)) = self.reboot_command.split_first() else {
            bail!("No reboot command configured");
        };

        warn!("Rebooting display unit: {}", self.reboot_command.join(" "));
        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .with_context(|| format!("Failed to run reboot command: {}", program))?;

        if !status.success() {
            bail!("Reboot command exited with {}", status);
        }
        Ok(())
    }

    async fn restart_service(&self) -> Result<()> {
        info!("Exiting so the service manager restarts the display service");
        std::process::exit(0)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts requests instead of acting on them.
    #[derive(Default)]
    pub(crate) struct RecordingSystem {
        pub reboots: AtomicUsize,
        pub service_restarts: AtomicUsize,
    }

    impl RecordingSystem {
        pub fn reboots(&self) -> usize {
            self.reboots.load(Ordering::SeqCst)
        }

        pub fn service_restarts(&self) -> usize {
            self.service_restarts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SystemControl for RecordingSystem {
        async fn restart_system(&self) -> Result<()> {
            self.reboots.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn restart_service(&self) -> Result<()> {
            self.service_restarts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
