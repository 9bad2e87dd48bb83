use anyhow::{anyhow, Context, Result};
use std::net::IpAddr;

use super::AppConfig;

/// Configuration validator for ensuring configuration integrity
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the entire application configuration
    pub fn validate(config: &AppConfig) -> Result<()> {
        Self::validate_server_config(config)?;
        Self::validate_media_config(config)?;
        Self::validate_storage_config(config)?;
        Self::validate_player_config(config)?;
        Self::validate_restart_config(config)?;
        Self::validate_system_config(config)?;
        Self::validate_events_config(config)?;
        Ok(())
    }

    fn validate_server_config(config: &AppConfig) -> Result<()> {
        if config.server.port == 0 {
            return Err(anyhow!("Server port cannot be 0"));
        }

        config
            .server
            .interface
            .parse::<IpAddr>()
            .with_context(|| {
                format!("Invalid server interface address: {}", config.server.interface)
            })?;

        Ok(())
    }

    fn validate_media_config(config: &AppConfig) -> Result<()> {
        if config.media.video_dir.as_os_str().is_empty() {
            return Err(anyhow!("Video directory cannot be empty"));
        }

        if config.media.supported_extensions.is_empty() {
            return Err(anyhow!("At least one supported file extension must be configured"));
        }

        let mut extensions: Vec<String> = config
            .media
            .supported_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        if extensions.iter().any(|ext| ext.is_empty()) {
            return Err(anyhow!("Supported extensions cannot be empty strings"));
        }
        extensions.sort();
        extensions.dedup();
        if extensions.len() != config.media.supported_extensions.len() {
            return Err(anyhow!("Duplicate file extensions found in supported_extensions"));
        }

        Ok(())
    }

    fn validate_storage_config(config: &AppConfig) -> Result<()> {
        if config.storage.config_dir.as_os_str().is_empty() {
            return Err(anyhow!("Storage config_dir cannot be empty"));
        }
        Ok(())
    }

    fn validate_player_config(config: &AppConfig) -> Result<()> {
        if config.player.program.trim().is_empty() {
            return Err(anyhow!("Player program cannot be empty"));
        }
        if config.player.grace_period_ms == 0 {
            return Err(anyhow!("Player grace_period_ms must be greater than 0"));
        }
        Ok(())
    }

    fn validate_restart_config(config: &AppConfig) -> Result<()> {
        let restart = &config.restart;

        if restart.backoff_initial_ms == 0 {
            return Err(anyhow!("Restart backoff_initial_ms must be greater than 0"));
        }
        if restart.backoff_initial_ms > restart.backoff_max_ms {
            return Err(anyhow!(
                "Restart backoff_initial_ms ({}) exceeds backoff_max_ms ({})",
                restart.backoff_initial_ms,
                restart.backoff_max_ms
            ));
        }
        Ok(())
    }

    fn validate_system_config(config: &AppConfig) -> Result<()> {
        match config.system.reboot_command.first() {
            Some(program) if !program.trim().is_empty() => Ok(()),
            _ => Err(anyhow!("System reboot_command must name a program")),
        }
    }

    fn validate_events_config(config: &AppConfig) -> Result<()> {
        if config.events.session_buffer == 0 {
            return Err(anyhow!("Event session_buffer must be greater than 0"));
        }
        Ok(())
    }
}
