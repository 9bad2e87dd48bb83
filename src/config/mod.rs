use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod validation;

use validation::ConfigValidator;

/// File name of the display configuration inside the storage directory.
pub const DISPLAY_CONFIG_FILE: &str = "player_config.json";

/// Command line interface
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "Museum display playback service", long_about = None)]
pub struct Cli {
    /// Service configuration file (created with defaults when missing)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory containing the display's video files
    #[arg(long, env = "VITRINE_VIDEO_DIR")]
    pub video_dir: Option<PathBuf>,

    /// Directory holding the persisted display configuration
    #[arg(long, env = "VITRINE_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Port for the admin interface
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Main application configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub media: MediaConfig,
    pub storage: StorageConfig,
    pub player: PlayerConfig,
    #[serde(default)]
    pub restart: RestartConfig,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

/// Admin interface listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub interface: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConfig {
    pub video_dir: PathBuf,
    pub supported_extensions: Vec<String>,
    pub watch_for_changes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub config_dir: PathBuf,
}

/// External media player invocation. Playlist paths are appended to `args`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub program: String,
    pub args: Vec<String>,
    pub grace_period_ms: u64,
    pub startup_grace_ms: u64,
}

/// Crash-loop protection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestartConfig {
    pub max_attempts: u32,
    pub failure_window_secs: u64,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            failure_window_secs: 60,
            backoff_initial_ms: 1000,
            backoff_max_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Command and arguments used to reboot the display unit.
    pub reboot_command: Vec<String>,
    /// Delay between acknowledging a restart request and acting on it.
    pub ack_delay_ms: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            reboot_command: vec!["sudo".into(), "reboot".into()],
            ack_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Events queued per observer before it is considered stalled and dropped.
    pub session_buffer: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { session_buffer: 64 }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                interface: "0.0.0.0".to_string(),
                port: 5000,
            },
            media: MediaConfig {
                video_dir: Self::default_video_dir(),
                supported_extensions: vec!["mp4".into(), "avi".into(), "mkv".into()],
                watch_for_changes: true,
            },
            storage: StorageConfig {
                config_dir: Self::default_config_dir(),
            },
            player: PlayerConfig {
                program: "cvlc".to_string(),
                args: vec![
                    "--loop".into(),
                    "--fullscreen".into(),
                    "--no-video-title-show".into(),
                    "--no-osd".into(),
                ],
                grace_period_ms: 3000,
                startup_grace_ms: 2000,
            },
            restart: RestartConfig::default(),
            system: SystemConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Build the effective configuration: the config file (created when
    /// missing) with command line overrides applied on top.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(Self::default_config_file_path);

        let mut config = Self::load_or_create(&config_path)?;

        if let Some(video_dir) = &cli.video_dir {
            config.media.video_dir = video_dir.clone();
        }
        if let Some(config_dir) = &cli.config_dir {
            config.storage.config_dir = config_dir.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        ConfigValidator::validate(&config)
            .context("Invalid configuration after applying command line overrides")?;
        Ok(config)
    }

    /// Load configuration from file or create with defaults
    pub fn load_or_create<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        if config_path.exists() {
            Self::load_from_file(config_path)
        } else {
            let default_config = Self::default();
            default_config.save_to_file(config_path).with_context(|| {
                format!(
                    "Failed to create default configuration file at: {}",
                    config_path.display()
                )
            })?;

            tracing::info!("Created default configuration file at: {}", config_path.display());
            Ok(default_config)
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, config_path: P) -> Result<()> {
        let config_path = config_path.as_ref();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let body =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
        let content = format!(
            "# Vitrine display service configuration\n\
             # The player is started as: <program> <args...> <video paths...>\n\n{}",
            body
        );

        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Location of the persisted display configuration.
    pub fn display_config_path(&self) -> PathBuf {
        self.storage.config_dir.join(DISPLAY_CONFIG_FILE)
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vitrine")
    }

    pub fn default_config_file_path() -> PathBuf {
        Self::default_config_dir().join("vitrine.toml")
    }

    pub fn default_video_dir() -> PathBuf {
        dirs::video_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("videos")))
            .unwrap_or_else(|| PathBuf::from("videos"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_creation() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.media.supported_extensions, vec!["mp4", "avi", "mkv"]);
        assert_eq!(config.restart.max_attempts, 5);
        assert!(config.display_config_path().ends_with(DISPLAY_CONFIG_FILE));
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_config_file_operations() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("nested").join("vitrine.toml");

        let created = AppConfig::load_or_create(&config_path)?;
        assert!(config_path.exists());

        let loaded = AppConfig::load_from_file(&config_path)?;
        assert_eq!(created, loaded);
        Ok(())
    }

    #[test]
    fn test_missing_optional_sections_use_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("vitrine.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
interface = "127.0.0.1"
port = 8081

[media]
video_dir = "/srv/videos"
supported_extensions = ["mp4"]
watch_for_changes = false

[storage]
config_dir = "/var/lib/vitrine"

[player]
program = "mpv"
args = ["--loop-playlist=inf", "--fs"]
grace_period_ms = 500
startup_grace_ms = 1000
"#,
        )?;

        let config = AppConfig::load_from_file(&config_path)?;
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.player.program, "mpv");
        assert_eq!(config.restart, RestartConfig::default());
        assert_eq!(config.events.session_buffer, 64);
        assert_eq!(
            config.display_config_path(),
            PathBuf::from("/var/lib/vitrine/player_config.json")
        );
        Ok(())
    }

    #[test]
    fn test_invalid_file_is_rejected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("vitrine.toml");

        let mut config = AppConfig::default();
        config.player.program = String::new();
        let body = toml::to_string_pretty(&config)?;
        std::fs::write(&config_path, body)?;

        assert!(AppConfig::load_from_file(&config_path).is_err());

        std::fs::write(&config_path, "not = [valid")?;
        assert!(AppConfig::load_from_file(&config_path).is_err());
        Ok(())
    }

    #[test]
    fn test_cli_overrides_file_values() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let cli = Cli {
            config: Some(temp_dir.path().join("vitrine.toml")),
            video_dir: Some(temp_dir.path().join("videos")),
            config_dir: Some(temp_dir.path().join("state")),
            port: Some(6000),
            ..Cli::default()
        };

        let config = AppConfig::from_cli(&cli)?;
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.media.video_dir, temp_dir.path().join("videos"));
        assert_eq!(
            config.display_config_path(),
            temp_dir.path().join("state").join(DISPLAY_CONFIG_FILE)
        );

        // Overrides are not written back to the file.
        let on_disk = AppConfig::load_from_file(temp_dir.path().join("vitrine.toml"))?;
        assert_eq!(on_disk.server.port, 5000);
        Ok(())
    }

    #[test]
    fn test_cli_parsing() {
        let args = ["vitrine", "--port", "7000", "--debug", "--video-dir", "/srv/v"];
        let cli = Cli::parse_from(args);
        assert_eq!(cli.port, Some(7000));
        assert!(cli.debug);
        assert_eq!(cli.video_dir, Some(PathBuf::from("/srv/v")));
        assert!(cli.config.is_none());
    }
}
