use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use super::Configuration;
use crate::error::{Error, Result};

/// Durable storage for a display's [`Configuration`].
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the target, so readers only ever see a complete document.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted configuration.
    ///
    /// A missing file yields `Ok(None)`; a file that cannot be parsed yields
    /// [`Error::CorruptConfig`].
    pub fn load(&self) -> Result<Option<Configuration>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::CorruptConfig {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    /// Load the configuration, falling back to defaults on first boot or
    /// when the file is unreadable. Never fails.
    pub fn load_or_default(&self) -> Configuration {
        match self.load() {
            Ok(Some(config)) => {
                info!("Loaded display configuration from {}", self.path.display());
                config
            }
            Ok(None) => {
                info!("No display configuration at {}, using defaults", self.path.display());
                self.persist_default()
            }
            Err(e @ Error::CorruptConfig { .. }) => {
                error!("{}; falling back to defaults", e);
                self.quarantine();
                self.persist_default()
            }
            Err(e) => {
                error!("Failed to read display configuration: {}; using defaults", e);
                Configuration::default()
            }
        }
    }

    /// Atomically replace the persisted configuration.
    pub fn save(&self, config: &Configuration) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let content = serde_json::to_string_pretty(config)?;

        let mut temp = NamedTempFile::new_in(&parent)?;
        temp.write_all(content.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        info!("Display configuration saved to {}", self.path.display());
        Ok(())
    }

    fn persist_default(&self) -> Configuration {
        let config = Configuration::default();
        if let Err(e) = self.save(&config) {
            warn!("Could not write default display configuration: {}", e);
        }
        config
    }

    /// Keep an unreadable file around for inspection instead of overwriting it.
    fn quarantine(&self) {
        let mut target = self.path.clone().into_os_string();
        target.push(".corrupt");
        let target = PathBuf::from(target);

        match std::fs::rename(&self.path, &target) {
            Ok(()) => warn!("Moved unreadable configuration to {}", target.display()),
            Err(e) => warn!("Could not move unreadable configuration aside: {}", e),
        }
    }
}
