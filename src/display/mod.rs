use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub mod catalog;
pub mod store;

pub use catalog::{Catalog, FilenameMetadata, MetadataSource, VideoMetadata};
pub use store::ConfigStore;

pub const DEFAULT_DISPLAY_NAME: &str = "Main Gallery Display";

fn default_true() -> bool {
    true
}

/// A single video in the display catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoEntry {
    /// Filesystem location, unique within a configuration.
    pub path: PathBuf,
    /// Stable display key (the file name at scan time).
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Minutes, `0` when unknown.
    #[serde(default)]
    pub duration: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Relative sequence position. Gaps and duplicates are allowed.
    #[serde(default, deserialize_with = "lenient_order")]
    pub order: i64,
}

impl VideoEntry {
    /// Build an enabled entry for a freshly discovered file.
    pub fn discovered(path: PathBuf, order: i64) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let title = title_from_path(&path);

        Self {
            path,
            name,
            title,
            description: None,
            duration: 0,
            enabled: true,
            order,
        }
    }
}

/// Persisted state of one display unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub display_name: String,
    #[serde(default)]
    pub videos: Vec<VideoEntry>,
    #[serde(default)]
    pub preview_enabled: bool,
    #[serde(default = "default_true")]
    pub dark_mode: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            videos: Vec::new(),
            preview_enabled: false,
            dark_mode: true,
        }
    }
}

impl Configuration {
    /// Replace a blank display name with the default one.
    pub fn normalized(mut self) -> Self {
        if self.display_name.trim().is_empty() {
            self.display_name = DEFAULT_DISPLAY_NAME.to_string();
        }
        self
    }

    /// Check the invariants a configuration must hold before it is persisted.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.videos.len());

        for (index, video) in self.videos.iter().enumerate() {
            if video.path.as_os_str().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "video {} has an empty path",
                    index
                )));
            }
            if !seen.insert(video.path.as_path()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate video path: {}",
                    video.path.display()
                )));
            }
        }

        Ok(())
    }

    pub fn video(&self, path: &Path) -> Option<&VideoEntry> {
        self.videos.iter().find(|v| v.path == path)
    }

    /// Merge an admin update into a copy of this configuration.
    ///
    /// A present `videos` list replaces the catalog membership and the
    /// `enabled`/`order` fields, while descriptive fields of paths already
    /// known here are kept.
    pub fn merged_with(&self, update: ConfigUpdate) -> Configuration {
        let mut merged = self.clone();

        if let Some(display_name) = update.display_name {
            merged.display_name = display_name;
        }

        if let Some(selections) = update.videos {
            let existing: HashMap<&Path, &VideoEntry> = self
                .videos
                .iter()
                .map(|v| (v.path.as_path(), v))
                .collect();

            merged.videos = selections
                .into_iter()
                .map(|selection| match existing.get(selection.path.as_path()) {
                    Some(known) => VideoEntry {
                        enabled: selection.enabled,
                        order: selection.order,
                        ..(*known).clone()
                    },
                    None => {
                        let mut entry = VideoEntry::discovered(selection.path, selection.order);
                        if let Some(name) = selection.name {
                            entry.name = name;
                        }
                        entry.enabled = selection.enabled;
                        entry
                    }
                })
                .collect();
        }

        merged
    }
}

/// Body of an admin `update_config` request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub videos: Option<Vec<VideoSelection>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoSelection {
    pub path: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "lenient_order")]
    pub order: i64,
}

/// Browsers post form values as strings, so accept `"3"` as well as `3`.
fn lenient_order<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Order {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Order::deserialize(deserializer)? {
        Order::Int(n) => Ok(n),
        Order::Float(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(f as i64)
        }
        Order::Float(f) => Err(serde::de::Error::custom(format!(
            "invalid order value: {}",
            f
        ))),
        Order::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid order value: {:?}", s))),
    }
}

/// `the_old_harbor-1920.mp4` becomes `The Old Harbor 1920`.
pub fn title_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    stem.replace(['_', '-'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
