use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::display::{Configuration, VideoEntry};

/// Ordered list of video paths the player should loop over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Playlist(Vec<PathBuf>);

impl Playlist {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self(paths)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.0
    }

    pub fn first(&self) -> Option<&Path> {
        self.0.first().map(|p| p.as_path())
    }

    /// The subset of this playlist whose files still exist on disk.
    pub fn playable(&self) -> Playlist {
        let mut playable = Vec::with_capacity(self.0.len());
        for path in &self.0 {
            if path.is_file() {
                playable.push(path.clone());
            } else {
                warn!("Skipping missing video: {}", path.display());
            }
        }
        Playlist(playable)
    }
}

/// Enabled entries in playback order: stable sort by `order`, so equal
/// orders keep their catalog position. Repeated paths keep the first hit.
pub fn resolve_entries(config: &Configuration) -> Vec<&VideoEntry> {
    let mut seen = HashSet::new();
    let mut enabled: Vec<&VideoEntry> = config
        .videos
        .iter()
        .filter(|v| v.enabled)
        .filter(|v| seen.insert(v.path.as_path()))
        .collect();

    enabled.sort_by_key(|v| v.order);
    enabled
}

pub fn resolve(config: &Configuration) -> Playlist {
    Playlist(
        resolve_entries(config)
            .into_iter()
            .map(|v| v.path.clone())
            .collect(),
    )
}
