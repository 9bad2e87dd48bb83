use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Configuration, VideoEntry};
use crate::error::Result;

/// Descriptive data about a video file, supplied by an external extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Minutes, rounded up.
    pub duration: Option<u32>,
}

/// Read-only metadata lookup keyed by file path.
pub trait MetadataSource: Send + Sync {
    fn lookup(&self, path: &Path) -> Option<VideoMetadata>;
}

/// Knows nothing beyond the file name; titles are derived from it.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilenameMetadata;

impl MetadataSource for FilenameMetadata {
    fn lookup(&self, _path: &Path) -> Option<VideoMetadata> {
        None
    }
}

/// Outcome of reconciling a configuration against the video directory.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub config: Configuration,
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub kept: usize,
}

impl ScanResult {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} videos: {} new, {} removed, {} unchanged",
            self.config.videos.len(),
            self.added.len(),
            self.removed.len(),
            self.kept
        )
    }
}

/// The set of playable files in the display's video directory.
#[derive(Clone)]
pub struct Catalog {
    video_dir: PathBuf,
    extensions: HashSet<String>,
    metadata: Arc<dyn MetadataSource>,
}

impl Catalog {
    pub fn new<P: Into<PathBuf>>(video_dir: P, extensions: &[String]) -> Self {
        Self {
            video_dir: video_dir.into(),
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            metadata: Arc::new(FilenameMetadata),
        }
    }

    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataSource>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn video_dir(&self) -> &Path {
        &self.video_dir
    }

    pub fn is_video_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    /// List video files directly inside the video directory, sorted by file name.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in std::fs::read_dir(&self.video_dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", self.video_dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if path.is_file() && self.is_video_file(&path) {
                files.push(path);
            } else {
                debug!("Ignoring non-video entry: {}", path.display());
            }
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Bring `config` in line with the files currently on disk.
    ///
    /// Entries for present files are kept untouched and in place, new files
    /// are appended after the highest existing order and entries for
    /// vanished files are dropped.
    pub fn reconcile(&self, config: &Configuration) -> Result<ScanResult> {
        let files = self.scan()?;
        let on_disk: HashSet<&Path> = files.iter().map(|p| p.as_path()).collect();
        let known: HashSet<&Path> = config.videos.iter().map(|v| v.path.as_path()).collect();

        let (mut videos, gone): (Vec<VideoEntry>, Vec<VideoEntry>) = config
            .videos
            .iter()
            .cloned()
            .partition(|v| on_disk.contains(v.path.as_path()));
        let kept = videos.len();

        let removed: Vec<PathBuf> = gone.into_iter().map(|v| v.path).collect();
        for path in &removed {
            info!("Video no longer on disk, removing from catalog: {}", path.display());
        }

        let mut next_order = videos
            .iter()
            .map(|v| v.order)
            .max()
            .map(|max| max.saturating_add(1))
            .unwrap_or(0);

        let mut added = Vec::new();
        for file in files.iter().filter(|f| !known.contains(f.as_path())) {
            info!("Adding new video: {}", file.display());
            videos.push(self.describe(file.clone(), next_order));
            added.push(file.clone());
            // Ties at i64::MAX still sort after existing entries; resolve is a stable sort.
            next_order = next_order.saturating_add(1);
        }

        Ok(ScanResult {
            config: Configuration {
                videos,
                ..config.clone()
            },
            added,
            removed,
            kept,
        })
    }

    fn describe(&self, path: PathBuf, order: i64) -> VideoEntry {
        let metadata = self.metadata.lookup(&path).unwrap_or_default();
        let mut entry = VideoEntry::discovered(path, order);

        if let Some(title) = metadata.title.filter(|t| !t.trim().is_empty()) {
            entry.title = title;
        }
        entry.description = metadata.description.filter(|d| !d.is_empty());
        entry.duration = metadata.duration.unwrap_or(0);
        entry
    }
}
