use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_full::{
    new_debouncer, DebounceEventResult, DebouncedEvent, Debouncer, FileIdMap,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::controller::SyncHandle;
use crate::display::Catalog;
use crate::error::{Error, Result};

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Watches the video directory and asks the controller to rescan when
/// video files appear, disappear or are renamed.
pub struct VideoDirWatcher {
    debouncer: Debouncer<RecommendedWatcher, FileIdMap>,
    video_dir: PathBuf,
    task: JoinHandle<()>,
}

impl VideoDirWatcher {
    pub fn start(catalog: &Catalog, sync: SyncHandle) -> Result<Self> {
        Self::start_with_debounce(catalog, sync, DEFAULT_DEBOUNCE)
    }

    pub fn start_with_debounce(
        catalog: &Catalog,
        sync: SyncHandle,
        debounce: Duration,
    ) -> Result<Self> {
        let video_dir = catalog.video_dir().to_path_buf();
        let (trigger, triggers) = mpsc::unbounded_channel();

        let filter = catalog.clone();
        let handler = move |result: DebounceEventResult| match result {
            Ok(events) => {
                let relevant = events.iter().filter(|e| is_relevant(&filter, e)).count();
                if relevant > 0 {
                    debug!("{} relevant change(s) in video directory", relevant);
                    let _ = trigger.send(());
                }
            }
            Err(errors) => {
                for error in errors {
                    error!("File watcher error: {:?}", error);
                }
            }
        };
        let mut debouncer = new_debouncer(debounce, None, handler)?;

        debouncer
            .watcher()
            .watch(&video_dir, RecursiveMode::NonRecursive)?;
        info!("Watching video directory: {}", video_dir.display());

        let task = tokio::spawn(rescan_on_change(triggers, sync));

        Ok(Self {
            debouncer,
            video_dir,
            task,
        })
    }

    pub fn video_dir(&self) -> &Path {
        &self.video_dir
    }

    pub fn stop(mut self) {
        if let Err(e) = self.debouncer.watcher().unwatch(&self.video_dir) {
            warn!("Failed to unwatch {}: {}", self.video_dir.display(), e);
        }
        self.task.abort();
        info!("Stopped watching video directory: {}", self.video_dir.display());
    }
}

async fn rescan_on_change(mut triggers: mpsc::UnboundedReceiver<()>, sync: SyncHandle) {
    while triggers.recv().await.is_some() {
        // Collapse a burst of notifications into one rescan.
        while triggers.try_recv().is_ok() {}

        match sync.rescan().await {
            Ok(true) => info!("Video directory changed, catalog updated"),
            Ok(false) => debug!("Video directory event without catalog changes"),
            Err(Error::ControllerStopped) => break,
            Err(e) => warn!("Rescan after directory change failed: {}", e),
        }
    }
}

/// A removed path can no longer be inspected, so only its extension counts.
fn is_relevant(catalog: &Catalog, event: &DebouncedEvent) -> bool {
    match event.event.kind {
        EventKind::Access(_) => false,
        EventKind::Remove(_) => event.event.paths.iter().any(|p| catalog.is_video_file(p)),
        _ => event
            .event
            .paths
            .iter()
            .any(|p| catalog.is_video_file(p) && !p.is_dir()),
    }
}
