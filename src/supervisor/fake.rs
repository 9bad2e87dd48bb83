//! In-process stand-ins for the external player, used by unit tests.

use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

use super::process::{PlayerLauncher, PlayerProcess, ProcessExit};
use crate::error::{Error, Result};
use crate::playlist::Playlist;

#[derive(Default)]
pub(crate) struct FakeLauncher {
    launches: AtomicUsize,
    terminations: Arc<AtomicUsize>,
    failing: AtomicBool,
    next_pid: AtomicU32,
    playlists: Mutex<Vec<Playlist>>,
    exits: Mutex<Vec<oneshot::Sender<ProcessExit>>>,
}

impl FakeLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn last_playlist(&self) -> Option<Playlist> {
        self.playlists.lock().unwrap().last().cloned()
    }

    /// Make the most recently launched process exit with `code`.
    pub fn crash_latest(&self, code: i32) -> bool {
        match self.exits.lock().unwrap().pop() {
            Some(tx) => tx
                .send(ProcessExit {
                    code: Some(code),
                    detail: format!("exit status: {}", code),
                })
                .is_ok(),
            None => false,
        }
    }
}

impl PlayerLauncher for FakeLauncher {
    fn launch(&self, playlist: &Playlist) -> Result<Box<dyn PlayerProcess>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::PlaybackLaunch("fake player refused to start".into()));
        }

        self.playlists.lock().unwrap().push(playlist.clone());
        let (tx, rx) = oneshot::channel();
        self.exits.lock().unwrap().push(tx);
        self.launches.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(FakeProcess {
            pid: 1000 + self.next_pid.fetch_add(1, Ordering::SeqCst),
            exit: rx,
            terminations: self.terminations.clone(),
        }))
    }
}

struct FakeProcess {
    pid: u32,
    exit: oneshot::Receiver<ProcessExit>,
    terminations: Arc<AtomicUsize>,
}

#[async_trait]
impl PlayerProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn wait(&mut self) -> io::Result<ProcessExit> {
        match (&mut self.exit).await {
            Ok(exit) => Ok(exit),
            Err(_) => std::future::pending().await,
        }
    }

    async fn terminate(&mut self, _grace: Duration) -> io::Result<()> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
