use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::display::{Configuration, VideoEntry};
use crate::error::Error;
use crate::playlist;
use crate::supervisor::PlaybackState;

/// Number of events in a connect snapshot.
const SNAPSHOT_LEN: usize = 3;

/// Display settings plus the full catalog, disabled entries included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataPayload {
    pub display_name: String,
    pub preview_enabled: bool,
    pub dark_mode: bool,
    pub videos: Vec<VideoEntry>,
}

impl From<&Configuration> for MetadataPayload {
    fn from(config: &Configuration) -> Self {
        Self {
            display_name: config.display_name.clone(),
            preview_enabled: config.preview_enabled,
            dark_mode: config.dark_mode,
            videos: config.videos.clone(),
        }
    }
}

/// The resolved playlist with the catalog data the admin page renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistPayload {
    pub playlist: Vec<VideoEntry>,
}

impl From<&Configuration> for PlaylistPayload {
    fn from(config: &Configuration) -> Self {
        Self {
            playlist: playlist::resolve_entries(config)
                .into_iter()
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum BusEvent {
    MetadataUpdate(MetadataPayload),
    PlaylistUpdate(PlaylistPayload),
    StatusUpdate(PlaybackState),
}

impl BusEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BusEvent::MetadataUpdate(_) => "metadata_update",
            BusEvent::PlaylistUpdate(_) => "playlist_update",
            BusEvent::StatusUpdate(_) => "status_update",
        }
    }
}

/// A published event as delivered to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: BusEvent,
}

impl Envelope {
    fn new(version: u64, event: BusEvent) -> Self {
        Self {
            version,
            timestamp: Utc::now(),
            event,
        }
    }
}

struct ClientSession {
    sender: mpsc::Sender<Envelope>,
    last_version: u64,
    connected_at: DateTime<Utc>,
}

struct BusState {
    sessions: HashMap<Uuid, ClientSession>,
    version: u64,
    metadata: Envelope,
    playlist: Envelope,
    status: Envelope,
}

impl BusState {
    fn snapshot(&self) -> Vec<Envelope> {
        let mut snapshot = vec![
            self.metadata.clone(),
            self.playlist.clone(),
            self.status.clone(),
        ];
        snapshot.sort_by_key(|e| e.version);
        snapshot
    }
}

/// Fan-out of state changes to connected observers.
///
/// Each session has its own bounded queue. Publishing never waits on a
/// session: one whose queue is full or closed is dropped.
#[derive(Clone)]
pub struct EventBus {
    state: Arc<RwLock<BusState>>,
    session_buffer: usize,
}

impl EventBus {
    pub fn new(session_buffer: usize) -> Self {
        let config = Configuration::default();
        let state = BusState {
            sessions: HashMap::new(),
            version: 0,
            metadata: Envelope::new(0, BusEvent::MetadataUpdate((&config).into())),
            playlist: Envelope::new(0, BusEvent::PlaylistUpdate((&config).into())),
            status: Envelope::new(0, BusEvent::StatusUpdate(PlaybackState::default())),
        };

        Self {
            state: Arc::new(RwLock::new(state)),
            session_buffer: session_buffer.max(SNAPSHOT_LEN),
        }
    }

    /// Register an observer. The current metadata, playlist and status are
    /// already queued on the returned subscription.
    pub async fn connect(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.session_buffer);
        let id = Uuid::new_v4();

        let mut state = self.state.write().await;
        let snapshot = state.snapshot();
        let last_version = state.version;
        for envelope in snapshot {
            // Capacity is at least SNAPSHOT_LEN and nothing else has been queued.
            let _ = sender.try_send(envelope);
        }
        state.sessions.insert(
            id,
            ClientSession {
                sender,
                last_version,
                connected_at: Utc::now(),
            },
        );
        info!("Observer {} connected ({} total)", id, state.sessions.len());

        Subscription { id, receiver }
    }

    pub async fn disconnect(&self, id: Uuid) {
        let mut state = self.state.write().await;
        if let Some(session) = state.sessions.remove(&id) {
            let connected_for = Utc::now() - session.connected_at;
            info!(
                "Observer {} disconnected after {}s",
                id,
                connected_for.num_seconds()
            );
        }
    }

    /// Deliver `event` to every session and remember it for future snapshots.
    pub async fn publish(&self, event: BusEvent) -> u64 {
        let mut state = self.state.write().await;
        state.version += 1;
        let envelope = Envelope::new(state.version, event);

        match envelope.event {
            BusEvent::MetadataUpdate(_) => state.metadata = envelope.clone(),
            BusEvent::PlaylistUpdate(_) => state.playlist = envelope.clone(),
            BusEvent::StatusUpdate(_) => state.status = envelope.clone(),
        }

        let mut dropped = Vec::new();
        for (id, session) in state.sessions.iter_mut() {
            match session.sender.try_send(envelope.clone()) {
                Ok(()) => session.last_version = envelope.version,
                Err(e) => {
                    let reason = match e {
                        mpsc::error::TrySendError::Full(_) => "queue full",
                        mpsc::error::TrySendError::Closed(_) => "session closed",
                    };
                    warn!(
                        "{}",
                        Error::Delivery {
                            session: id.to_string(),
                            reason: format!(
                                "{} (last delivered version {})",
                                reason, session.last_version
                            ),
                        }
                    );
                    dropped.push(*id);
                }
            }
        }
        for id in dropped {
            state.sessions.remove(&id);
        }

        debug!(
            "Published {} v{} to {} observers",
            envelope.event.name(),
            envelope.version,
            state.sessions.len()
        );
        envelope.version
    }

    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }
}

/// Receiving end of one observer session.
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::Receiver<Envelope>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event, or `None` once the bus has dropped this session.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }
}
