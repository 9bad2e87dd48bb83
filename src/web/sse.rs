//! Push channel for admin pages.
//!
//! Route: `GET /events`. Every connection starts with a snapshot of the
//! display metadata, playlist and playback status, followed by live updates.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream};
use std::convert::Infallible;
use tracing::warn;
use uuid::Uuid;

use crate::events::{Envelope, EventBus, Subscription};
use crate::state::AppState;

pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.sync.bus().connect().await;
    Sse::new(event_stream(state.sync.bus().clone(), subscription)).keep_alive(KeepAlive::default())
}

/// Removes the session from the bus when the client goes away.
struct SessionGuard {
    bus: EventBus,
    id: Uuid,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let bus = self.bus.clone();
            let id = self.id;
            runtime.spawn(async move { bus.disconnect(id).await });
        }
    }
}

pub(crate) fn event_stream(
    bus: EventBus,
    subscription: Subscription,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let guard = SessionGuard {
        bus,
        id: subscription.id(),
    };

    stream::unfold((subscription, guard), |(mut subscription, guard)| async move {
        loop {
            let envelope = subscription.recv().await?;
            match to_sse_event(&envelope) {
                Some(event) => return Some((Ok(event), (subscription, guard))),
                None => continue,
            }
        }
    })
}

fn to_sse_event(envelope: &Envelope) -> Option<Event> {
    match serde_json::to_string(envelope) {
        Ok(json) => Some(
            Event::default()
                .event(envelope.event.name())
                .id(envelope.version.to_string())
                .data(json),
        ),
        Err(e) => {
            warn!("Failed to serialize {} event: {}", envelope.event.name(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BusEvent;
    use crate::supervisor::PlaybackState;
    use futures_util::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stream_yields_snapshot_then_updates() {
        let bus = EventBus::new(8);
        let subscription = bus.connect().await;
        let stream = event_stream(bus.clone(), subscription);
        futures_util::pin_mut!(stream);

        for _ in 0..3 {
            assert!(stream.next().await.unwrap().is_ok());
        }

        bus.publish(BusEvent::StatusUpdate(PlaybackState::default())).await;
        let next = tokio::time::timeout(Duration::from_secs(1), stream.next()).await;
        assert!(matches!(next, Ok(Some(Ok(_)))));
    }

    #[tokio::test]
    async fn test_dropping_stream_disconnects_session() {
        let bus = EventBus::new(8);
        let subscription = bus.connect().await;
        let stream = event_stream(bus.clone(), subscription);
        assert_eq!(bus.session_count().await, 1);

        drop(stream);
        for _ in 0..100 {
            if bus.session_count().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session was not removed");
    }
}
