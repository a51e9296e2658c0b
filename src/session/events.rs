// Session events published on a tokio broadcast channel
//
// Front-ends subscribe to learn about song start/finish, track toggles,
// seeks and warnings without polling the session.

use std::sync::Arc;
use std::time::Instant;

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::state::SessionState;
use crate::playback::{TimeSource, TrackKind};

/// Broadcast buffer size; lagging subscribers lose the oldest events
const EVENT_BUFFER: usize = 128;

/// Event emitted by the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Milliseconds since the session was created
    pub timestamp_ms: u64,
    pub kind: SessionEventKind,
    pub detail: Option<String>,
}

/// Types of session events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEventKind {
    SongQueued { id: String },
    SongStarted { id: String },
    SongStartFailed { id: String },
    SongFinished { id: String, score: u8 },
    StateChanged { from: String, to: String },
    TrackToggled { track: TrackKind },
    Seeked { to_ms: u64 },
    ConfigApplied,
    AnalyzerDegraded,
    Warning,
}

pub(crate) struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
    time_source: Arc<dyn TimeSource>,
    start_instant: Instant,
}

impl EventBus {
    pub(crate) fn new(time_source: Arc<dyn TimeSource>) -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        let start_instant = time_source.now();
        Self {
            tx,
            time_source,
            start_instant,
        }
    }

    pub(crate) fn publish(&self, kind: SessionEventKind, detail: Option<String>) {
        let timestamp_ms = self
            .time_source
            .now()
            .saturating_duration_since(self.start_instant)
            .as_millis() as u64;
        // No subscribers is fine
        let _ = self.tx.send(SessionEvent {
            timestamp_ms,
            kind,
            detail,
        });
    }

    pub(crate) fn state_changed(&self, from: SessionState, to: SessionState) {
        self.publish(
            SessionEventKind::StateChanged {
                from: from.to_string(),
                to: to.to_string(),
            },
            None,
        );
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Async stream of events; lagged notifications are skipped.
    pub(crate) fn stream(&self) -> impl Stream<Item = SessionEvent> + Send + 'static {
        tokio_stream::StreamExt::filter_map(BroadcastStream::new(self.tx.subscribe()), |item| {
            item.ok()
        })
    }
}
