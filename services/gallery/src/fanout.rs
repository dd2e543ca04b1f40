//! Realtime fanout: best-effort, in-memory, at-most-once
//!
//! One logical channel per session (`session_{id}`). Publishing is
//! fire-and-forget relative to the request that triggered it; a subscriber
//! joining after an event misses it, and nothing is replayed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::PhotoAnnouncement;

/// Channel name for a session's event stream
pub fn session_channel(session_id: Uuid) -> String {
    format!("session_{session_id}")
}

/// Events delivered to session subscribers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    NewPhoto(PhotoAnnouncement),
    PhotoPublished(PhotoAnnouncement),
    PhotoDeleted { id: Uuid },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::NewPhoto(_) => "new_photo",
            SessionEvent::PhotoPublished(_) => "photo_published",
            SessionEvent::PhotoDeleted { .. } => "photo_deleted",
        }
    }
}

/// Fire-and-forget per-channel fanout primitive. Implementations must not
/// block or fail the request that publishes.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, channel: &str, event: SessionEvent);
}

/// Lightweight in-process event bus that fans session events out to current
/// subscribers over tokio broadcast channels. Keeps the wiring flexible if
/// an external realtime transport is plugged in later.
pub struct InProcEventBus {
    capacity: usize,
    channels: Mutex<HashMap<String, broadcast::Sender<SessionEvent>>>,
}

impl InProcEventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a channel, creating it if nobody published yet.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<SessionEvent> {
        self.sender_for(channel).subscribe()
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<SessionEvent> {
        let mut channels = self.channels.lock().expect("fanout channel map poisoned");
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    #[cfg(test)]
    fn channel_count(&self) -> usize {
        self.channels
            .lock()
            .expect("fanout channel map poisoned")
            .len()
    }
}

#[async_trait]
impl Publisher for InProcEventBus {
    async fn publish(&self, channel: &str, event: SessionEvent) {
        let name = event.name();
        let mut channels = self.channels.lock().expect("fanout channel map poisoned");
        if let Some(sender) = channels.get(channel) {
            // Send errors only mean nobody is listening right now.
            if sender.send(event).is_ok() {
                return;
            }
            // Prune the entry so sessions whose subscribers are gone do not
            // keep a sender in the map forever.
            channels.remove(channel);
        }
        debug!(channel, event = name, "no subscribers for event");
    }
}
