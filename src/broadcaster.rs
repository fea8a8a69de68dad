//! StateBroadcaster - single source of truth for the current track
//!
//! Uses tokio::sync::broadcast for fan-out to subscriber connections and
//! an RwLock'd snapshot so a joining client can be seeded with the current
//! state before it sees any updates.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::track::CanonicalTrack;

/// Events delivered to every subscriber, in publish order.
#[derive(Debug, Clone)]
pub enum StateEvent {
    /// Full current snapshot; `None` means nothing playing.
    Update(Option<CanonicalTrack>),
    /// Empty keepalive for idle connections behind proxies.
    Ping,
}

pub struct StateBroadcaster {
    current: RwLock<Option<CanonicalTrack>>,
    sender: broadcast::Sender<StateEvent>,
}

/// Shared broadcaster handle.
pub type SharedBroadcaster = Arc<StateBroadcaster>;

impl StateBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            current: RwLock::new(None),
            sender,
        }
    }

    /// Default capacity (256 events).
    pub fn with_default_capacity() -> Self {
        Self::new(256)
    }

    /// Register a subscriber: a read-consistent snapshot of the current
    /// state plus a receiver for everything published after it.
    ///
    /// The receiver is created under the same lock `publish` writes, so a
    /// join racing a publish either sees it in the snapshot or receives it
    /// as the first event - never neither.
    pub async fn subscribe(&self) -> (Option<CanonicalTrack>, broadcast::Receiver<StateEvent>) {
        let current = self.current.read().await;
        let rx = self.sender.subscribe();
        (current.clone(), rx)
    }

    /// Replace the current state and notify all subscribers.
    pub async fn publish(&self, next: Option<CanonicalTrack>) {
        let mut current = self.current.write().await;
        *current = next.clone();
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(StateEvent::Update(next));
    }

    /// Refresh the stored state (position drift) without waking subscribers.
    pub async fn set_current(&self, next: Option<CanonicalTrack>) {
        *self.current.write().await = next;
    }

    /// Current state snapshot.
    pub async fn current(&self) -> Option<CanonicalTrack> {
        self.current.read().await.clone()
    }

    /// Send a keepalive to all subscribers.
    pub fn ping(&self) {
        let _ = self.sender.send(StateEvent::Ping);
    }

    /// Number of live subscriber connections.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
