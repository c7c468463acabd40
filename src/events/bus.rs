//! Explicit observer registry for conference events.
//!
//! Observers register through `EventBus::subscribe` and get back a
//! `Subscription` that owns both the receiving end of their channel and the
//! registration itself. The registration is removed exactly once, either by
//! `Subscription::unsubscribe` or on drop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;

use super::ConferenceEvent;

#[derive(Default)]
struct Registry {
    next_id: u64,
    observers: HashMap<u64, mpsc::UnboundedSender<ConferenceEvent>>,
}

/// Fan-out point for conference events. Cheap to clone; clones share the
/// same set of observers.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer. It receives every event published after this
    /// call, until the returned subscription is released.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = registry.next_id;
        registry.next_id += 1;
        registry.observers.insert(id, tx);
        tracing::debug!("Event observer {} registered", id);

        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
            receiver: rx,
            released: false,
        }
    }

    /// Deliver an event to every registered observer.
    ///
    /// Returns how many observers received it. Observers whose receiver is
    /// gone are pruned.
    pub fn publish(&self, event: ConferenceEvent) -> usize {
        let mut registry = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        registry
            .observers
            .retain(|_, tx| tx.send(event.clone()).is_ok());
        let delivered = registry.observers.len();
        tracing::debug!(
            "Published {} for {} to {} observer(s)",
            event.kind(),
            event.conference_id(),
            delivered
        );
        delivered
    }

    /// Number of live registrations.
    pub fn observer_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .observers
            .len()
    }
}

/// A live registration on an `EventBus`.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
    receiver: mpsc::UnboundedReceiver<ConferenceEvent>,
    released: bool,
}

impl Subscription {
    /// Wait for the next event. Returns `None` once released or once the bus
    /// has been dropped.
    pub async fn recv(&mut self) -> Option<ConferenceEvent> {
        if self.released {
            return None;
        }
        self.receiver.recv().await
    }

    /// Remove the registration. Calling it again is a no-op.
    pub fn unsubscribe(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.receiver.close();
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.observers.remove(&self.id);
        }
        tracing::debug!("Event observer {} unregistered", self.id);
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        !self.released
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
