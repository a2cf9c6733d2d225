//! Snapshot listener registry.
//!
//! UI observers register callbacks and receive the full playback snapshot
//! on every mutation. Subscriptions are keyed by opaque generated tokens
//! so independent screens can never collide on an identifier.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::state::PlaybackSnapshot;

/// Opaque subscription handle returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Callback invoked with each new snapshot.
pub type SnapshotCallback = Arc<dyn Fn(&PlaybackSnapshot) + Send + Sync>;

/// Registry of snapshot observers.
///
/// Broadcast happens in registration order, but concurrent notifiers can
/// interleave, so observers must treat delivery as unordered. Callbacks
/// are invoked outside the registry lock, which makes re-entrant
/// subscribe/unsubscribe from inside a callback safe.
pub struct ListenerRegistry {
    entries: Mutex<Vec<(SubscriptionId, SnapshotCallback)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register a callback and synchronously deliver `current` to it
    /// before any future mutation can race ahead.
    pub fn subscribe(
        &self,
        callback: impl Fn(&PlaybackSnapshot) + Send + Sync + 'static,
        current: &PlaybackSnapshot,
    ) -> SubscriptionId {
        let id = SubscriptionId::new();
        let callback: SnapshotCallback = Arc::new(callback);
        callback(current);
        self.entries.lock().push((id, callback));
        id
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| entry_id != id);
        entries.len() != before
    }

    /// Deliver `snapshot` to every registered callback.
    pub fn notify(&self, snapshot: &PlaybackSnapshot) {
        let callbacks: Vec<SnapshotCallback> = self
            .entries
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(snapshot);
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscribe_delivers_current_snapshot_immediately() {
        let registry = ListenerRegistry::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        let counter = delivered.clone();
        registry.subscribe(
            move |_snapshot| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            &PlaybackSnapshot::idle(),
        );

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn notify_reaches_all_listeners_in_registration_order() {
        let registry = ListenerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            registry.subscribe(
                move |_| {
                    order.lock().push(tag);
                },
                &PlaybackSnapshot::idle(),
            );
        }
        order.lock().clear();

        registry.notify(&PlaybackSnapshot::idle());
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn unsubscribe_stops_delivery_and_reports_membership() {
        let registry = ListenerRegistry::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        let counter = delivered.clone();
        let id = registry.subscribe(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            &PlaybackSnapshot::idle(),
        );
        assert_eq!(delivered.load(Ordering::SeqCst), 1);

        assert!(registry.unsubscribe(&id));
        registry.notify(&PlaybackSnapshot::idle());
        assert_eq!(delivered.load(Ordering::SeqCst), 1);

        // Second removal is a no-op
        assert!(!registry.unsubscribe(&id));
    }

    #[test]
    fn subscription_ids_are_unique() {
        let registry = ListenerRegistry::new();
        let a = registry.subscribe(|_| {}, &PlaybackSnapshot::idle());
        let b = registry.subscribe(|_| {}, &PlaybackSnapshot::idle());
        assert_ne!(a, b);
    }
}
