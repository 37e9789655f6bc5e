//! Snapshot recorder - captures every notification a store emits

use std::sync::Arc;

use parking_lot::Mutex;

use verstore_core::{Snapshot, StoreState};
use verstore_state::{Payload, Store, Subscription};

/// Observer that records the snapshot of every notification
pub struct SnapshotRecorder<V: Payload, E: Payload> {
    seen: Arc<Mutex<Vec<Snapshot<V, E>>>>,
    subscription: Subscription<V, E>,
}

impl<V: Payload, E: Payload> SnapshotRecorder<V, E> {
    /// Subscribe a new recorder to `store`
    pub fn attach(store: &Store<V, E>) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = store.subscribe(move |loadable| {
            sink.lock().push(loadable.snapshot());
        });
        SnapshotRecorder { seen, subscription }
    }

    /// Everything recorded so far
    pub fn snapshots(&self) -> Vec<Snapshot<V, E>> {
        self.seen.lock().clone()
    }

    /// Lifecycle tags recorded so far
    pub fn states(&self) -> Vec<StoreState> {
        self.seen.lock().iter().map(Snapshot::state).collect()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }

    pub fn last(&self) -> Option<Snapshot<V, E>> {
        self.seen.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }

    /// Stop recording; true if this call removed the observer
    pub fn detach(&self) -> bool {
        self.subscription.unsubscribe()
    }
}
