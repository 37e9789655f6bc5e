//! Binding adapter
//!
//! Glue between a store and a consumer that renders from it. The binding
//! keeps the latest synchronous read and wakes its owner on every
//! transition. Each notification re-derives the read through
//! `Store::get_value` instead of using the notification payload, so pending
//! and failed reads are signalled exactly as on the first read.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use verstore_core::{Read, StoreState};

use crate::{Payload, Store, Subscription};

/// Live view of a store
pub struct StoreBinding<V: Payload, E: Payload> {
    rx: watch::Receiver<Read<V, E>>,
    subscription: Subscription<V, E>,
}

impl<V: Payload, E: Payload> StoreBinding<V, E> {
    /// Subscribe to `store`
    ///
    /// The binding only holds a weak reference; once every store handle is
    /// dropped, [`changed`](StoreBinding::changed) returns false.
    pub fn new(store: &Store<V, E>) -> Self {
        let (tx, mut rx) = watch::channel(store.get_value());
        let tx = Arc::new(tx);
        let sink = Arc::clone(&tx);
        let weak = store.downgrade();
        let subscription = store.subscribe(move |_| {
            if let Some(store) = weak.upgrade() {
                sink.send_replace(store.get_value());
            }
        });

        // Re-read after subscribing so a transition in between is not lost
        tx.send_replace(store.get_value());
        rx.borrow_and_update();
        StoreBinding { rx, subscription }
    }

    /// Latest read
    pub fn current(&self) -> Read<V, E> {
        (*self.rx.borrow()).clone()
    }

    pub fn state(&self) -> StoreState {
        self.rx.borrow().state()
    }

    /// Wait for the next transition; false once the store is gone
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

impl<V: Payload, E: Payload> Drop for StoreBinding<V, E> {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

impl<V: Payload, E: Payload> fmt::Debug for StoreBinding<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreBinding")
            .field("state", &self.state())
            .field("subscription", &self.subscription)
            .finish()
    }
}
