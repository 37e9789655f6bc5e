//! Observer registry
//!
//! Observers are kept in registration order. Delivery walks a copy of the
//! registry taken when the transition is emitted and re-checks each entry
//! before calling it, so removals made during delivery take effect at once.

use std::fmt;
use std::sync::Arc;

use verstore_core::Loadable;

use crate::WeakStore;

/// Callback invoked on every transition
pub type Observer<V, E> = Arc<dyn Fn(&Loadable<V, E>) + Send + Sync>;

/// Identity of a registered observer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Store-exclusive observer registry
pub(crate) struct ObserverRegistry<V, E> {
    next_id: u64,
    entries: Vec<(SubscriberId, Observer<V, E>)>,
}

impl<V, E> ObserverRegistry<V, E> {
    pub(crate) fn new() -> Self {
        ObserverRegistry {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, observer: Observer<V, E>) -> SubscriberId {
        self.next_id += 1;
        let id = SubscriberId(self.next_id);
        self.entries.push((id, observer));
        id
    }

    /// Remove by identity; false if not registered
    pub(crate) fn remove(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Delivery list for one transition
    pub(crate) fn targets(&self) -> Vec<(SubscriberId, Observer<V, E>)> {
        self.entries.clone()
    }
}

/// Handle returned by `Store::subscribe`
///
/// Calling [`unsubscribe`](Subscription::unsubscribe) removes the observer;
/// repeated calls are no-ops. Dropping the handle does not unsubscribe.
pub struct Subscription<V, E> {
    id: SubscriberId,
    store: WeakStore<V, E>,
}

impl<V, E> Subscription<V, E> {
    pub(crate) fn new(id: SubscriberId, store: WeakStore<V, E>) -> Self {
        Subscription { id, store }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl<V, E> Subscription<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Remove the observer; true only on the call that removed it
    pub fn unsubscribe(&self) -> bool {
        match self.store.upgrade() {
            Some(store) => store.unsubscribe(self.id),
            None => false,
        }
    }
}

impl<V, E> fmt::Debug for Subscription<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
