//! Versioned store - write protocol and notification
//!
//! Every write bumps the revision counter. Immediate contents commit at
//! once; deferred contents put the store into `Loading` and commit later
//! only if no newer write was issued in the meantime. Superseded writes
//! report `Canceled` on their own completion and leave the store untouched.
//!
//! Transitions and their delivery are serialized by a re-entrant delivery
//! lock. Writes issued by an observer while a notification is being
//! delivered are committed immediately; their notifications are queued and
//! delivered after the current one, so every observer sees transitions in
//! commit order.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use tokio::runtime::Handle;
use tracing::{debug, trace};

use verstore_core::{
    Completion, Contents, DeferredFuture, Loadable, Read, Resolver, StoreError, StoreResult,
    StoreState,
};

use crate::{Observer, ObserverRegistry, StoreConfig, SubscriberId, Subscription};

/// Bounds required of store values and errors
pub trait Payload: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Payload for T {}

/// Lifecycle state plus revision, guarded together
struct StoreCell<V, E> {
    loadable: Loadable<V, E>,
    revision: u64,
}

/// Notifications waiting to be delivered
struct DeliveryQueue<V, E> {
    pending: VecDeque<Loadable<V, E>>,
    delivering: bool,
}

struct Shared<V, E> {
    label: String,
    runtime: Option<Handle>,
    fallback_runtime: Option<Handle>,
    cell: Mutex<StoreCell<V, E>>,
    observers: Mutex<ObserverRegistry<V, E>>,
    delivery: ReentrantMutex<RefCell<DeliveryQueue<V, E>>>,
}

/// Versioned single-value store
///
/// Cloning a `Store` creates a new handle to the same store.
pub struct Store<V, E> {
    shared: Arc<Shared<V, E>>,
}

/// Non-owning store handle
pub struct WeakStore<V, E> {
    shared: Weak<Shared<V, E>>,
}

/// Construction helper
pub fn create_store<V: Payload, E: Payload>(config: StoreConfig<V>) -> Store<V, E> {
    Store::new(config)
}

impl<V: Payload, E: Payload> Store<V, E> {
    /// Create a store holding `config.initial`
    pub fn new(config: StoreConfig<V>) -> Self {
        Store {
            shared: Arc::new(Shared {
                label: config.label,
                runtime: config.runtime,
                fallback_runtime: Handle::try_current().ok(),
                cell: Mutex::new(StoreCell {
                    loadable: Loadable::HasValue(config.initial),
                    revision: 0,
                }),
                observers: Mutex::new(ObserverRegistry::new()),
                delivery: ReentrantMutex::new(RefCell::new(DeliveryQueue {
                    pending: VecDeque::new(),
                    delivering: false,
                })),
            }),
        }
    }

    /// Shorthand for `Store::new(StoreConfig::new(initial))`
    pub fn with_initial(initial: V) -> Self {
        Self::new(StoreConfig::new(initial))
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Current revision (number of writes issued so far)
    pub fn revision(&self) -> u64 {
        self.shared.cell.lock().revision
    }

    /// Current contents
    pub fn loadable(&self) -> Loadable<V, E> {
        self.shared.cell.lock().loadable.clone()
    }

    pub fn state(&self) -> StoreState {
        self.shared.cell.lock().loadable.state()
    }

    /// Synchronous read; `Pending` carries the in-flight completion
    pub fn get_value(&self) -> Read<V, E> {
        self.shared.cell.lock().loadable.get_value()
    }

    pub fn value_maybe(&self) -> Option<V> {
        self.shared.cell.lock().loadable.value_maybe()
    }

    pub fn error_maybe(&self) -> Option<E> {
        self.shared.cell.lock().loadable.error_maybe()
    }

    /// Completion for the current or eventual value
    pub fn to_future(&self) -> Completion<V, E> {
        self.shared.cell.lock().loadable.to_future()
    }

    /// Register an observer
    pub fn subscribe<F>(&self, observer: F) -> Subscription<V, E>
    where
        F: Fn(&Loadable<V, E>) + Send + Sync + 'static,
    {
        let observer: Observer<V, E> = Arc::new(observer);
        let id = self.shared.observers.lock().insert(observer);
        debug!(store = %self.shared.label, subscriber = %id, "observer subscribed");
        Subscription::new(id, self.downgrade())
    }

    /// Remove an observer by identity; false if it was not registered
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.shared.observers.lock().remove(id);
        if removed {
            debug!(store = %self.shared.label, subscriber = %id, "observer unsubscribed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.observers.lock().len()
    }

    pub fn downgrade(&self) -> WeakStore<V, E> {
        WeakStore {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Set an immediate value
    pub fn set(&self, value: V) -> Completion<V, E> {
        self.commit_immediate(value)
    }

    /// Start a deferred write
    pub fn set_deferred<F>(&self, future: F) -> StoreResult<Completion<V, E>, E>
    where
        F: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.commit_deferred(Box::pin(future))
    }

    /// Write protocol entry point
    pub fn set_contents(&self, contents: Contents<V, E>) -> StoreResult<Completion<V, E>, E> {
        match contents {
            Contents::Immediate(value) => Ok(self.commit_immediate(value)),
            Contents::Deferred(future) => self.commit_deferred(future),
        }
    }

    /// Derive new contents from the settled value
    ///
    /// Fails with `InvalidOperation` unless the store holds a settled value.
    /// The read, the update and the write run under the delivery lock, so
    /// no write from another thread can land between them.
    pub fn update_with<F>(&self, update: F) -> StoreResult<Completion<V, E>, E>
    where
        F: FnOnce(&V) -> Contents<V, E>,
    {
        let _delivery = self.shared.delivery.lock();
        let base = match &self.shared.cell.lock().loadable {
            Loadable::HasValue(value) => value.clone(),
            Loadable::Loading(_) => {
                return Err(StoreError::InvalidOperation(
                    "can't update contents while a write is in flight",
                ))
            }
            Loadable::HasError(_) => {
                return Err(StoreError::InvalidOperation(
                    "can't update contents without a settled value",
                ))
            }
        };
        self.set_contents(update(&base))
    }

    fn commit_immediate(&self, value: V) -> Completion<V, E> {
        let delivery = self.shared.delivery.lock();
        let (revision, loadable) = {
            let mut cell = self.shared.cell.lock();
            cell.revision += 1;
            cell.loadable = Loadable::HasValue(value.clone());
            (cell.revision, cell.loadable.clone())
        };
        trace!(store = %self.shared.label, revision, state = %StoreState::HasValue, "contents set");
        self.emit(&delivery, loadable);
        Completion::ready(value)
    }

    fn commit_deferred(&self, future: DeferredFuture<V, E>) -> StoreResult<Completion<V, E>, E> {
        let runtime = self.runtime().ok_or(StoreError::NoRuntime)?;
        let (resolver, completion) = Completion::channel();

        let delivery = self.shared.delivery.lock();
        let (revision, loadable) = {
            let mut cell = self.shared.cell.lock();
            cell.revision += 1;
            cell.loadable = Loadable::Loading(completion.clone());
            (cell.revision, cell.loadable.clone())
        };
        trace!(store = %self.shared.label, revision, state = %StoreState::Loading, "contents loading");
        self.emit(&delivery, loadable);

        let store = self.downgrade();
        runtime.spawn(async move {
            let outcome = future.await;
            match store.upgrade() {
                Some(store) => store.settle(revision, outcome, resolver),
                None => resolver.resolve(outcome.map_err(StoreError::Upstream)),
            }
        });

        Ok(completion)
    }

    /// Apply a deferred outcome if its revision is still current
    fn settle(&self, revision: u64, outcome: Result<V, E>, resolver: Resolver<V, E>) {
        let delivery = self.shared.delivery.lock();
        let committed = {
            let mut cell = self.shared.cell.lock();
            if cell.revision == revision {
                cell.loadable = match &outcome {
                    Ok(value) => Loadable::HasValue(value.clone()),
                    Err(error) => Loadable::HasError(error.clone()),
                };
                Ok(cell.loadable.clone())
            } else {
                Err(cell.revision)
            }
        };

        match committed {
            Ok(loadable) => {
                trace!(store = %self.shared.label, revision, state = %loadable.state(), "deferred write settled");
                self.emit(&delivery, loadable);
                drop(delivery);
                resolver.resolve(outcome.map_err(StoreError::Upstream));
            }
            Err(current) => {
                drop(delivery);
                debug!(store = %self.shared.label, revision, current, "deferred write superseded");
                resolver.resolve(Err(StoreError::Canceled));
            }
        }
    }

    fn runtime(&self) -> Option<Handle> {
        self.shared
            .runtime
            .clone()
            .or_else(|| self.shared.fallback_runtime.clone())
            .or_else(|| Handle::try_current().ok())
    }

    /// Queue a notification and drain the queue unless a drain is already
    /// running further up this thread's stack
    fn emit(&self, queue: &RefCell<DeliveryQueue<V, E>>, loadable: Loadable<V, E>) {
        {
            let mut queue = queue.borrow_mut();
            queue.pending.push_back(loadable);
            if queue.delivering {
                return;
            }
            queue.delivering = true;
        }

        let _draining = Draining { queue };
        loop {
            let next = queue.borrow_mut().pending.pop_front();
            let Some(loadable) = next else { break };
            self.deliver(&loadable);
        }
    }

    fn deliver(&self, loadable: &Loadable<V, E>) {
        let targets = self.shared.observers.lock().targets();
        for (id, observer) in targets {
            // Removed earlier in this delivery
            if !self.shared.observers.lock().contains(id) {
                continue;
            }
            observer(loadable);
        }
    }

    /// Bind a setter
    pub fn create_setter<F, C>(&self, setter: F) -> crate::Setter<V, E>
    where
        F: Fn() -> C + Send + Sync + 'static,
        C: Into<Contents<V, E>>,
    {
        crate::Setter::new(self.clone(), move |()| setter().into())
    }

    /// Bind a setter taking an argument
    pub fn create_setter_with<A, F, C>(&self, setter: F) -> crate::Setter<V, E, A>
    where
        A: 'static,
        F: Fn(A) -> C + Send + Sync + 'static,
        C: Into<Contents<V, E>>,
    {
        crate::Setter::new(self.clone(), move |arg| setter(arg).into())
    }

    /// Bind an updater
    pub fn create_updater<F, C>(&self, updater: F) -> crate::Updater<V, E>
    where
        F: Fn(&V) -> C + Send + Sync + 'static,
        C: Into<Contents<V, E>>,
    {
        crate::Updater::new(self.clone(), move |current: &V, ()| updater(current).into())
    }

    /// Bind an updater taking an argument
    pub fn create_updater_with<A, F, C>(&self, updater: F) -> crate::Updater<V, E, A>
    where
        A: 'static,
        F: Fn(&V, A) -> C + Send + Sync + 'static,
        C: Into<Contents<V, E>>,
    {
        crate::Updater::new(self.clone(), move |current: &V, arg| updater(current, arg).into())
    }
}

/// Clears the delivering flag even if an observer panics
struct Draining<'a, V, E> {
    queue: &'a RefCell<DeliveryQueue<V, E>>,
}

impl<V, E> Drop for Draining<'_, V, E> {
    fn drop(&mut self) {
        let mut queue = self.queue.borrow_mut();
        queue.delivering = false;
        queue.pending.clear();
    }
}

impl<V, E> Clone for Store<V, E> {
    fn clone(&self) -> Self {
        Store {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V, E> fmt::Debug for Store<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (state, revision) = {
            let cell = self.shared.cell.lock();
            (cell.loadable.state(), cell.revision)
        };
        f.debug_struct("Store")
            .field("label", &self.shared.label)
            .field("state", &state)
            .field("revision", &revision)
            .field("subscribers", &self.shared.observers.lock().len())
            .finish()
    }
}

impl<V, E> WeakStore<V, E> {
    pub fn upgrade(&self) -> Option<Store<V, E>> {
        self.shared.upgrade().map(|shared| Store { shared })
    }
}

impl<V, E> Clone for WeakStore<V, E> {
    fn clone(&self) -> Self {
        WeakStore {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<V, E> fmt::Debug for WeakStore<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStore")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}
