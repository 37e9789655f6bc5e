//! Bound setters and updaters
//!
//! A [`Setter`] computes new contents from an argument alone and is legal in
//! any state. An [`Updater`] derives new contents from the settled value and
//! is rejected while the store has none.

use std::fmt;
use std::sync::Arc;

use verstore_core::{Completion, Contents, StoreResult};

use crate::{Payload, Store};

type SetFn<V, E, A> = dyn Fn(A) -> Contents<V, E> + Send + Sync;
type UpdateFn<V, E, A> = dyn Fn(&V, A) -> Contents<V, E> + Send + Sync;

/// Reusable write bound to a store
pub struct Setter<V, E, A = ()> {
    store: Store<V, E>,
    setter: Arc<SetFn<V, E, A>>,
}

/// Reusable read-modify-write bound to a store
pub struct Updater<V, E, A = ()> {
    store: Store<V, E>,
    updater: Arc<UpdateFn<V, E, A>>,
}

impl<V: Payload, E: Payload, A> Setter<V, E, A> {
    pub(crate) fn new<F>(store: Store<V, E>, setter: F) -> Self
    where
        F: Fn(A) -> Contents<V, E> + Send + Sync + 'static,
    {
        Setter {
            store,
            setter: Arc::new(setter),
        }
    }

    /// Compute contents from `arg` and write them
    ///
    /// Only fails when deferred contents find no runtime to run on.
    pub fn call(&self, arg: A) -> StoreResult<Completion<V, E>, E> {
        self.store.set_contents((self.setter)(arg))
    }

    pub fn store(&self) -> &Store<V, E> {
        &self.store
    }
}

impl<V: Payload, E: Payload> Setter<V, E, ()> {
    /// Call a setter that takes no argument
    pub fn invoke(&self) -> StoreResult<Completion<V, E>, E> {
        self.call(())
    }
}

impl<V: Payload, E: Payload, A> Updater<V, E, A> {
    pub(crate) fn new<F>(store: Store<V, E>, updater: F) -> Self
    where
        F: Fn(&V, A) -> Contents<V, E> + Send + Sync + 'static,
    {
        Updater {
            store,
            updater: Arc::new(updater),
        }
    }

    /// Derive contents from the settled value and `arg`, then write them
    ///
    /// Fails with `InvalidOperation`, without touching the store, unless it
    /// holds a settled value.
    pub fn call(&self, arg: A) -> StoreResult<Completion<V, E>, E> {
        self.store
            .update_with(|current| (self.updater)(current, arg))
    }

    pub fn store(&self) -> &Store<V, E> {
        &self.store
    }
}

impl<V: Payload, E: Payload> Updater<V, E, ()> {
    /// Call an updater that takes no argument
    pub fn invoke(&self) -> StoreResult<Completion<V, E>, E> {
        self.call(())
    }
}

impl<V, E, A> Clone for Setter<V, E, A> {
    fn clone(&self) -> Self {
        Setter {
            store: self.store.clone(),
            setter: Arc::clone(&self.setter),
        }
    }
}

impl<V, E, A> Clone for Updater<V, E, A> {
    fn clone(&self) -> Self {
        Updater {
            store: self.store.clone(),
            updater: Arc::clone(&self.updater),
        }
    }
}

impl<V, E, A> fmt::Debug for Setter<V, E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter").field("store", &self.store).finish()
    }
}

impl<V, E, A> fmt::Debug for Updater<V, E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater").field("store", &self.store).finish()
    }
}
