//! Completions - awaitable outcomes of writes
//!
//! A [`Completion`] is a cloneable handle to the outcome of one write. It is
//! either created already settled or paired with a [`Resolver`] that settles
//! it exactly once. Every clone observes the same outcome.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;

use tokio::sync::watch;

use crate::{StoreError, StoreResult};

type Slot<V, E> = Option<StoreResult<V, E>>;

/// Handle to a settled or eventual write outcome
pub struct Completion<V, E> {
    rx: watch::Receiver<Slot<V, E>>,
}

/// Settling side of a [`Completion`]
pub struct Resolver<V, E> {
    tx: watch::Sender<Slot<V, E>>,
}

impl<V, E> Completion<V, E> {
    /// Create an unsettled completion and its resolver
    pub fn channel() -> (Resolver<V, E>, Completion<V, E>) {
        let (tx, rx) = watch::channel(None);
        (Resolver { tx }, Completion { rx })
    }

    /// Completion already settled with `outcome`
    pub fn settled(outcome: StoreResult<V, E>) -> Self {
        let (_tx, rx) = watch::channel(Some(outcome));
        Completion { rx }
    }

    /// Completion already settled with a value
    pub fn ready(value: V) -> Self {
        Self::settled(Ok(value))
    }

    /// Completion already settled with an error
    pub fn failed(error: StoreError<E>) -> Self {
        Self::settled(Err(error))
    }

    /// Has an outcome been recorded?
    pub fn is_settled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Do both handles refer to the same write?
    pub fn same_as(&self, other: &Completion<V, E>) -> bool {
        self.rx.same_channel(&other.rx)
    }
}

impl<V: Clone, E: Clone> Completion<V, E> {
    /// Outcome if already settled, without waiting
    pub fn try_outcome(&self) -> Option<StoreResult<V, E>> {
        (*self.rx.borrow()).clone()
    }

    /// Wait for the outcome
    ///
    /// Resolves to [`StoreError::Abandoned`] if the resolver is dropped
    /// without settling.
    pub async fn wait(mut self) -> StoreResult<V, E> {
        let outcome = match self.rx.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone(),
            Err(_) => None,
        };
        outcome.unwrap_or(Err(StoreError::Abandoned))
    }
}

impl<V, E> Clone for Completion<V, E> {
    fn clone(&self) -> Self {
        Completion {
            rx: self.rx.clone(),
        }
    }
}

impl<V, E> fmt::Debug for Completion<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl<V, E> IntoFuture for Completion<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    type Output = StoreResult<V, E>;
    type IntoFuture = Pin<Box<dyn Future<Output = StoreResult<V, E>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

impl<V, E> Resolver<V, E> {
    /// Settle the paired completion
    pub fn resolve(self, outcome: StoreResult<V, E>) {
        self.tx.send_replace(Some(outcome));
    }

    /// Number of live completion handles
    pub fn waiters(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<V, E> Drop for Resolver<V, E> {
    fn drop(&mut self) {
        if self.tx.borrow().is_none() {
            tracing::warn!(waiters = self.tx.receiver_count(), "resolver dropped before settling");
        }
    }
}

impl<V, E> fmt::Debug for Resolver<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("waiters", &self.waiters())
            .finish()
    }
}
