//! Loadables - the contents of a store at one instant
//!
//! [`Loadable`] pairs the lifecycle tag with its payload. Observers receive
//! it on every transition. [`Snapshot`] is its comparable, payload-free view
//! and [`Read`] is the outcome of a synchronous read.

use thiserror::Error;

use crate::{Completion, StoreError, StoreState};

/// Store contents: settled value, in-flight write, or error
#[derive(Clone, Debug)]
pub enum Loadable<V, E> {
    /// Settled value
    HasValue(V),
    /// In-flight deferred write
    Loading(Completion<V, E>),
    /// Failed deferred write
    HasError(E),
}

impl<V, E> Loadable<V, E> {
    /// Lifecycle tag
    pub fn state(&self) -> StoreState {
        match self {
            Loadable::HasValue(_) => StoreState::HasValue,
            Loadable::Loading(_) => StoreState::Loading,
            Loadable::HasError(_) => StoreState::HasError,
        }
    }

    /// Borrow the settled value
    pub fn value(&self) -> Option<&V> {
        match self {
            Loadable::HasValue(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the error
    pub fn error(&self) -> Option<&E> {
        match self {
            Loadable::HasError(error) => Some(error),
            _ => None,
        }
    }

    #[inline]
    pub fn is_loading(&self) -> bool {
        matches!(self, Loadable::Loading(_))
    }
}

impl<V: Clone, E: Clone> Loadable<V, E> {
    /// Synchronous read
    pub fn get_value(&self) -> Read<V, E> {
        match self {
            Loadable::HasValue(value) => Read::Ready(value.clone()),
            Loadable::Loading(pending) => Read::Pending(pending.clone()),
            Loadable::HasError(error) => Read::Failed(error.clone()),
        }
    }

    /// Settled value, or None
    pub fn value_maybe(&self) -> Option<V> {
        self.value().cloned()
    }

    /// Error, or None
    pub fn error_maybe(&self) -> Option<E> {
        self.error().cloned()
    }

    /// Completion for the current or eventual value
    pub fn to_future(&self) -> Completion<V, E> {
        match self {
            Loadable::HasValue(value) => Completion::ready(value.clone()),
            Loadable::Loading(pending) => pending.clone(),
            Loadable::HasError(error) => Completion::failed(StoreError::Upstream(error.clone())),
        }
    }

    /// Comparable view without the in-flight handle
    pub fn snapshot(&self) -> Snapshot<V, E> {
        match self {
            Loadable::HasValue(value) => Snapshot::HasValue(value.clone()),
            Loadable::Loading(_) => Snapshot::Loading,
            Loadable::HasError(error) => Snapshot::HasError(error.clone()),
        }
    }
}

/// Payload-free, comparable view of a [`Loadable`]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Snapshot<V, E> {
    HasValue(V),
    Loading,
    HasError(E),
}

impl<V, E> Snapshot<V, E> {
    pub fn state(&self) -> StoreState {
        match self {
            Snapshot::HasValue(_) => StoreState::HasValue,
            Snapshot::Loading => StoreState::Loading,
            Snapshot::HasError(_) => StoreState::HasError,
        }
    }
}

/// Outcome of a synchronous read
#[derive(Clone, Debug)]
pub enum Read<V, E> {
    /// Settled value
    Ready(V),
    /// Read suspended on the in-flight write; await it and read again
    Pending(Completion<V, E>),
    /// Stored error
    Failed(E),
}

impl<V, E> Read<V, E> {
    pub fn state(&self) -> StoreState {
        match self {
            Read::Ready(_) => StoreState::HasValue,
            Read::Pending(_) => StoreState::Loading,
            Read::Failed(_) => StoreState::HasError,
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, Read::Ready(_))
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, Read::Pending(_))
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        matches!(self, Read::Failed(_))
    }

    /// The value, discarding pending and failed reads
    pub fn ready(self) -> Option<V> {
        match self {
            Read::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// Convert into a `Result` so callers can propagate the signal with `?`
    pub fn into_result(self) -> Result<V, Suspended<V, E>> {
        match self {
            Read::Ready(value) => Ok(value),
            Read::Pending(pending) => Err(Suspended::Pending(pending)),
            Read::Failed(error) => Err(Suspended::Failed(error)),
        }
    }
}

/// Non-ready read, as an error value
#[derive(Error, Debug)]
pub enum Suspended<V, E> {
    #[error("Read suspended on an in-flight write")]
    Pending(Completion<V, E>),

    #[error("Read failed: {0}")]
    Failed(E),
}
