//! Write contents - the input of the write protocol
//!
//! A write either carries its new value directly or a computation that
//! produces it later. The classification is made by the caller when the
//! contents are built, never by inspecting the value at runtime.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed computation backing a deferred write
pub type DeferredFuture<V, E> = Pin<Box<dyn Future<Output = Result<V, E>> + Send + 'static>>;

/// New contents for a store: immediate or deferred
pub enum Contents<V, E> {
    /// Value available now
    Immediate(V),
    /// Value produced by a computation that settles later
    Deferred(DeferredFuture<V, E>),
}

impl<V, E> Contents<V, E> {
    /// Wrap a value available now
    pub fn immediate(value: V) -> Self {
        Contents::Immediate(value)
    }

    /// Wrap a computation that settles later
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<V, E>> + Send + 'static,
    {
        Contents::Deferred(Box::pin(future))
    }

    /// Should the write protocol treat these contents as deferred?
    #[inline]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Contents::Deferred(_))
    }
}

impl<V, E> From<V> for Contents<V, E> {
    fn from(value: V) -> Self {
        Contents::Immediate(value)
    }
}

impl<V: fmt::Debug, E> fmt::Debug for Contents<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contents::Immediate(value) => f.debug_tuple("Immediate").field(value).finish(),
            Contents::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}
