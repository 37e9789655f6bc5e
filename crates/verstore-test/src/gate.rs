//! Gates - deferred contents settled by hand
//!
//! A gate pairs deferred [`Contents`] with the handle that settles them, so a
//! test decides exactly when (and in which order) overlapping writes
//! complete. If the gate is dropped unsettled the computation never
//! finishes, like a request that hangs forever.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use verstore_core::Contents;
use verstore_state::{Payload, Setter, Store};

use crate::{HarnessError, HarnessResult};

/// Settling handle for one deferred computation
#[derive(Debug)]
pub struct Gate<V, E> {
    tx: oneshot::Sender<Result<V, E>>,
}

/// Create a gate and the deferred contents it controls
pub fn gate<V, E>() -> (Gate<V, E>, Contents<V, E>)
where
    V: Send + 'static,
    E: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let contents = Contents::deferred(async move {
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => std::future::pending().await,
        }
    });
    (Gate { tx }, contents)
}

impl<V, E> Gate<V, E> {
    /// Settle with `outcome`
    pub fn settle(self, outcome: Result<V, E>) -> HarnessResult<()> {
        self.tx.send(outcome).map_err(|_| HarnessError::GateClosed)
    }

    pub fn resolve(self, value: V) -> HarnessResult<()> {
        self.settle(Ok(value))
    }

    pub fn reject(self, error: E) -> HarnessResult<()> {
        self.settle(Err(error))
    }

    /// Has the computation been dropped?
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Gates handed out by a gated setter, oldest first
pub struct GateQueue<V, E> {
    gates: Arc<Mutex<VecDeque<Gate<V, E>>>>,
}

impl<V, E> GateQueue<V, E> {
    /// Gate of the oldest unsettled call
    pub fn next(&self) -> HarnessResult<Gate<V, E>> {
        self.gates.lock().pop_front().ok_or(HarnessError::NoGate)
    }

    /// Gate of the newest call
    pub fn latest(&self) -> HarnessResult<Gate<V, E>> {
        self.gates.lock().pop_back().ok_or(HarnessError::NoGate)
    }

    pub fn len(&self) -> usize {
        self.gates.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.lock().is_empty()
    }
}

/// Setter whose every call starts a deferred write settled through the queue
pub fn gated_setter<V: Payload, E: Payload>(store: &Store<V, E>) -> (Setter<V, E>, GateQueue<V, E>) {
    let gates: Arc<Mutex<VecDeque<Gate<V, E>>>> = Arc::new(Mutex::new(VecDeque::new()));
    let sink = Arc::clone(&gates);
    let setter = store.create_setter(move || {
        let (gate, contents) = gate();
        sink.lock().push_back(gate);
        contents
    });
    (setter, GateQueue { gates })
}
