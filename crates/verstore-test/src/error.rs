//! Error types for the test harness

use thiserror::Error;
use verstore_core::StoreError;

/// Harness errors
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Gate closed: the deferred computation was dropped")]
    GateClosed,

    #[error("No gate queued for this setter")]
    NoGate,

    #[error("Write {0} is not a pending deferred write")]
    NotPending(usize),

    #[error("Store error: {0}")]
    Store(#[from] StoreError<String>),
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;
