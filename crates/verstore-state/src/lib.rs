//! Verstore State - Versioned single-value store
//!
//! This crate implements the store engine:
//! - Lifecycle transitions (has value / loading / has error)
//! - Revision tracking and last-write-wins for deferred writes
//! - Observer registration and synchronous notification
//! - Bound setters and updaters
//! - Binding adapter that re-derives reads on every notification

pub mod config;
pub mod observer;
pub mod store;
pub mod handlers;
pub mod binding;

pub use config::*;
pub use observer::*;
pub use store::*;
pub use handlers::*;
pub use binding::*;

pub use verstore_core::{
    Completion, Contents, Loadable, Read, Snapshot, StoreError, StoreResult, StoreState, Suspended,
};
