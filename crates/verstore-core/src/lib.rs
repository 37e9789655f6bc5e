//! Verstore Core - Fundamental types for the versioned store
//!
//! This crate defines the types shared by the store and its collaborators:
//! - Lifecycle state tags (StoreState)
//! - Loadables, snapshots and synchronous reads
//! - Write contents (immediate or deferred)
//! - Completions and their resolvers
//! - Error taxonomy

pub mod state;
pub mod contents;
pub mod completion;
pub mod loadable;
pub mod error;

pub use state::*;
pub use contents::*;
pub use completion::*;
pub use loadable::*;
pub use error::*;
