//! Verstore Test Harness - Race testing and store validation
//!
//! This crate provides:
//! - Hand-settled deferred sources (gates)
//! - Snapshot recording of observer notifications
//! - Race fuzzing against a reference model
//! - Test logging setup
//! - End-to-end store scenarios

pub mod error;
pub mod gate;
pub mod recorder;
pub mod race;
pub mod logging;

#[cfg(test)]
mod scenarios;

pub use error::*;
pub use gate::*;
pub use recorder::*;
pub use race::*;
pub use logging::*;
