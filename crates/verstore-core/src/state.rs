//! Lifecycle state tags
//!
//! A store is always in exactly one of three states:
//! - HasValue: a settled value is available
//! - Loading: a deferred write is in flight
//! - HasError: the most recent deferred write failed

use std::fmt;

/// Payload-free lifecycle tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum StoreState {
    /// Settled value available
    #[default]
    HasValue = 0x00,

    /// Deferred write in flight
    Loading = 0x01,

    /// Last deferred write failed
    HasError = 0x02,
}

impl StoreState {
    /// Short lowercase name, used in log fields
    pub fn as_str(self) -> &'static str {
        match self {
            StoreState::HasValue => "has_value",
            StoreState::Loading => "loading",
            StoreState::HasError => "has_error",
        }
    }

    /// Is a settled value or error available (i.e. not loading)?
    #[inline]
    pub fn is_settled(self) -> bool {
        !matches!(self, StoreState::Loading)
    }
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
