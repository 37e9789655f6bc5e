//! Error types for the versioned store

use thiserror::Error;

/// Store errors, generic over the upstream error type `E`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError<E> {
    /// Operation not permitted in the current lifecycle state
    #[error("Invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// A later write committed first
    #[error("Contents update canceled")]
    Canceled,

    /// The deferred computation itself failed
    #[error("Upstream error: {0}")]
    Upstream(E),

    #[error("No tokio runtime available to drive a deferred write")]
    NoRuntime,

    /// The resolver was dropped before settling
    #[error("Deferred write abandoned before settling")]
    Abandoned,
}

impl<E> StoreError<E> {
    /// Is this the superseded-write condition?
    pub fn is_canceled(&self) -> bool {
        matches!(self, StoreError::Canceled)
    }

    /// Borrow the upstream payload, if any
    pub fn upstream(&self) -> Option<&E> {
        match self {
            StoreError::Upstream(e) => Some(e),
            _ => None,
        }
    }

    /// Take the upstream payload, if any
    pub fn into_upstream(self) -> Option<E> {
        match self {
            StoreError::Upstream(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T, E> = Result<T, StoreError<E>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canceled_message() {
        let err: StoreError<String> = StoreError::Canceled;
        assert_eq!(err.to_string(), "Contents update canceled");
        assert!(err.is_canceled());
    }

    #[test]
    fn test_upstream_payload() {
        let err = StoreError::Upstream("whoops".to_string());
        assert_eq!(err.to_string(), "Upstream error: whoops");
        assert_eq!(err.upstream().map(String::as_str), Some("whoops"));
        assert!(!err.is_canceled());
        assert_eq!(err.into_upstream(), Some("whoops".to_string()));
    }

    #[test]
    fn test_non_upstream_has_no_payload() {
        let err: StoreError<String> = StoreError::InvalidOperation("busy");
        assert_eq!(err.upstream(), None);
        assert_eq!(err.to_string(), "Invalid operation: busy");
    }
}
