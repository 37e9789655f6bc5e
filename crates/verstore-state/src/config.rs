//! Store configuration

use tokio::runtime::Handle;

/// Label used in log fields when none is configured
pub const DEFAULT_LABEL: &str = "store";

/// Store configuration
#[derive(Clone, Debug)]
pub struct StoreConfig<V> {
    /// Initial settled value
    pub initial: V,
    /// Name reported in log fields
    pub label: String,
    /// Runtime that drives deferred writes
    ///
    /// When unset, the runtime current at construction is used, else the one
    /// current at write time.
    pub runtime: Option<Handle>,
}

impl<V> StoreConfig<V> {
    pub fn new(initial: V) -> Self {
        StoreConfig {
            initial,
            label: DEFAULT_LABEL.to_string(),
            runtime: None,
        }
    }

    /// Set the log label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Pin deferred writes to a specific runtime
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

impl<V: Default> Default for StoreConfig<V> {
    fn default() -> Self {
        Self::new(V::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: StoreConfig<u32> = StoreConfig::default();
        assert_eq!(config.initial, 0);
        assert_eq!(config.label, DEFAULT_LABEL);
        assert!(config.runtime.is_none());
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = StoreConfig::new("x")
            .with_label("profile")
            .with_runtime(Handle::current());

        assert_eq!(config.initial, "x");
        assert_eq!(config.label, "profile");
        assert!(config.runtime.is_some());
    }
}
