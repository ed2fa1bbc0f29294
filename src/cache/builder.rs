//! Builder for [`CacheStore`].

use std::sync::Arc;
use std::time::Duration;

use crate::cache::store::DefaultPolicyFn;
use crate::cache::{CacheKey, CacheStore, CacheValue, ExpirationListener, ExpirationPolicy};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::Result;

/// Configures and creates a [`CacheStore`].
///
/// ```
/// use std::time::Duration;
/// use expiring_cache::{CacheStore, ExpirationPolicy};
///
/// let store: CacheStore<String, String> = CacheStore::builder()
///     .default_policy(|| ExpirationPolicy::sliding(Duration::from_secs(30)))
///     .sweep_interval(Duration::from_secs(1))
///     .build()
///     .unwrap();
///
/// store.add("greeting".to_string(), "hello".to_string(), false, None).unwrap();
/// assert_eq!(store.get(&"greeting".to_string()).unwrap().as_deref(), Some("hello"));
/// ```
pub struct CacheStoreBuilder<K, V> {
    config: CacheConfig,
    default_policy: Option<DefaultPolicyFn>,
    clock: Option<Arc<dyn Clock>>,
    listeners: Vec<Arc<dyn ExpirationListener<K, V>>>,
}

impl<K, V> CacheStoreBuilder<K, V>
where
    K: CacheKey,
    V: CacheValue + Clone,
{
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
            default_policy: None,
            clock: None,
            listeners: Vec::new(),
        }
    }

    /// Replaces every setting covered by [`CacheConfig`].
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Policy factory for entries added without an explicit policy.
    ///
    /// Takes precedence over `default_ttl` in the config.
    pub fn default_policy<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> ExpirationPolicy + Send + Sync + 'static,
    {
        self.default_policy = Some(Box::new(factory));
        self
    }

    /// Time source. Defaults to [`SystemClock`].
    pub fn clock<C: Clock + 'static>(mut self, clock: Arc<C>) -> Self {
        self.clock = Some(clock as Arc<dyn Clock>);
        self
    }

    pub fn dispose_values_on_removal(mut self, dispose: bool) -> Self {
        self.config.dispose_values_on_removal = dispose;
        self
    }

    /// Interval of the background sweep. Zero (the default) disables it.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn allow_null_values(mut self, allow: bool) -> Self {
        self.config.allow_null_values = allow;
        self
    }

    /// Registers a listener before the sweeper starts.
    pub fn listener(mut self, listener: Arc<dyn ExpirationListener<K, V>>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Creates the store, starting its sweeper if an interval is set.
    pub fn build(self) -> Result<CacheStore<K, V>> {
        let default_policy: DefaultPolicyFn = match self.default_policy {
            Some(factory) => factory,
            None => {
                let config = self.config.clone();
                Box::new(move || config.default_policy())
            }
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        CacheStore::assemble(self.config, default_policy, clock, self.listeners)
    }
}

impl<K, V> Default for CacheStoreBuilder<K, V>
where
    K: CacheKey,
    V: CacheValue + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
