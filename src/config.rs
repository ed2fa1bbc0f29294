//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::ExpirationPolicy;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime given to entries added without an explicit policy; `None` = never expire
    #[serde(with = "millis_opt")]
    pub default_ttl: Option<Duration>,
    /// Whether the default lifetime is sliding rather than absolute
    pub sliding_by_default: bool,
    /// Interval between background sweeps; zero disables the sweeper
    #[serde(with = "millis")]
    pub sweep_interval: Duration,
    /// Dispose values when they leave the cache
    pub dispose_values_on_removal: bool,
    /// Accept null values in `add` and fetch
    pub allow_null_values: bool,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_TTL_MS` - Default lifetime in milliseconds, 0 = never (default: 0)
    /// - `CACHE_SLIDING` - Default lifetime is sliding (default: false)
    /// - `CACHE_SWEEP_INTERVAL_MS` - Sweep interval in milliseconds, 0 = off (default: 0)
    /// - `CACHE_DISPOSE_ON_REMOVAL` - Dispose removed values (default: false)
    /// - `CACHE_ALLOW_NULL_VALUES` - Accept null values (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl: env_parse::<u64>("CACHE_DEFAULT_TTL_MS")
                .map(|ms| Some(Duration::from_millis(ms)).filter(|d| !d.is_zero()))
                .unwrap_or(defaults.default_ttl),
            sliding_by_default: env_parse("CACHE_SLIDING").unwrap_or(defaults.sliding_by_default),
            sweep_interval: env_parse("CACHE_SWEEP_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.sweep_interval),
            dispose_values_on_removal: env_parse("CACHE_DISPOSE_ON_REMOVAL")
                .unwrap_or(defaults.dispose_values_on_removal),
            allow_null_values: env_parse("CACHE_ALLOW_NULL_VALUES")
                .unwrap_or(defaults.allow_null_values),
        }
    }

    /// The policy handed to entries added without an explicit one.
    pub fn default_policy(&self) -> ExpirationPolicy {
        match (self.default_ttl, self.sliding_by_default) {
            (None, _) => ExpirationPolicy::never(),
            (Some(ttl), false) => ExpirationPolicy::duration(ttl),
            (Some(ttl), true) => ExpirationPolicy::sliding(ttl),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: None,
            sliding_by_default: false,
            sweep_interval: Duration::ZERO,
            dispose_values_on_removal: false,
            allow_null_values: false,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod millis_opt {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let ms = Option::<u64>::deserialize(d)?;
        Ok(ms.filter(|ms| *ms > 0).map(Duration::from_millis))
    }
}
