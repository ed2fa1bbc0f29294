//! Cache Entry Module
//!
//! Pairs a stored value with its expiration policy.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::{CacheValue, ExpirationPolicy};

// == Cache Entry ==
/// A single cache entry: the value and the policy deciding when it goes stale.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    policy: ExpirationPolicy,
    created_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    // == Constructors ==
    /// Creates an entry and arms `policy` at `now`.
    pub fn new(value: V, policy: ExpirationPolicy, now: DateTime<Utc>) -> Self {
        policy.reset(now);
        Self {
            value,
            policy,
            created_at: now,
        }
    }

    /// Shorthand for an entry with an absolute policy of `duration`.
    pub fn with_duration(value: V, duration: Duration, now: DateTime<Utc>) -> Self {
        Self::new(value, ExpirationPolicy::duration(duration), now)
    }

    // == Accessors ==
    /// The value, without renewing a sliding policy.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// The value as a consumer read: renews a sliding policy.
    pub fn read(&self, now: DateTime<Utc>) -> &V {
        self.policy.touch(now);
        &self.value
    }

    pub fn policy(&self) -> &ExpirationPolicy {
        &self.policy
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // == Is Expired ==
    /// Inspection path used by the sweep; never touches the policy.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.policy.is_expired(now)
    }

    pub fn into_value(self) -> V {
        self.value
    }
}

impl<V: CacheValue> CacheEntry<V> {
    /// Consumes the entry and releases its value.
    pub fn dispose_value(self) -> anyhow::Result<()> {
        self.value.dispose()
    }
}
