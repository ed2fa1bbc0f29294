//! Expiration notifications raised by the sweep.
//!
//! Listeners receive read-only descriptors and answer with a decision
//! value; nothing is shared or mutated between listeners.

use std::fmt;

use crate::cache::ExpirationPolicy;

/// An entry the sweep found expired and proposes to evict.
#[derive(Debug)]
pub struct ExpiringEntry<'a, K, V> {
    pub key: &'a K,
    pub value: &'a V,
    pub policy: &'a ExpirationPolicy,
}

/// An entry the sweep has just evicted.
#[derive(Debug)]
pub struct ExpiredEntry<'a, K, V> {
    pub key: &'a K,
    pub value: &'a V,
    /// Whether the value will be disposed, as resolved by the store
    /// default and the listeners called before this one.
    pub dispose: bool,
}

/// Answer to [`ExpirationListener::on_expiring`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiringDecision {
    #[default]
    Proceed,
    /// Keep the entry for this tick. It is inspected again on the next one.
    Cancel,
}

/// Answer to [`ExpirationListener::on_expired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisposeDecision {
    /// Leave the dispose flag as it is.
    #[default]
    Default,
    /// Dispose the value regardless of the store setting.
    Dispose,
    /// Do not dispose the value.
    Keep,
}

impl DisposeDecision {
    pub(crate) fn apply(self, dispose: bool) -> bool {
        match self {
            DisposeDecision::Default => dispose,
            DisposeDecision::Dispose => true,
            DisposeDecision::Keep => false,
        }
    }
}

/// Receives eviction notifications from the sweep.
///
/// Called on the sweep thread with no map lock held, so listeners may read
/// and write the store. They must not call `sweep` itself: the tick lock is
/// held for the whole dispatch.
///
/// A panicking listener is logged and treated as having returned the default.
pub trait ExpirationListener<K, V>: Send + Sync {
    fn on_expiring(&self, _entry: &ExpiringEntry<'_, K, V>) -> ExpiringDecision {
        ExpiringDecision::Proceed
    }

    fn on_expired(&self, _entry: &ExpiredEntry<'_, K, V>) -> DisposeDecision {
        DisposeDecision::Default
    }
}

/// Why an entry left the cache. Used in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    /// Evicted by the sweep after its policy expired.
    Expired,
    /// Removed with `remove`.
    Removed,
    /// Removed with `clear`.
    Cleared,
}

impl fmt::Display for RemovalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalCause::Expired => write!(f, "expired"),
            RemovalCause::Removed => write!(f, "removed"),
            RemovalCause::Cleared => write!(f, "cleared"),
        }
    }
}
