//! Expiring Cache - A thread-safe keyed cache
//!
//! Provides absolute and sliding expiration, background sweeping with
//! cancellable expiration notifications, optional value disposal and
//! single-flight fetches.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
mod tasks;

pub use cache::{
    CacheEntry, CacheKey, CacheStats, CacheStore, CacheStoreBuilder, CacheValue,
    DisposeDecision, ExpirationKind, ExpirationListener, ExpirationPolicy, ExpiredEntry,
    ExpiringDecision, ExpiringEntry, SweepReport,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
