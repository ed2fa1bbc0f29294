//! Cache Module
//!
//! Provides a thread-safe keyed cache with absolute and sliding expiration,
//! a background sweep and single-flight fetches.

mod builder;
mod entry;
mod keyed_lock;
mod listener;
mod policy;
mod stats;
mod store;
mod traits;


// Re-export public types
pub use builder::CacheStoreBuilder;
pub use entry::CacheEntry;
pub use listener::{
    DisposeDecision, ExpirationListener, ExpiredEntry, ExpiringDecision, ExpiringEntry,
    RemovalCause,
};
pub use policy::{ExpirationKind, ExpirationPolicy};
pub use stats::CacheStats;
pub use store::{CacheStore, DefaultPolicyFn, SweepReport};
pub use traits::{CacheKey, CacheValue};
