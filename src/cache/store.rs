//! Cache Store Module
//!
//! Main cache engine: a keyed map of entries with pluggable expiration,
//! a background sweep and single-flight fetches.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::builder::CacheStoreBuilder;
use crate::cache::keyed_lock::KeyedLocks;
use crate::cache::listener::{
    DisposeDecision, ExpirationListener, ExpiredEntry, ExpiringDecision, ExpiringEntry,
    RemovalCause,
};
use crate::cache::stats::StatsCounter;
use crate::cache::{CacheEntry, CacheKey, CacheStats, CacheValue, ExpirationPolicy};
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::Sweeper;

/// Produces the policy for entries added without an explicit one.
pub type DefaultPolicyFn = Box<dyn Fn() -> ExpirationPolicy + Send + Sync>;

type Listeners<K, V> = Vec<Arc<dyn ExpirationListener<K, V>>>;

// == Sweep Report ==
/// Outcome of one sweep tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries present when the tick started
    pub inspected: usize,
    /// Entries evicted
    pub expired: usize,
    /// Expired entries kept because a listener cancelled
    pub cancelled: usize,
    /// Evicted values that were disposed
    pub disposed: usize,
}

// == Shared State ==
/// Everything the store and its sweep thread share.
struct Shared<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    listeners: RwLock<Listeners<K, V>>,
    default_policy: DefaultPolicyFn,
    clock: Arc<dyn Clock>,
    dispose_values_on_removal: bool,
    allow_null_values: bool,
    stats: StatsCounter,
    flights: KeyedLocks<K, tokio::sync::Mutex<()>>,
    tick: Mutex<()>,
}

impl<K, V> Shared<K, V>
where
    K: CacheKey,
    V: CacheValue + Clone,
{
    fn check_key(&self, key: &K) -> Result<()> {
        if key.is_null() {
            return Err(CacheError::null_key());
        }
        Ok(())
    }

    /// Consumer read: renews sliding policies, no stats.
    fn read(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        self.entries.read().get(key).map(|entry| entry.read(now).clone())
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let value = self.read(key);
        match value {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        value
    }

    fn insert(
        &self,
        key: K,
        value: V,
        override_existing: bool,
        expiration: Option<ExpirationPolicy>,
    ) -> Result<()> {
        self.check_key(&key)?;

        if value.is_null() && !self.allow_null_values {
            return Err(CacheError::null_value());
        }

        let policy = expiration.unwrap_or_else(|| (self.default_policy)());

        let mut entries = self.entries.write();
        if !override_existing && entries.contains_key(&key) {
            debug!("Cache add skipped, key already present: {:?}", key);
            return Ok(());
        }

        debug!(
            "Cache add: {:?} ({:?}, {} ms, replacing: {})",
            key,
            policy.kind(),
            policy.lifetime().as_millis(),
            entries.contains_key(&key)
        );
        let entry = CacheEntry::new(value, policy, self.clock.now());
        entries.insert(key, entry);

        Ok(())
    }

    /// Disposes the value of an entry that left the cache. Failures are
    /// logged, never raised.
    fn release(&self, key: &K, entry: CacheEntry<V>, cause: RemovalCause) {
        match panic::catch_unwind(AssertUnwindSafe(|| entry.dispose_value())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to dispose {} cache value {:?}: {:#}", cause, key, e),
            Err(_) => warn!("Disposing {} cache value {:?} panicked", cause, key),
        }
    }

    fn sweep(&self) -> SweepReport {
        let _tick = self.tick.lock();
        let now = self.clock.now();

        let (inspected, candidates) = {
            let entries = self.entries.read();
            let candidates: Vec<(K, V, ExpirationPolicy)> = entries
                .iter()
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(key, entry)| (key.clone(), entry.value().clone(), entry.policy().clone()))
                .collect();
            (entries.len(), candidates)
        };

        let mut report = SweepReport {
            inspected,
            ..SweepReport::default()
        };

        if candidates.is_empty() {
            debug!("Cache sweep: no expired entries found");
            return report;
        }

        let listeners = self.listeners.read().clone();

        for (key, value, policy) in candidates {
            let expiring = ExpiringEntry {
                key: &key,
                value: &value,
                policy: &policy,
            };
            if self.cancelled(&listeners, &expiring) {
                debug!("Cache expiration cancelled by listener: {:?}", key);
                report.cancelled += 1;
                continue;
            }

            // A reader may have renewed the entry, or an add replaced it,
            // since the snapshot was taken.
            let removed = {
                let mut entries = self.entries.write();
                match entries.get(&key) {
                    Some(entry) if entry.is_expired(now) => entries.remove(&key),
                    _ => None,
                }
            };
            let Some(entry) = removed else {
                continue;
            };

            self.stats.record_expiration();
            report.expired += 1;

            let dispose = self.resolve_dispose(&listeners, &key, entry.value());
            if dispose {
                self.release(&key, entry, RemovalCause::Expired);
                report.disposed += 1;
            }
        }

        info!(
            "Cache sweep: removed {} expired entries ({} cancelled, {} disposed)",
            report.expired, report.cancelled, report.disposed
        );
        report
    }

    /// Every listener is asked, even after one has cancelled.
    fn cancelled(&self, listeners: &Listeners<K, V>, entry: &ExpiringEntry<'_, K, V>) -> bool {
        listeners.iter().fold(false, |cancelled, listener| {
            let answer = panic::catch_unwind(AssertUnwindSafe(|| listener.on_expiring(entry)));
            let decision = match answer {
                Ok(decision) => decision,
                Err(_) => {
                    warn!("Expiring listener panicked for {:?}", entry.key);
                    ExpiringDecision::Proceed
                }
            };
            cancelled || decision == ExpiringDecision::Cancel
        })
    }

    fn resolve_dispose(&self, listeners: &Listeners<K, V>, key: &K, value: &V) -> bool {
        listeners
            .iter()
            .fold(self.dispose_values_on_removal, |dispose, listener| {
                let expired = ExpiredEntry {
                    key,
                    value,
                    dispose,
                };
                match panic::catch_unwind(AssertUnwindSafe(|| listener.on_expired(&expired))) {
                    Ok(decision) => decision.apply(dispose),
                    Err(_) => {
                        warn!("Expired listener panicked for {:?}", key);
                        DisposeDecision::Default.apply(dispose)
                    }
                }
            })
    }
}

// == Cache Store ==
/// Thread-safe keyed cache with per-entry expiration.
///
/// Cloning is not supported; share a store with `Arc<CacheStore<K, V>>`.
/// Dropping the store stops its sweep thread.
pub struct CacheStore<K, V>
where
    K: CacheKey,
    V: CacheValue + Clone,
{
    shared: Arc<Shared<K, V>>,
    sweeper: Option<Sweeper>,
    sweep_interval: Duration,
}

impl<K, V> CacheStore<K, V>
where
    K: CacheKey,
    V: CacheValue + Clone,
{
    // == Constructors ==
    /// Creates a store from `config` using the system clock.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> CacheStoreBuilder<K, V> {
        CacheStoreBuilder::new()
    }

    pub(crate) fn assemble(
        config: CacheConfig,
        default_policy: DefaultPolicyFn,
        clock: Arc<dyn Clock>,
        listeners: Listeners<K, V>,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            entries: RwLock::new(HashMap::new()),
            listeners: RwLock::new(listeners),
            default_policy,
            clock,
            dispose_values_on_removal: config.dispose_values_on_removal,
            allow_null_values: config.allow_null_values,
            stats: StatsCounter::default(),
            flights: KeyedLocks::new(),
            tick: Mutex::new(()),
        });

        let sweeper = if config.sweep_interval.is_zero() {
            None
        } else {
            let tick_shared = Arc::clone(&shared);
            Some(Sweeper::spawn(
                "cache-sweeper",
                config.sweep_interval,
                move || {
                    tick_shared.sweep();
                },
            )?)
        };

        Ok(Self {
            shared,
            sweeper,
            sweep_interval: config.sweep_interval,
        })
    }

    // == Contains ==
    /// Returns whether an unexpired entry exists for `key`. Never touches.
    pub fn contains(&self, key: &K) -> Result<bool> {
        self.shared.check_key(key)?;
        let now = self.shared.clock.now();
        Ok(self
            .shared
            .entries
            .read()
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now)))
    }

    // == Get ==
    /// Retrieves a value by key, renewing its sliding policy on a hit.
    ///
    /// Entries stay readable until the sweep evicts them, including ones
    /// whose policy already reports expired.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        self.shared.check_key(key)?;
        Ok(self.shared.lookup(key))
    }

    // == Add ==
    /// Stores a value under `key`.
    ///
    /// An existing entry is kept unless `override_existing` is set. When the
    /// value is stored, its policy (`expiration`, or the store default) is
    /// armed fresh. Never raises expiration notifications.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `override_existing` - Replace an existing entry
    /// * `expiration` - Policy for this entry; `None` uses the default policy
    pub fn add(
        &self,
        key: K,
        value: V,
        override_existing: bool,
        expiration: Option<ExpirationPolicy>,
    ) -> Result<()> {
        self.shared.insert(key, value, override_existing, expiration)
    }

    // == Get Or Fetch ==
    /// Returns the cached value for `key`, computing it with `factory` on a miss.
    ///
    /// Concurrent callers missing the same key run `factory` once; the others
    /// wait and then read the stored result. Callers for other keys are not
    /// blocked. A factory error is returned as is and leaves no entry behind.
    ///
    /// With `override_existing` the cache is bypassed and the factory result
    /// replaces any existing entry.
    ///
    /// Shares its per-key locks with the async variant. While another fetch
    /// for the same key is running, this blocks the calling thread, so call
    /// it from async code only through `spawn_blocking`.
    ///
    /// # Panics
    /// Panics if it has to wait for the key from inside an async runtime.
    pub fn get_from_cache_or_fetch<E, F>(
        &self,
        key: K,
        factory: F,
        override_existing: bool,
        expiration: Option<ExpirationPolicy>,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> std::result::Result<V, E>,
        E: From<CacheError>,
    {
        let shared = &*self.shared;
        shared.check_key(&key)?;

        if !override_existing {
            if let Some(value) = shared.lookup(&key) {
                return Ok(value);
            }
        }

        let slot = shared.flights.slot(&key);
        let _flight = match slot.try_lock() {
            Ok(guard) => guard,
            Err(_) => slot.blocking_lock(),
        };

        if !override_existing {
            if let Some(value) = shared.read(&key) {
                return Ok(value);
            }
        }

        debug!("Cache fetch: invoking factory for {:?}", key);
        let value = factory()?;
        shared.insert(key, value.clone(), true, expiration)?;
        Ok(value)
    }

    /// Async variant of [`get_from_cache_or_fetch`](Self::get_from_cache_or_fetch).
    ///
    /// The per-key section is held across the factory's `.await`.
    pub async fn get_from_cache_or_fetch_async<E, F, Fut>(
        &self,
        key: K,
        factory: F,
        override_existing: bool,
        expiration: Option<ExpirationPolicy>,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: From<CacheError>,
    {
        let shared = &*self.shared;
        shared.check_key(&key)?;

        if !override_existing {
            if let Some(value) = shared.lookup(&key) {
                return Ok(value);
            }
        }

        let slot = shared.flights.slot(&key);
        let _flight = slot.lock().await;

        if !override_existing {
            if let Some(value) = shared.read(&key) {
                return Ok(value);
            }
        }

        debug!("Cache fetch: awaiting factory for {:?}", key);
        let value = factory().await?;
        shared.insert(key, value.clone(), true, expiration)?;
        Ok(value)
    }

    // == Remove ==
    /// Removes an entry, disposing its value if configured. No-op if absent.
    ///
    /// Never raises expiration notifications.
    pub fn remove(&self, key: &K) -> Result<()> {
        self.shared.check_key(key)?;

        let removed = self.shared.entries.write().remove(key);
        if let Some(entry) = removed {
            debug!("Cache remove: {:?}", key);
            self.shared.stats.record_removals(1);
            if self.shared.dispose_values_on_removal {
                self.shared.release(key, entry, RemovalCause::Removed);
            }
        }

        Ok(())
    }

    // == Clear ==
    /// Removes every entry, disposing values if configured.
    ///
    /// Never raises expiration notifications.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.shared.entries.write());

        debug!("Cache clear: {} entries", drained.len());
        self.shared.stats.record_removals(drained.len());

        if self.shared.dispose_values_on_removal {
            for (key, entry) in drained {
                self.shared.release(&key, entry, RemovalCause::Cleared);
            }
        }
    }

    // == Listeners ==
    /// Registers a listener for expiration notifications.
    pub fn subscribe(&self, listener: Arc<dyn ExpirationListener<K, V>>) {
        self.shared.listeners.write().push(listener);
    }

    // == Sweep ==
    /// Runs one sweep tick on the calling thread.
    ///
    /// Shares a tick lock with the background sweeper, so the two never
    /// run at the same time.
    pub fn sweep(&self) -> SweepReport {
        self.shared.sweep()
    }

    /// Stops the background sweeper. Idempotent; also done on drop.
    pub fn shutdown(&mut self) {
        if let Some(mut sweeper) = self.sweeper.take() {
            sweeper.stop();
            info!("Cache sweeper shut down");
        }
    }

    // == Introspection ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.shared.stats.snapshot(self.len())
    }

    /// Returns the current number of entries, expired or not.
    pub fn len(&self) -> usize {
        self.shared.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entries.read().is_empty()
    }

    /// The policy of the entry under `key`, as a snapshot. Never touches.
    pub fn policy(&self, key: &K) -> Result<Option<ExpirationPolicy>> {
        self.shared.check_key(key)?;
        Ok(self
            .shared
            .entries
            .read()
            .get(key)
            .map(|entry| entry.policy().clone()))
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper.as_ref().is_some_and(Sweeper::is_running)
    }

    /// Number of keys with a fetch currently in progress.
    pub fn pending_fetches(&self) -> usize {
        self.shared.flights.in_flight()
    }
}

impl<K, V> fmt::Debug for CacheStore<K, V>
where
    K: CacheKey,
    V: CacheValue + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("len", &self.len())
            .field("sweep_interval", &self.sweep_interval)
            .field("dispose_values_on_removal", &self.shared.dispose_values_on_removal)
            .field("allow_null_values", &self.shared.allow_null_values)
            .finish()
    }
}

impl<K, V> Drop for CacheStore<K, V>
where
    K: CacheKey,
    V: CacheValue + Clone,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
