//! Per-key lock registry backing single-flight fetches.
//!
//! A lock exists for a key only while at least one caller holds a
//! [`KeySlot`] for it. The last slot dropped removes the registry entry.

use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

// == Keyed Locks ==
#[derive(Debug)]
pub(crate) struct KeyedLocks<K, L> {
    slots: Mutex<HashMap<K, Arc<L>>>,
}

impl<K, L> KeyedLocks<K, L>
where
    K: Eq + Hash + Clone,
    L: Default,
{
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the lock for `key`, creating it on first use.
    pub(crate) fn slot(&self, key: &K) -> KeySlot<'_, K, L> {
        let lock = {
            let mut slots = self.slots.lock();
            match slots.get(key) {
                Some(lock) => Arc::clone(lock),
                None => {
                    let lock = Arc::new(L::default());
                    slots.insert(key.clone(), Arc::clone(&lock));
                    lock
                }
            }
        };

        KeySlot {
            registry: self,
            key: key.clone(),
            lock,
        }
    }

    /// Number of keys with an outstanding slot.
    pub(crate) fn in_flight(&self) -> usize {
        self.slots.lock().len()
    }
}

// == Key Slot ==
/// Shared handle to one key's lock. Lock it through `Deref`.
pub(crate) struct KeySlot<'a, K, L>
where
    K: Eq + Hash + Clone,
    L: Default,
{
    registry: &'a KeyedLocks<K, L>,
    key: K,
    lock: Arc<L>,
}

impl<K, L> Deref for KeySlot<'_, K, L>
where
    K: Eq + Hash + Clone,
    L: Default,
{
    type Target = L;

    fn deref(&self) -> &L {
        &self.lock
    }
}

impl<K, L> Drop for KeySlot<'_, K, L>
where
    K: Eq + Hash + Clone,
    L: Default,
{
    fn drop(&mut self) {
        let mut slots = self.registry.slots.lock();
        // Clones are only handed out under the registry lock, so the count
        // cannot grow while we hold it: two means the registry and us.
        if Arc::strong_count(&self.lock) == 2 {
            slots.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    type SyncLocks = KeyedLocks<String, Mutex<()>>;

    #[test]
    fn test_slot_reclaimed_after_drop() {
        let locks = SyncLocks::new();

        {
            let slot = locks.slot(&"a".to_string());
            let _guard = slot.lock();
            assert_eq!(locks.in_flight(), 1);
        }

        assert_eq!(locks.in_flight(), 0);
    }

    #[test]
    fn test_same_key_shares_lock() {
        let locks = SyncLocks::new();
        let first = locks.slot(&"a".to_string());
        let second = locks.slot(&"a".to_string());

        assert!(Arc::ptr_eq(&first.lock, &second.lock));
        assert_eq!(locks.in_flight(), 1);

        drop(first);
        assert_eq!(locks.in_flight(), 1);
        drop(second);
        assert_eq!(locks.in_flight(), 0);
    }

    #[test]
    fn test_distinct_keys_do_not_block() {
        let locks = SyncLocks::new();
        let a = locks.slot(&"a".to_string());
        let _held = a.lock();

        let b = locks.slot(&"b".to_string());
        assert!(b.try_lock().is_some());
    }

    #[test]
    fn test_same_key_is_exclusive() {
        let locks = Arc::new(SyncLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let slot = locks.slot(&"shared".to_string());
                    let _guard = slot.lock();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_async_slot_reclaimed() {
        let locks: KeyedLocks<u32, tokio::sync::Mutex<()>> = KeyedLocks::new();

        {
            let slot = locks.slot(&1);
            let _guard = slot.lock().await;
            assert_eq!(locks.in_flight(), 1);
        }

        assert_eq!(locks.in_flight(), 0);
    }
}
