//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use expiring_cache::{
    CacheValue, DisposeDecision, ExpirationListener, ExpiredEntry, ExpiringDecision,
    ExpiringEntry,
};
use parking_lot::Mutex;

static TRACING: Once = Once::new();

/// Installs a test-friendly tracing subscriber once per test binary.
/// Honours `RUST_LOG`; silent by default.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "expiring_cache=warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A value that counts how often it was disposed.
#[derive(Debug, Default)]
pub struct Resource {
    pub name: String,
    disposed: AtomicUsize,
}

impl Resource {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            disposed: AtomicUsize::new(0),
        })
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl CacheValue for Resource {
    fn dispose(&self) -> anyhow::Result<()> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records every notification and answers with preset decisions.
pub struct Recorder<V> {
    pub expiring: Mutex<Vec<String>>,
    pub expired: Mutex<Vec<(String, V, bool)>>,
    cancel: bool,
    dispose: DisposeDecision,
}

impl<V> Recorder<V> {
    pub fn new() -> Arc<Self> {
        Self::with(false, DisposeDecision::Default)
    }

    pub fn cancelling() -> Arc<Self> {
        Self::with(true, DisposeDecision::Default)
    }

    pub fn with(cancel: bool, dispose: DisposeDecision) -> Arc<Self> {
        Arc::new(Self {
            expiring: Mutex::new(Vec::new()),
            expired: Mutex::new(Vec::new()),
            cancel,
            dispose,
        })
    }
}

impl<V: Clone + Send + Sync> ExpirationListener<String, V> for Recorder<V> {
    fn on_expiring(&self, entry: &ExpiringEntry<'_, String, V>) -> ExpiringDecision {
        self.expiring.lock().push(entry.key.clone());
        if self.cancel {
            ExpiringDecision::Cancel
        } else {
            ExpiringDecision::Proceed
        }
    }

    fn on_expired(&self, entry: &ExpiredEntry<'_, String, V>) -> DisposeDecision {
        self.expired
            .lock()
            .push((entry.key.clone(), entry.value.clone(), entry.dispose));
        self.dispose
    }
}
