//! Sweep Task
//!
//! Dedicated thread that periodically runs the store's expiration sweep.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Handle to a running sweep thread. Dropping it stops the thread.
pub(crate) struct Sweeper {
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawns a thread that calls `tick` every `interval`.
    ///
    /// Ticks run one after another on the same thread, so a slow tick delays
    /// the next one instead of overlapping it. A panicking tick is logged
    /// and the loop keeps going.
    ///
    /// # Arguments
    /// * `name` - Thread name, shown in panics and debuggers
    /// * `interval` - Time between the end of one tick and the start of the next
    /// * `tick` - The sweep to run
    pub(crate) fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                info!(
                    "Starting cache sweeper with interval of {} ms",
                    interval.as_millis()
                );

                loop {
                    {
                        let mut stopped = thread_signal.stopped.lock();
                        if !*stopped {
                            thread_signal.wake.wait_for(&mut stopped, interval);
                        }
                        if *stopped {
                            break;
                        }
                    }

                    if panic::catch_unwind(AssertUnwindSafe(|| tick())).is_err() {
                        warn!("Cache sweep tick panicked; sweeper keeps running");
                    }
                }

                debug!("Cache sweeper stopped");
            })
            .map_err(|e| CacheError::Internal(format!("failed to spawn sweeper: {}", e)))?;

        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Signals the thread to stop and waits for the current tick to finish.
    pub(crate) fn stop(&mut self) {
        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();

        if let Some(handle) = self.handle.take() {
            // The last store handle can be dropped from inside a listener,
            // i.e. on this very thread; it exits on its own after the tick.
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("Cache sweeper thread terminated with a panic");
            }
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[test]
    fn test_sweeper_ticks_periodically() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();

        let sweeper = Sweeper::spawn("test-sweeper", Duration::from_millis(20), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(250));
        drop(sweeper);

        assert!(ticks.load(Ordering::SeqCst) >= 3, "Sweeper should have ticked");
    }

    #[test]
    fn test_sweeper_stops_promptly() {
        let mut sweeper = Sweeper::spawn("test-sweeper", Duration::from_secs(3600), || {}).unwrap();
        assert!(sweeper.is_running());

        let started = Instant::now();
        sweeper.stop();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!sweeper.is_running());
    }

    #[test]
    fn test_sweeper_survives_panicking_tick() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();

        let sweeper = Sweeper::spawn("test-sweeper", Duration::from_millis(10), move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first tick fails");
            }
        })
        .unwrap();

        thread::sleep(Duration::from_millis(200));
        drop(sweeper);

        assert!(ticks.load(Ordering::SeqCst) >= 2, "Sweeper should tick after a panic");
    }

    #[test]
    fn test_ticks_never_overlap() {
        let inside = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));
        let (i, o) = (inside.clone(), overlap.clone());

        let sweeper = Sweeper::spawn("test-sweeper", Duration::from_millis(1), move || {
            if i.fetch_add(1, Ordering::SeqCst) > 0 {
                o.fetch_add(1, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_millis(15));
            i.fetch_sub(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(150));
        drop(sweeper);

        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }
}
