//! Clock Module
//!
//! Time source consumed by the cache. The wall clock is the default;
//! `ManualClock` lets tests move time forward without sleeping.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

// == System Clock ==
/// Wall clock backed by `Utc::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// == Manual Clock ==
/// A clock that only moves when told to.
///
/// Nanosecond resolution, which is also the resolution expiration
/// policies keep their timestamps in.
pub struct ManualClock {
    now_ns: AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now_ns: AtomicI64::new(datetime_to_nanos(start)),
        }
    }

    /// Creates a clock frozen at 2020-01-01T00:00:00Z.
    pub fn starting_at_epoch() -> Self {
        Self::new(nanos_to_datetime(1_577_836_800_000_000_000))
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now_ns.fetch_add(duration_to_nanos(by), Ordering::SeqCst);
    }

    /// Jumps the clock to `to`, which may be in the past.
    pub fn set(&self, to: DateTime<Utc>) {
        self.now_ns.store(datetime_to_nanos(to), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at_epoch()
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock")
            .field("now", &self.now())
            .finish()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        nanos_to_datetime(self.now_ns.load(Ordering::SeqCst))
    }
}

// == Utility Functions ==
const NANOS_PER_SEC: i64 = 1_000_000_000;

pub(crate) fn duration_to_nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

/// Unix nanoseconds, saturating outside the years 1677..2262.
pub(crate) fn datetime_to_nanos(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_nanos_opt()
        .unwrap_or(if dt.timestamp() < 0 { i64::MIN } else { i64::MAX })
}

pub(crate) fn nanos_to_datetime(ns: i64) -> DateTime<Utc> {
    let secs = ns.div_euclid(NANOS_PER_SEC);
    let subsec = ns.rem_euclid(NANOS_PER_SEC) as u32;
    DateTime::from_timestamp(secs, subsec).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
