//! Expiration Policy Module
//!
//! Describes when a cache entry becomes stale: a fixed lifetime from
//! creation (absolute) or a lifetime renewed on every read (sliding).

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{datetime_to_nanos, duration_to_nanos, nanos_to_datetime};

// == Expiration Kind ==
/// The flavour of an expiration policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationKind {
    /// Lifetime counted from creation.
    Absolute,
    /// Lifetime counted from the last read.
    Sliding,
}

// == Expiration Policy ==
/// Expiration state of a single entry.
///
/// The anchor is the creation time for absolute policies and the last
/// access time for sliding ones. It is kept as Unix nanoseconds in an
/// atomic so a sliding touch only needs a shared reference.
///
/// A zero duration means the policy never expires.
pub struct ExpirationPolicy {
    kind: ExpirationKind,
    duration: Duration,
    anchor_ns: AtomicI64,
}

impl ExpirationPolicy {
    // == Constructors ==
    /// Absolute policy: the entry expires `duration` after it was stored.
    pub fn duration(duration: Duration) -> Self {
        Self::with_kind(ExpirationKind::Absolute, duration)
    }

    /// Sliding policy: the entry expires once it has not been read for `duration`.
    pub fn sliding(duration: Duration) -> Self {
        Self::with_kind(ExpirationKind::Sliding, duration)
    }

    /// A policy that never expires.
    pub fn never() -> Self {
        Self::duration(Duration::ZERO)
    }

    fn with_kind(kind: ExpirationKind, duration: Duration) -> Self {
        Self {
            kind,
            duration,
            anchor_ns: AtomicI64::new(0),
        }
    }

    // == Accessors ==
    pub fn kind(&self) -> ExpirationKind {
        self.kind
    }

    pub fn lifetime(&self) -> Duration {
        self.duration
    }

    /// Whether this policy can ever report expired.
    pub fn can_expire(&self) -> bool {
        !self.duration.is_zero()
    }

    /// Creation time (absolute) or last access time (sliding).
    pub fn anchor(&self) -> DateTime<Utc> {
        nanos_to_datetime(self.anchor_ns.load(Ordering::Acquire))
    }

    // == Is Expired ==
    /// Inspects the policy without touching it.
    ///
    /// Boundary condition: expired once `now - anchor >= duration`. A clock
    /// that moved backwards counts as no time elapsed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if !self.can_expire() {
            return false;
        }

        self.elapsed_ns(now) >= duration_to_nanos(self.duration)
    }

    /// Remaining lifetime, or `None` if the policy never expires.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        if !self.can_expire() {
            return None;
        }

        let left = duration_to_nanos(self.duration).saturating_sub(self.elapsed_ns(now));
        Some(Duration::from_nanos(left.max(0) as u64))
    }

    /// The instant the policy expires if it is not touched again.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if !self.can_expire() {
            return None;
        }

        let anchor = self.anchor_ns.load(Ordering::Acquire);
        Some(nanos_to_datetime(
            anchor.saturating_add(duration_to_nanos(self.duration)),
        ))
    }

    // == Touch ==
    /// Renews a sliding policy. No-op for absolute policies.
    pub fn touch(&self, now: DateTime<Utc>) {
        if self.kind == ExpirationKind::Sliding {
            self.anchor_ns
                .fetch_max(datetime_to_nanos(now), Ordering::AcqRel);
        }
    }

    // == Reset ==
    /// Re-arms the policy as if it had just been created at `now`.
    pub fn reset(&self, now: DateTime<Utc>) {
        self.anchor_ns
            .store(datetime_to_nanos(now), Ordering::Release);
    }

    fn elapsed_ns(&self, now: DateTime<Utc>) -> i64 {
        datetime_to_nanos(now)
            .saturating_sub(self.anchor_ns.load(Ordering::Acquire))
            .max(0)
    }
}

impl Clone for ExpirationPolicy {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            duration: self.duration,
            anchor_ns: AtomicI64::new(self.anchor_ns.load(Ordering::Acquire)),
        }
    }
}

impl fmt::Debug for ExpirationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpirationPolicy")
            .field("kind", &self.kind)
            .field("duration", &self.duration)
            .field("anchor", &self.anchor())
            .finish()
    }
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self::never()
    }
}
