//! Write observability
//!
//! Automatic writes report outcomes here instead of to the caller.

use crate::config::duration_ms;
use huddle_store::{SliceKey, StoreError, UserId};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Sink for debounced write outcomes
pub trait SyncObserver: Send + Sync + fmt::Debug {
    /// A write was scheduled
    fn on_scheduled(&self, _key: &SliceKey, _delay: Duration) {}

    /// A write was accepted by the remote store
    fn on_written(&self, _user: &UserId, _key: &SliceKey) {}

    /// A write failed; it will not be retried until the next change
    fn on_write_failed(&self, user: &UserId, key: &SliceKey, error: &StoreError);
}

/// Observer that logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_scheduled(&self, key: &SliceKey, delay: Duration) {
        tracing::trace!(%key, delay_ms = duration_ms(delay), "write scheduled");
    }

    fn on_written(&self, user: &UserId, key: &SliceKey) {
        tracing::debug!(%user, %key, "slice written");
    }

    fn on_write_failed(&self, user: &UserId, key: &SliceKey, error: &StoreError) {
        tracing::error!(%user, %key, %error, "slice write failed");
    }
}

/// Point-in-time controller counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Timers started
    pub scheduled: u64,
    /// Timers cancelled by a newer value or teardown
    pub superseded: u64,
    /// Writes accepted
    pub written: u64,
    /// Writes rejected or unreachable
    pub failed: u64,
    /// Changes ignored because the gate was closed or the value was the mount value
    pub suppressed: u64,
}

impl SyncStats {
    /// Sum two snapshots
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        Self {
            scheduled: self.scheduled + other.scheduled,
            superseded: self.superseded + other.superseded,
            written: self.written + other.written,
            failed: self.failed + other.failed,
            suppressed: self.suppressed + other.suppressed,
        }
    }
}

/// Live counters behind [`SyncStats`]
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) scheduled: AtomicU64,
    pub(crate) superseded: AtomicU64,
    pub(crate) written: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) suppressed: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SyncStats {
        SyncStats {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huge_delay_is_logged_saturated() {
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
        TracingObserver.on_scheduled(&SliceKey::new("roster"), Duration::MAX);
    }

    #[test]
    fn stats_combine_sums_fields() {
        let a = SyncStats { scheduled: 2, written: 1, ..SyncStats::default() };
        let b = SyncStats { scheduled: 1, failed: 1, ..SyncStats::default() };
        let sum = a.combine(b);
        assert_eq!((sum.scheduled, sum.written, sum.failed), (3, 1, 1));
    }
}
