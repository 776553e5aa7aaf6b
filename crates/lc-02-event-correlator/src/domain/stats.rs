//! Counters for the correlator.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for the event correlator.
#[derive(Debug, Default)]
pub struct CorrelatorStats {
    /// Waiters registered
    pub total_watches: AtomicU64,
    /// Waiters resolved by a matching notification
    pub total_matched: AtomicU64,
    /// Waiters that hit their deadline
    pub total_timeouts: AtomicU64,
    /// Waiters abandoned by their caller
    pub total_cancelled: AtomicU64,
    /// Channel subscriptions opened
    pub subscriptions_opened: AtomicU64,
    /// Channel subscriptions closed after the last waiter left
    pub subscriptions_closed: AtomicU64,
    /// Subscriptions whose stream ended under live waiters
    pub stream_failures: AtomicU64,
}

/// Point-in-time copy of [`CorrelatorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelatorStatsSnapshot {
    pub watches: u64,
    pub matched: u64,
    pub timeouts: u64,
    pub cancelled: u64,
    pub subscriptions_opened: u64,
    pub subscriptions_closed: u64,
    pub stream_failures: u64,
}

impl CorrelatorStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CorrelatorStatsSnapshot {
        CorrelatorStatsSnapshot {
            watches: self.total_watches.load(Ordering::Relaxed),
            matched: self.total_matched.load(Ordering::Relaxed),
            timeouts: self.total_timeouts.load(Ordering::Relaxed),
            cancelled: self.total_cancelled.load(Ordering::Relaxed),
            subscriptions_opened: self.subscriptions_opened.load(Ordering::Relaxed),
            subscriptions_closed: self.subscriptions_closed.load(Ordering::Relaxed),
            stream_failures: self.stream_failures.load(Ordering::Relaxed),
        }
    }
}
