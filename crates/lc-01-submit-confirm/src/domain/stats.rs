//! Counters for the confirmation service.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for the confirmation service.
#[derive(Debug, Default)]
pub struct ConfirmStats {
    /// Actions accepted by the ledger
    pub total_submitted: AtomicU64,
    /// Submissions refused by the ledger
    pub total_rejected: AtomicU64,
    /// Awaits that ended Confirmed
    pub total_confirmed: AtomicU64,
    /// Awaits that ended Reverted
    pub total_reverted: AtomicU64,
    /// Awaits that ran out of budget
    pub total_timeouts: AtomicU64,
    /// Calls that failed because the ledger was unreachable
    pub total_connectivity_failures: AtomicU64,
    /// Awaits answered from the settled-results memo
    pub total_memo_hits: AtomicU64,
}

/// Point-in-time copy of [`ConfirmStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfirmStatsSnapshot {
    pub submitted: u64,
    pub rejected: u64,
    pub confirmed: u64,
    pub reverted: u64,
    pub timeouts: u64,
    pub connectivity_failures: u64,
    pub memo_hits: u64,
}

impl ConfirmStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> ConfirmStatsSnapshot {
        ConfirmStatsSnapshot {
            submitted: self.total_submitted.load(Ordering::Relaxed),
            rejected: self.total_rejected.load(Ordering::Relaxed),
            confirmed: self.total_confirmed.load(Ordering::Relaxed),
            reverted: self.total_reverted.load(Ordering::Relaxed),
            timeouts: self.total_timeouts.load(Ordering::Relaxed),
            connectivity_failures: self.total_connectivity_failures.load(Ordering::Relaxed),
            memo_hits: self.total_memo_hits.load(Ordering::Relaxed),
        }
    }
}
