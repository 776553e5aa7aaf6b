//! Memo of settled confirmation results.
//!
//! Awaiting the same request twice must not produce contradictory answers.
//! Once a request is Reverted that answer is final. A Confirmed answer is
//! reused for any threshold it already satisfies; a higher threshold polls
//! the ledger again and the memo keeps the deepest result seen.

use crate::domain::entities::{ConfirmationResult, ConfirmationStatus};
use dashmap::DashMap;
use shared_types::RequestId;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

struct SettledEntry {
    result: ConfirmationResult,
    settled_at: Instant,
}

/// Settled (Confirmed or Reverted) results keyed by request id.
#[derive(Default)]
pub struct SettledResults {
    entries: DashMap<RequestId, SettledEntry>,
}

impl SettledResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a stored result that answers an await for `required`
    /// confirmations, if any.
    pub fn lookup(&self, request_id: &RequestId, required: u64) -> Option<ConfirmationResult> {
        let entry = self.entries.get(request_id)?;
        let result = &entry.result;
        let answers = match result.status {
            ConfirmationStatus::Reverted => true,
            ConfirmationStatus::Confirmed => result.confirmations >= required,
            ConfirmationStatus::TimedOut => false,
        };
        answers.then(|| result.clone())
    }

    /// Store a settled result. TimedOut results are ignored.
    pub fn record(&self, result: &ConfirmationResult) {
        if !result.status.is_settled() {
            return;
        }

        self.entries
            .entry(result.request_id.clone())
            .and_modify(|existing| {
                let deeper = existing.result.status == ConfirmationStatus::Confirmed
                    && result.status == ConfirmationStatus::Confirmed
                    && result.confirmations > existing.result.confirmations;
                if deeper {
                    existing.result = result.clone();
                }
            })
            .or_insert_with(|| SettledEntry {
                result: result.clone(),
                settled_at: Instant::now(),
            });
    }

    /// Drop results settled longer than `max_age` ago.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&self, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.settled_at.elapsed() < max_age);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Pruned settled confirmation results");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
