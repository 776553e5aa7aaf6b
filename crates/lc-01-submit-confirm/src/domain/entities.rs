//! Pending requests and confirmation results.

use crate::domain::errors::ConfirmError;
use serde::{Deserialize, Serialize};
use shared_types::{LedgerStatus, RequestId, Timestamp};
use std::fmt;
use std::time::Duration;

/// A submitted state-changing call that has not been finalized yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Handle returned by the ledger.
    pub request_id: RequestId,
    /// Method (or contract) name, for logs.
    pub action: String,
    /// When the ledger acknowledged the submission.
    pub submitted_at: Timestamp,
    /// Confirmations the submitter asked for by default.
    pub required_confirmations: u64,
}

impl PendingRequest {
    /// Create a pending request.
    pub fn new(
        request_id: RequestId,
        action: impl Into<String>,
        submitted_at: Timestamp,
        required_confirmations: u64,
    ) -> Self {
        Self {
            request_id,
            action: action.into(),
            submitted_at,
            required_confirmations,
        }
    }
}

/// Outcome of waiting for durability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfirmationStatus {
    /// Included with at least the required confirmations.
    Confirmed,
    /// Rejected by the ledger after submission.
    Reverted,
    /// The local wait budget ran out. The remote action may still land.
    TimedOut,
}

impl ConfirmationStatus {
    /// Confirmed and Reverted never change again; TimedOut says nothing
    /// about the remote outcome.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Reverted)
    }
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed => write!(f, "Confirmed"),
            Self::Reverted => write!(f, "Reverted"),
            Self::TimedOut => write!(f, "TimedOut"),
        }
    }
}

/// Result of [`await_confirmation`](crate::ConfirmationService::await_confirmation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationResult {
    pub request_id: RequestId,
    pub status: ConfirmationStatus,
    /// Confirmations observed when the result was produced.
    pub confirmations: u64,
    pub block_number: Option<u64>,
    /// Revert reason.
    pub reason: Option<String>,
    /// Receipt payload reported by the ledger.
    pub final_payload: Option<serde_json::Value>,
}

impl ConfirmationResult {
    pub(crate) fn confirmed(request_id: RequestId, status: LedgerStatus) -> Self {
        Self {
            request_id,
            status: ConfirmationStatus::Confirmed,
            confirmations: status.confirmations,
            block_number: status.block_number,
            reason: None,
            final_payload: status.payload,
        }
    }

    pub(crate) fn reverted(request_id: RequestId, status: LedgerStatus) -> Self {
        Self {
            request_id,
            status: ConfirmationStatus::Reverted,
            confirmations: status.confirmations,
            block_number: status.block_number,
            reason: Some(
                status
                    .reason
                    .unwrap_or_else(|| "reverted without reason".to_string()),
            ),
            final_payload: status.payload,
        }
    }

    pub(crate) fn timed_out(request_id: RequestId, last_seen: &LedgerStatus) -> Self {
        Self {
            request_id,
            status: ConfirmationStatus::TimedOut,
            confirmations: last_seen.confirmations,
            block_number: last_seen.block_number,
            reason: None,
            final_payload: None,
        }
    }

    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.status == ConfirmationStatus::Confirmed
    }

    /// Look up a field of the final payload (e.g. `contractAddress`).
    #[must_use]
    pub fn payload_field(&self, key: &str) -> Option<&serde_json::Value> {
        self.final_payload.as_ref().and_then(|p| p.get(key))
    }

    /// Turn Reverted and TimedOut into errors, for scripts that treat
    /// anything but Confirmed as a failure.
    pub fn into_confirmed(self, max_wait: Option<Duration>) -> Result<Self, ConfirmError> {
        match self.status {
            ConfirmationStatus::Confirmed => Ok(self),
            ConfirmationStatus::Reverted => Err(ConfirmError::ActionRejected {
                request_id: Some(self.request_id),
                reason: self.reason.unwrap_or_default(),
            }),
            ConfirmationStatus::TimedOut => Err(ConfirmError::TimedOut {
                request_id: self.request_id,
                max_wait: max_wait.unwrap_or_default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settled_statuses() {
        assert!(ConfirmationStatus::Confirmed.is_settled());
        assert!(ConfirmationStatus::Reverted.is_settled());
        assert!(!ConfirmationStatus::TimedOut.is_settled());
    }

    #[test]
    fn test_reverted_keeps_reason() {
        let result = ConfirmationResult::reverted(
            RequestId::new("0x1"),
            LedgerStatus::reverted("Raffle__NotOpen"),
        );
        assert_eq!(result.reason.as_deref(), Some("Raffle__NotOpen"));

        let err = result.into_confirmed(None).unwrap_err();
        assert!(matches!(err, ConfirmError::ActionRejected { ref reason, .. } if reason == "Raffle__NotOpen"));
    }

    #[test]
    fn test_payload_field() {
        let status = LedgerStatus::included(3, 1)
            .with_payload(json!({"contractAddress": "0x00000000000000000000000000000000000000aa"}));
        let result = ConfirmationResult::confirmed(RequestId::new("0x2"), status);
        assert!(result.is_confirmed());
        assert!(result.payload_field("contractAddress").is_some());
        assert_eq!(result.block_number, Some(3));
    }

    #[test]
    fn test_timed_out_into_error() {
        let result =
            ConfirmationResult::timed_out(RequestId::new("0x3"), &LedgerStatus::included(1, 0));
        let err = result
            .into_confirmed(Some(Duration::from_millis(500)))
            .unwrap_err();
        assert!(matches!(err, ConfirmError::TimedOut { .. }));
    }
}
