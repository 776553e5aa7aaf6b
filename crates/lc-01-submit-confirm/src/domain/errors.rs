//! SubmitAndConfirm error types.
//!
//! None of these are retried by the protocol layer; retry policy belongs to
//! the caller.

use crate::ports::outbound::GatewayError;
use shared_types::RequestId;
use std::time::Duration;
use thiserror::Error;

/// Error type for submit / await.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmError {
    /// The ledger refused the action.
    #[error("Action rejected: {reason}")]
    ActionRejected {
        /// Set when the refusal came after a request id was issued.
        request_id: Option<RequestId>,
        reason: String,
    },

    /// The ledger could not be reached.
    ///
    /// Resubmitting is a caller decision and may duplicate the state change.
    #[error("Ledger unreachable: {0}")]
    TransientConnectivity(String),

    /// The local wait budget ran out. The remote action is not rolled back.
    #[error("Timed out after {max_wait:?} waiting for {request_id}")]
    TimedOut {
        request_id: RequestId,
        max_wait: Duration,
    },

    /// The ledger answered with something this client cannot interpret.
    #[error("Ledger protocol error: {0}")]
    Protocol(String),
}

impl From<GatewayError> for ConfirmError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected(reason) => Self::ActionRejected {
                request_id: None,
                reason,
            },
            GatewayError::Unreachable(msg) => Self::TransientConnectivity(msg),
            GatewayError::UnknownRequest(id) => {
                Self::Protocol(format!("ledger does not know request {id}"))
            }
            GatewayError::Protocol(msg) => Self::Protocol(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_mapping() {
        assert!(matches!(
            ConfirmError::from(GatewayError::Rejected("nope".into())),
            ConfirmError::ActionRejected { request_id: None, .. }
        ));
        assert!(matches!(
            ConfirmError::from(GatewayError::Unreachable("down".into())),
            ConfirmError::TransientConnectivity(_)
        ));
    }

    #[test]
    fn test_display() {
        let err = ConfirmError::TransientConnectivity("connection refused".into());
        assert_eq!(err.to_string(), "Ledger unreachable: connection refused");
    }
}
