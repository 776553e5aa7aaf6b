//! # Outbound Ports - Ledger and Clock
//!
//! The confirmation service reaches the ledger only through
//! [`LedgerGateway`]. Adapters: `lc-03-json-rpc` (remote node) and
//! `lc-04-devnet` (in-process chain).

use async_trait::async_trait;
use serde_json::Value;
use shared_types::{Action, ActionParams, LedgerStatus, RequestId, Timestamp};
use thiserror::Error;

/// Failures reported by a ledger adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The ledger refused the action at submission (validation, funds,
    /// custom error).
    #[error("rejected: {0}")]
    Rejected(String),

    /// Transport-level failure.
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// The ledger has no record of the request yet.
    #[error("unknown request {0}")]
    UnknownRequest(RequestId),

    /// Malformed or unexpected response.
    #[error("protocol: {0}")]
    Protocol(String),
}

/// Driven port for the remote ledger.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Submit a state-changing action and return the ledger's handle.
    async fn submit(
        &self,
        action: &Action,
        params: &ActionParams,
    ) -> Result<RequestId, GatewayError>;

    /// Current durability of a submitted request.
    ///
    /// `confirmations` is reported in the gateway's own convention and the
    /// service compares it to the threshold verbatim. `JsonRpcLedger` counts
    /// the inclusion block (`head - block + 1`, so inclusion is already one
    /// confirmation). `Devnet` counts blocks mined on top of it
    /// (`head - block`, so inclusion is zero). A threshold of `n` therefore
    /// waits one block longer on the devnet than on a node.
    async fn get_status(&self, request_id: &RequestId) -> Result<LedgerStatus, GatewayError>;

    /// Read-only call. No confirmations involved.
    async fn call(&self, action: &Action, params: &ActionParams) -> Result<Value, GatewayError>;
}

/// Time source used to stamp pending requests.
pub trait TimeSource: Send + Sync {
    /// Current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_source_is_after_2020() {
        assert!(SystemTimeSource.now() > 1_577_836_800_000);
    }
}
