//! Devnet errors.

use lc_01_submit_confirm::GatewayError;
use lc_02_event_correlator::SourceError;
use shared_types::{Address, U256};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DevnetError {
    #[error("devnet is unreachable")]
    Unreachable,

    #[error("unknown contract type '{0}'")]
    UnknownContract(String),

    #[error("no contract at {0}")]
    NoContractAt(Address),

    #[error("insufficient funds: {account} has {balance}, needs {required}")]
    InsufficientFunds {
        account: Address,
        balance: U256,
        required: U256,
    },

    #[error("{0}")]
    Execution(String),
}

impl From<DevnetError> for GatewayError {
    fn from(err: DevnetError) -> Self {
        match err {
            DevnetError::Unreachable => GatewayError::Unreachable("devnet is unreachable".into()),
            other => GatewayError::Rejected(other.to_string()),
        }
    }
}

impl From<DevnetError> for SourceError {
    fn from(err: DevnetError) -> Self {
        match err {
            DevnetError::Unreachable => SourceError::Unreachable("devnet is unreachable".into()),
            other => SourceError::Refused(other.to_string()),
        }
    }
}
