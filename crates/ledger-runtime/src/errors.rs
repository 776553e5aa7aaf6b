//! Script errors.

use crate::config::ConfigError;
use lc_01_submit_confirm::ConfirmError;
use lc_02_event_correlator::CorrelationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Confirm(#[from] ConfirmError),

    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    #[error("chain id mismatch: configured {expected}, ledger reports {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("{0} needs the in-process devnet")]
    DevnetOnly(&'static str),

    #[error("unexpected ledger response: {0}")]
    Unexpected(String),

    #[error("bytecode: {0}")]
    Bytecode(String),
}
