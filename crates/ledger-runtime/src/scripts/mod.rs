//! Scripts: thin entry points over a [`LedgerContext`](crate::LedgerContext).
//!
//! Every script takes the context by reference and returns a typed result;
//! printing and exit codes belong to the binary.

pub mod correlate;
pub mod deploy;
pub mod raffle;
pub mod send;
pub mod watch;

pub use correlate::{submit_and_correlate, Correlated, Correlation};
pub use deploy::{deploy, load_bytecode, Deployment};
pub use raffle::{raffle_demo, RaffleRound};
pub use send::{send, SendRequest};
pub use watch::{watch, FieldFilter};

use crate::context::{Backend, LedgerContext};
use crate::errors::ScriptError;
use lc_01_submit_confirm::ConfirmError;
use primitive_types::U256;
use serde_json::Value;

/// Current head block number.
pub async fn block_number(ctx: &LedgerContext) -> Result<u64, ScriptError> {
    let head = match ctx.backend() {
        Backend::Devnet(devnet) => devnet.block_number(),
        Backend::Remote(ledger) => ledger.block_number().await.map_err(ConfirmError::from)?,
    };
    ledger_telemetry::LEDGER_HEAD.set(i64::try_from(head).unwrap_or(i64::MAX));
    Ok(head)
}

/// Read a uint from a JSON value: `0x` hex, decimal string or number.
pub(crate) fn parse_uint(value: &Value) -> Result<U256, ScriptError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16).ok(),
            None => U256::from_dec_str(s).ok(),
        },
        _ => None,
    };
    parsed.ok_or_else(|| ScriptError::Unexpected(format!("expected an unsigned integer, got {value}")))
}
