//! Submit a state-changing call and wait for it.

use crate::context::LedgerContext;
use crate::errors::ScriptError;
use lc_01_submit_confirm::{ConfirmationResult, SubmitAndConfirmApi};
use primitive_types::U256;
use serde_json::Value;
use shared_types::{Action, ActionParams, Address};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    pub target: Address,
    /// Method name or full signature, e.g. `store(uint256)`.
    pub method: String,
    pub args: Vec<Value>,
    /// Pre-encoded calldata; wins over `method` + `args` on remote ledgers.
    pub calldata: Option<Vec<u8>>,
    pub value: U256,
    /// Defaults to the network's block confirmations.
    pub confirmations: Option<u64>,
    /// Defaults to the configured max wait.
    pub max_wait: Option<Duration>,
}

impl SendRequest {
    pub fn new(target: Address, method: impl Into<String>) -> Self {
        Self {
            target,
            method: method.into(),
            ..Self::default()
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Submit and wait. Reverted and timed-out outcomes are returned, not
/// raised; only refusal and connectivity failures are errors.
pub async fn send(ctx: &LedgerContext, request: SendRequest) -> Result<ConfirmationResult, ScriptError> {
    let mut action = Action::call(request.target, request.method);
    if let Some(calldata) = request.calldata {
        action = action.with_calldata(calldata);
    }
    let mut params = ActionParams::new()
        .with_args(request.args)
        .with_value(request.value);
    if let Some(sender) = ctx.default_sender() {
        params = params.with_from(sender);
    }

    let service = ctx.confirmations();
    let required = request
        .confirmations
        .unwrap_or(ctx.config().block_confirmations);
    let pending = service.submit(&action, &params).await?;
    let result = match request.max_wait.or(ctx.config().max_wait) {
        Some(limit) => service.await_confirmation_within(&pending, required, limit).await?,
        None => service.await_confirmation(&pending, required).await?,
    };
    Ok(result)
}
