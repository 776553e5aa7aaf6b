//! # Inbound Port - SubmitAndConfirmApi
//!
//! Driving port used by scripts and the correlation flow.

use crate::domain::{ConfirmError, ConfirmationResult, PendingRequest};
use async_trait::async_trait;
use serde_json::Value;
use shared_types::{Action, ActionParams};
use std::time::Duration;

/// Submit state-changing actions and wait for them to become durable.
///
/// # Example
///
/// ```rust,ignore
/// let pending = api.submit(&Action::call(raffle, "enterRaffle"), &params).await?;
/// let result = api.await_confirmation(&pending, 1).await?;
/// assert!(result.is_confirmed());
/// ```
#[async_trait]
pub trait SubmitAndConfirmApi: Send + Sync {
    /// Hand the action to the ledger. Does not wait for inclusion.
    async fn submit(
        &self,
        action: &Action,
        params: &ActionParams,
    ) -> Result<PendingRequest, ConfirmError>;

    /// Wait until `request` has `required` confirmations, reverts, or the
    /// configured wait budget runs out.
    async fn await_confirmation(
        &self,
        request: &PendingRequest,
        required: u64,
    ) -> Result<ConfirmationResult, ConfirmError>;

    /// Same as `await_confirmation` with an explicit budget.
    async fn await_confirmation_within(
        &self,
        request: &PendingRequest,
        required: u64,
        max_wait: Duration,
    ) -> Result<ConfirmationResult, ConfirmError>;

    /// Read-only query.
    async fn call(&self, action: &Action, params: &ActionParams) -> Result<Value, ConfirmError>;
}
