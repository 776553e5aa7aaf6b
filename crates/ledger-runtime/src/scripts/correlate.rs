//! Register-before-submit correlation.
//!
//! The watch is registered, and its subscription live, before the action is
//! submitted. Watching after submission can miss a notification emitted in
//! between, since subscriptions never replay.

use crate::context::LedgerContext;
use crate::errors::ScriptError;
use lc_01_submit_confirm::ConfirmationResult;
use lc_02_event_correlator::{EventCorrelatorApi, Predicate};
use shared_types::{Action, ActionParams, Notification};
use std::time::Duration;
use tracing::debug;

/// What to wait for once the action lands.
#[derive(Clone)]
pub struct Correlation {
    pub channel: String,
    pub predicate: Predicate,
    pub timeout: Duration,
}

impl Correlation {
    pub fn new(channel: impl Into<String>, predicate: Predicate, timeout: Duration) -> Self {
        Self {
            channel: channel.into(),
            predicate,
            timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Correlated {
    pub result: ConfirmationResult,
    pub notification: Notification,
}

/// Watch, submit and confirm, then await the watch.
///
/// A refused, reverted or timed-out action fails the whole call and
/// releases the watch.
pub async fn submit_and_correlate(
    ctx: &LedgerContext,
    action: &Action,
    params: &ActionParams,
    correlation: Correlation,
) -> Result<Correlated, ScriptError> {
    let handle = ctx
        .correlator()
        .watch_for(&correlation.channel, correlation.predicate, correlation.timeout)
        .await?;
    debug!(
        channel = %correlation.channel,
        waiter_id = %handle.id(),
        action = %action.method,
        "Watch registered before submit"
    );

    let result = ctx
        .confirmations()
        .submit_and_confirm(action, params, ctx.config().block_confirmations)
        .await?
        .into_confirmed(ctx.config().max_wait)?;

    let notification = handle.await?;
    Ok(Correlated {
        result,
        notification,
    })
}
