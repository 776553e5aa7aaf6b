//! Wait for one notification on a channel.

use crate::context::LedgerContext;
use crate::errors::ScriptError;
use lc_02_event_correlator::predicates::{any, field_equals_ignore_case};
use lc_02_event_correlator::EventCorrelatorApi;
use shared_types::Notification;
use std::time::Duration;
use tracing::info;

/// `field == value`, case-insensitive so addresses match in any casing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: String,
    pub equals: String,
}

pub async fn watch(
    ctx: &LedgerContext,
    channel: &str,
    filter: Option<FieldFilter>,
    timeout: Duration,
) -> Result<Notification, ScriptError> {
    let predicate = match filter {
        Some(f) => field_equals_ignore_case(f.field, f.equals),
        None => any(),
    };
    let handle = ctx.correlator().watch_for(channel, predicate, timeout).await?;
    info!(channel, timeout_ms = timeout.as_millis() as u64, "Watching");
    Ok(handle.await?)
}
