//! # Inbound Port - EventCorrelatorApi

use crate::domain::{CorrelationError, Predicate};
use crate::handle::WatchHandle;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Register predicate-based interest in a future notification.
///
/// # Example
///
/// ```rust,ignore
/// let winner = correlator
///     .watch_for("WinnerPicked", field_equals("requestId", json!(id)), Duration::from_secs(5))
///     .await?;
/// fulfill(id).await?;
/// let notification = winner.await?;
/// ```
#[async_trait]
pub trait EventCorrelatorApi: Send + Sync {
    /// Register a waiter on `channel` resolving on the first notification
    /// for which `predicate` holds, or failing at `deadline`.
    ///
    /// Returns once the channel subscription is live.
    async fn watch(
        &self,
        channel: &str,
        predicate: Predicate,
        deadline: Instant,
    ) -> Result<WatchHandle, CorrelationError>;

    /// `watch` with a deadline relative to now.
    async fn watch_for(
        &self,
        channel: &str,
        predicate: Predicate,
        timeout: Duration,
    ) -> Result<WatchHandle, CorrelationError> {
        self.watch(channel, predicate, Instant::now() + timeout).await
    }
}
