//! # Outbound Port - NotificationSource
//!
//! Where notifications come from. Adapters: the in-process bus
//! (`adapters::bus`), the devnet, and the websocket log subscription in
//! `lc-03-json-rpc`.

use async_trait::async_trait;
use thiserror::Error;

pub use shared_bus::NotificationStream;

/// Failures opening a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("notification source unreachable: {0}")]
    Unreachable(String),

    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("subscription refused: {0}")]
    Refused(String),
}

/// Driven port: opens a live, non-replaying stream of one channel.
///
/// Dropping the returned stream must release the remote subscription.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Subscribe to `channel`. Returns once the subscription is live, so
    /// every notification emitted after this returns is on the stream.
    async fn subscribe(&self, channel: &str) -> Result<NotificationStream, SourceError>;
}
