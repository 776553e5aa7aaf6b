//! # Channel Subscriber
//!
//! Defines the subscription side of the bus.

use crate::publisher::ChannelEntry;
use futures::stream::{self, BoxStream, StreamExt};
use shared_types::Notification;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub(crate) type ChannelTable = Arc<RwLock<HashMap<String, ChannelEntry>>>;

/// Boxed stream of notifications from one channel.
pub type NotificationStream = BoxStream<'static, Notification>;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The channel was closed.
    #[error("Notification channel closed")]
    Closed,

    /// The subscriber fell behind and notifications were overwritten. The
    /// subscription is finished.
    #[error("Subscriber lagged, {0} notifications lost")]
    Lagged(u64),
}

/// A subscription handle for one channel.
///
/// When dropped, the channel's subscriber count is decremented and the
/// channel is closed once nobody listens.
///
/// A subscription that lags behind the channel capacity ends rather than
/// skipping ahead: a gap in delivery is never hidden from the consumer.
pub struct Subscription {
    receiver: broadcast::Receiver<Notification>,
    channel: String,
    channels: ChannelTable,
    lagged: bool,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<Notification>,
        channel: String,
        channels: ChannelTable,
    ) -> Self {
        Self {
            receiver,
            channel,
            channels,
            lagged: false,
        }
    }

    /// Receive the next notification.
    ///
    /// Returns `None` once the channel is closed or the subscriber lagged.
    pub async fn recv(&mut self) -> Option<Notification> {
        if self.lagged {
            return None;
        }
        match self.receiver.recv().await {
            Ok(n) => Some(n),
            Err(broadcast::error::RecvError::Closed) => None,
            Err(broadcast::error::RecvError::Lagged(count)) => {
                self.mark_lagged(count);
                None
            }
        }
    }

    /// Receive without waiting.
    ///
    /// - `Ok(Some(n))` - a notification was ready
    /// - `Ok(None)` - nothing ready
    /// - `Err(SubscriptionError::Closed)` - the channel was closed
    /// - `Err(SubscriptionError::Lagged)` - notifications were lost; every
    ///   later call fails the same way
    pub fn try_recv(&mut self) -> Result<Option<Notification>, SubscriptionError> {
        if self.lagged {
            return Err(SubscriptionError::Lagged(0));
        }
        match self.receiver.try_recv() {
            Ok(n) => Ok(Some(n)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(SubscriptionError::Closed),
            Err(broadcast::error::TryRecvError::Lagged(count)) => {
                self.mark_lagged(count);
                Err(SubscriptionError::Lagged(count))
            }
        }
    }

    fn mark_lagged(&mut self, count: u64) {
        self.lagged = true;
        warn!(
            channel = %self.channel,
            lost = count,
            "Subscriber lagged past channel capacity, ending subscription"
        );
    }

    /// Channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Turn the subscription into a stream. The subscription lives as long
    /// as the stream.
    #[must_use]
    pub fn into_stream(self) -> NotificationStream {
        stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|n| (n, sub))
        })
        .boxed()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut channels = match self.channels.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(entry) = channels.get_mut(&self.channel) else {
            return;
        };

        entry.subscribers = entry.subscribers.saturating_sub(1);
        if entry.subscribers == 0 {
            channels.remove(&self.channel);
            debug!(channel = %self.channel, "Notification channel closed");
        } else {
            debug!(channel = %self.channel, "Subscription dropped");
        }
    }
}
