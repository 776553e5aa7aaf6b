//! # Notification Publisher
//!
//! Defines the publishing side of the bus.

use crate::subscriber::{ChannelTable, NotificationStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use shared_types::Notification;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

/// Trait for publishing notifications to the bus.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Publish a notification on its channel.
    ///
    /// # Returns
    ///
    /// The number of live subscribers that received it.
    async fn publish(&self, notification: Notification) -> usize;

    /// Total notifications published, including dropped ones.
    fn notifications_published(&self) -> u64;
}

/// Per-channel state.
pub(crate) struct ChannelEntry {
    pub(crate) sender: broadcast::Sender<Notification>,
    pub(crate) subscribers: usize,
}

/// In-memory implementation of the notification bus.
///
/// Uses one `tokio::sync::broadcast` channel per notification channel.
pub struct InMemoryNotificationBus {
    /// Open channels keyed by name.
    channels: ChannelTable,

    /// Next delivery sequence number.
    sequence: AtomicU64,

    /// Total notifications published.
    published: AtomicU64,

    /// Per-subscriber buffer capacity.
    capacity: usize,
}

impl InMemoryNotificationBus {
    /// Create a bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus with the given per-subscriber capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            sequence: AtomicU64::new(1),
            published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to `channel`, opening it if needed.
    #[must_use]
    pub fn subscribe(&self, channel: &str) -> Subscription {
        let receiver = {
            let mut channels = match self.channels.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let entry = channels.entry(channel.to_string()).or_insert_with(|| {
                debug!(channel = channel, "Opening notification channel");
                let (sender, _) = broadcast::channel(self.capacity);
                ChannelEntry {
                    sender,
                    subscribers: 0,
                }
            });
            entry.subscribers += 1;
            entry.sender.subscribe()
        };

        debug!(channel = channel, "New subscription created");
        Subscription::new(receiver, channel.to_string(), self.channels.clone())
    }

    /// Subscribe and wrap the subscription as a stream.
    #[must_use]
    pub fn notification_stream(&self, channel: &str) -> NotificationStream {
        self.subscribe(channel).into_stream()
    }

    /// Live subscribers on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .ok()
            .and_then(|channels| channels.get(channel).map(|e| e.subscribers))
            .unwrap_or(0)
    }

    /// Names of the channels that currently have subscribers.
    #[must_use]
    pub fn open_channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .read()
            .map(|channels| channels.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Per-subscriber capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryNotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationPublisher for InMemoryNotificationBus {
    async fn publish(&self, notification: Notification) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let channel = notification.channel.clone();
        let notification = notification.with_sequence(sequence);

        let sender = self
            .channels
            .read()
            .ok()
            .and_then(|channels| channels.get(&channel).map(|e| e.sender.clone()));

        let Some(sender) = sender else {
            debug!(
                channel = %channel,
                sequence = sequence,
                "Notification dropped (no subscribers)"
            );
            return 0;
        };

        match sender.send(notification) {
            Ok(receivers) => {
                debug!(
                    channel = %channel,
                    sequence = sequence,
                    receivers = receivers,
                    "Notification published"
                );
                receivers
            }
            Err(_) => {
                debug!(channel = %channel, "Notification dropped (receivers gone)");
                0
            }
        }
    }

    fn notifications_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Payload;

    fn note(channel: &str) -> Notification {
        Notification::new(channel, Payload::new())
    }

    #[tokio::test]
    async fn test_publish_no_subscribers() {
        let bus = InMemoryNotificationBus::new();
        assert_eq!(bus.publish(note("WinnerPicked")).await, 0);
        assert_eq!(bus.notifications_published(), 1);
    }

    #[tokio::test]
    async fn test_publish_reaches_only_its_channel() {
        let bus = InMemoryNotificationBus::new();
        let _a = bus.subscribe("WinnerPicked");
        let _b = bus.subscribe("WinnerPicked");
        let _c = bus.subscribe("RaffleEnter");

        assert_eq!(bus.publish(note("WinnerPicked")).await, 2);
        assert_eq!(bus.publish(note("RaffleEnter")).await, 1);
        assert_eq!(bus.subscriber_count("WinnerPicked"), 2);
        assert_eq!(
            bus.open_channels(),
            vec!["RaffleEnter".to_string(), "WinnerPicked".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sequence_numbers_increase() {
        let bus = InMemoryNotificationBus::new();
        let mut sub = bus.subscribe("c");
        bus.publish(note("c")).await;
        bus.publish(note("c")).await;
        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        assert!(second.sequence > first.sequence);
    }

    #[test]
    fn test_default_bus() {
        let bus = InMemoryNotificationBus::default();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert!(bus.open_channels().is_empty());
    }
}
