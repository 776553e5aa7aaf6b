//! In-process bus as a notification source.

use crate::ports::outbound::{NotificationSource, NotificationStream, SourceError};
use async_trait::async_trait;
use shared_bus::InMemoryNotificationBus;

#[async_trait]
impl NotificationSource for InMemoryNotificationBus {
    async fn subscribe(&self, channel: &str) -> Result<NotificationStream, SourceError> {
        Ok(self.notification_stream(channel))
    }
}
