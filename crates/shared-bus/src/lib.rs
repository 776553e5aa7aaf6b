//! # Shared Bus - In-Process Notification Bus
//!
//! Carries ledger notifications from an in-process ledger (the devnet) to
//! any number of channel subscribers.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │   Ledger     │                    │  Correlator  │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Channel     │ ─────────┘
//!                  │  "WinnerPicked"  subscribe()
//!                  └──────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Notifications on one channel reach every subscriber in publish order.
//! - Nothing is buffered for a channel without subscribers: publishing to it
//!   drops the notification (no replay).
//! - A channel exists while it has at least one live [`Subscription`]; the
//!   last drop closes it.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use publisher::{InMemoryNotificationBus, NotificationPublisher};
pub use subscriber::{NotificationStream, Subscription, SubscriptionError};

/// Maximum notifications buffered per subscriber before it lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }
}
