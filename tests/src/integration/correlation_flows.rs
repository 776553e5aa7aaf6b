//! # Correlation Flows
//!
//! EventCorrelator subscribed to the devnet's notification channels.
//!
//! Watch ordering matters. Notifications are never replayed, so a watch
//! registered after the action was mined can miss its event:
//!
//! ```text
//! after:   submit ─ mine ─ publish ─ watch ─ ... timeout
//! before:  watch ─ submit ─ mine ─ publish ─ resolved
//! ```

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::Harness;
    use lc_01_submit_confirm::SubmitAndConfirmApi;
    use lc_02_event_correlator::predicates::{any, field_equals, field_equals_ignore_case};
    use lc_02_event_correlator::{CorrelationError, EventCorrelatorApi};
    use lc_04_devnet::DevnetConfig;
    use serde_json::json;
    use shared_types::{Action, ActionParams, Address};
    use std::time::Duration;
    use tokio::time::Instant;

    async fn store(harness: &Harness, storage: Address, value: u64) {
        harness
            .confirmations
            .submit(
                &Action::call(storage, "store"),
                &ActionParams::new().with_args(vec![json!(value)]),
            )
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_after_submit_misses_notification() {
        let harness = Harness::new(DevnetConfig::default());
        let storage = harness.deploy("SimpleStorage").await;

        // Automine publishes ValueStored before submit returns.
        store(&harness, storage, 9).await;
        let late = harness
            .correlator
            .watch_for("ValueStored", any(), Duration::from_secs(3))
            .await
            .unwrap();

        let err = late.await.unwrap_err();
        assert!(matches!(err, CorrelationError::CorrelationTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_before_submit_resolves() {
        let harness = Harness::new(DevnetConfig::default());
        let storage = harness.deploy("SimpleStorage").await;

        let early = harness
            .correlator
            .watch_for(
                "ValueStored",
                field_equals_ignore_case("address", storage.to_string()),
                Duration::from_secs(3),
            )
            .await
            .unwrap();
        store(&harness, storage, 9).await;

        let notification = early.await.unwrap();
        assert_eq!(notification.get("value"), Some(&json!("0x9")));
        assert_eq!(harness.correlator.stats().matched, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_waiters_share_one_notification() {
        let harness = Harness::new(DevnetConfig::default());
        let storage = harness.deploy("SimpleStorage").await;

        let broad = harness
            .correlator
            .watch_for("ValueStored", any(), Duration::from_secs(3))
            .await
            .unwrap();
        let narrow = harness
            .correlator
            .watch_for("ValueStored", field_equals("value", json!("0x10")), Duration::from_secs(3))
            .await
            .unwrap();
        assert_eq!(harness.correlator.waiter_count("ValueStored"), 2);

        store(&harness, storage, 16).await;

        let (a, b) = tokio::join!(broad, narrow);
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(harness.correlator.stats().subscriptions_opened, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_waiter_keeps_subscription_open() {
        let harness = Harness::new(DevnetConfig::default());
        let storage = harness.deploy("SimpleStorage").await;

        let waiting_for_five = harness
            .correlator
            .watch_for("ValueStored", field_equals("value", json!("0x5")), Duration::from_secs(10))
            .await
            .unwrap();

        store(&harness, storage, 4).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(harness.correlator.waiter_count("ValueStored"), 1);

        store(&harness, storage, 5).await;
        let notification = waiting_for_five.await.unwrap();
        assert_eq!(notification.get("value"), Some(&json!("0x5")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_waiter_closes_and_rewatch_resubscribes() {
        let harness = Harness::new(DevnetConfig::default());
        let storage = harness.deploy("SimpleStorage").await;

        let first = harness
            .correlator
            .watch_for("ValueStored", any(), Duration::from_secs(3))
            .await
            .unwrap();
        store(&harness, storage, 1).await;
        first.await.unwrap();
        assert!(harness.correlator.open_channels().is_empty());

        let second = harness
            .correlator
            .watch_for("ValueStored", any(), Duration::from_secs(3))
            .await
            .unwrap();
        store(&harness, storage, 2).await;
        assert_eq!(second.await.unwrap().get("value"), Some(&json!("0x2")));

        let stats = harness.correlator.stats();
        assert_eq!(stats.subscriptions_opened, 2);
        assert_eq!(stats.subscriptions_closed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_releases_waiter() {
        let harness = Harness::new(DevnetConfig::default());

        let handle = harness
            .correlator
            .watch_for("WinnerPicked", any(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(harness.correlator.waiter_count("WinnerPicked"), 1);

        drop(handle);
        assert_eq!(harness.correlator.waiter_count("WinnerPicked"), 0);
        assert_eq!(harness.correlator.stats().cancelled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_now_rejects_immediately() {
        let harness = Harness::new(DevnetConfig::default());
        let started = Instant::now();

        let err = harness
            .correlator
            .watch("RaffleEnter", any(), Instant::now())
            .await
            .unwrap()
            .await
            .unwrap_err();

        assert!(matches!(err, CorrelationError::CorrelationTimeout { .. }));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_winner_watch_times_out_after_deadline() {
        let harness = Harness::new(DevnetConfig::default());
        let started = Instant::now();

        let err = harness
            .correlator
            .watch_for("WinnerPicked", any(), Duration::from_millis(5_000))
            .await
            .unwrap()
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_millis(5_000));
        assert!(started.elapsed() < Duration::from_millis(5_100));
        assert_eq!(harness.correlator.waiter_count("WinnerPicked"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_mid_watch_is_transient() {
        let harness = Harness::new(DevnetConfig::default());

        let handle = harness
            .correlator
            .watch_for("RaffleEnter", any(), Duration::from_secs(30))
            .await
            .unwrap();
        harness.devnet.set_reachable(false);

        let err = handle.await.unwrap_err();
        assert!(matches!(err, CorrelationError::TransientConnectivity(_)));
        assert_eq!(harness.correlator.stats().stream_failures, 1);

        let err = harness
            .correlator
            .watch_for("RaffleEnter", any(), Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(matches!(err, CorrelationError::TransientConnectivity(_)));
    }
}
