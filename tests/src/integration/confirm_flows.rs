//! # Confirmation Flows
//!
//! SubmitAndConfirm driven against the devnet:
//!
//! 1. Inclusion with zero confirmations suspends a 1-confirmation wait
//! 2. Re-awaiting a confirmed request is answered locally
//! 3. Reverts carry the ledger's reason
//! 4. Local budgets time out without memoising
//! 5. An unreachable ledger fails the wait as transient

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::Harness;
    use lc_01_submit_confirm::{ConfirmError, ConfirmationStatus, SubmitAndConfirmApi};
    use lc_04_devnet::DevnetConfig;
    use serde_json::json;
    use shared_types::{Action, ActionParams};
    use std::sync::Arc;
    use std::time::Duration;

    fn store(value: u64) -> ActionParams {
        ActionParams::new().with_args(vec![json!(value)])
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_suspends_until_next_block() {
        let harness = Harness::new(DevnetConfig::default());
        let storage = harness.deploy("SimpleStorage").await;

        let pending = harness
            .confirmations
            .submit(&Action::call(storage, "store"), &store(7))
            .await
            .unwrap();

        let service = Arc::clone(&harness.confirmations);
        let waiting = {
            let pending = pending.clone();
            tokio::spawn(async move { service.await_confirmation(&pending, 1).await })
        };

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!waiting.is_finished(), "included with 0 confirmations must keep waiting");

        harness.devnet.mine(1).await;
        let result = waiting.await.unwrap().unwrap();
        assert_eq!(result.status, ConfirmationStatus::Confirmed);
        assert_eq!(result.confirmations, 1);
        assert_eq!(result.request_id, pending.request_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reawait_answers_without_ledger() {
        let harness = Harness::new(DevnetConfig::default());
        let storage = harness.deploy("SimpleStorage").await;

        let pending = harness
            .confirmations
            .submit(&Action::call(storage, "store"), &store(1))
            .await
            .unwrap();
        harness.devnet.mine(1).await;
        let first = harness
            .confirmations
            .await_confirmation(&pending, 1)
            .await
            .unwrap();

        harness.devnet.set_reachable(false);
        let second = harness
            .confirmations
            .await_confirmation(&pending, 1)
            .await
            .unwrap();

        assert_eq!(first, second);
        let stats = harness.confirmations.stats().snapshot();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.memo_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deeper_threshold_polls_again() {
        let harness = Harness::new(DevnetConfig::default());
        let storage = harness.deploy("SimpleStorage").await;

        let pending = harness
            .confirmations
            .submit(&Action::call(storage, "store"), &store(2))
            .await
            .unwrap();
        let shallow = harness
            .confirmations
            .await_confirmation(&pending, 0)
            .await
            .unwrap();
        assert_eq!(shallow.confirmations, 0);

        harness.devnet.mine(3).await;
        let deep = harness
            .confirmations
            .await_confirmation(&pending, 3)
            .await
            .unwrap();
        assert_eq!(deep.confirmations, 3);
        assert_eq!(deep.block_number, shallow.block_number);
    }

    #[tokio::test(start_paused = true)]
    async fn test_revert_reports_reason() {
        let harness = Harness::new(DevnetConfig::default());
        let raffle = harness.deploy("Raffle").await;

        let pending = harness
            .confirmations
            .submit(
                &Action::call(raffle, "enterRaffle"),
                &ActionParams::new().with_gas_limit(500_000),
            )
            .await
            .unwrap();
        let result = harness
            .confirmations
            .await_confirmation(&pending, 1)
            .await
            .unwrap();

        assert_eq!(result.status, ConfirmationStatus::Reverted);
        assert_eq!(result.reason.as_deref(), Some("Raffle__NotEnoughETHEntered"));
        assert_eq!(
            result.into_confirmed(None).unwrap_err(),
            ConfirmError::ActionRejected {
                request_id: Some(pending.request_id),
                reason: "Raffle__NotEnoughETHEntered".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_preflight_failure_rejects_submit() {
        let harness = Harness::new(DevnetConfig::default());
        let raffle = harness.deploy("Raffle").await;

        let err = harness
            .confirmations
            .submit(&Action::call(raffle, "performUpkeep"), &ActionParams::new())
            .await
            .unwrap_err();

        match err {
            ConfirmError::ActionRejected { request_id, reason } => {
                assert!(request_id.is_none());
                assert!(reason.starts_with("Raffle__UpkeepNotNeeded"), "{reason}");
            }
            other => panic!("expected ActionRejected, got {other:?}"),
        }
        assert_eq!(harness.confirmations.stats().snapshot().rejected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_times_out_then_confirms_later() {
        let harness = Harness::new(DevnetConfig::manual());
        let storage = harness.deploy("SimpleStorage").await;

        let pending = harness
            .confirmations
            .submit(&Action::call(storage, "store"), &store(3))
            .await
            .unwrap();
        let timed_out = harness
            .confirmations
            .await_confirmation_within(&pending, 1, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(timed_out.status, ConfirmationStatus::TimedOut);
        assert!(matches!(
            timed_out.into_confirmed(Some(Duration::from_secs(2))),
            Err(ConfirmError::TimedOut { .. })
        ));

        // The action was never cancelled: mining still lands it.
        harness.devnet.mine(2).await;
        let result = harness
            .confirmations
            .await_confirmation(&pending, 1)
            .await
            .unwrap();
        assert_eq!(result.status, ConfirmationStatus::Confirmed);
        assert_eq!(result.confirmations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_mid_wait_is_transient() {
        let harness = Harness::new(DevnetConfig::manual());
        let storage = harness.deploy("SimpleStorage").await;

        let pending = harness
            .confirmations
            .submit(&Action::call(storage, "store"), &store(4))
            .await
            .unwrap();

        let service = Arc::clone(&harness.confirmations);
        let waiting = tokio::spawn(async move { service.await_confirmation(&pending, 1).await });
        tokio::time::sleep(Duration::from_secs(1)).await;

        harness.devnet.set_reachable(false);
        let err = waiting.await.unwrap().unwrap_err();
        assert!(matches!(err, ConfirmError::TransientConnectivity(_)));
        assert_eq!(harness.confirmations.stats().snapshot().connectivity_failures, 1);
    }
}
