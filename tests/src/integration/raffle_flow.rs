//! # Raffle Flow
//!
//! A full round through `ledger-runtime`: explicit context, register-before-
//! submit correlation on every step, telemetry fed from the protocol
//! counters afterwards.

#[cfg(test)]
mod tests {
    use ledger_runtime::scripts::{raffle_demo, send, SendRequest};
    use ledger_runtime::{LedgerContext, Network, RuntimeConfig, ScriptError};
    use lc_01_submit_confirm::{ConfirmError, ConfirmationStatus, SubmitAndConfirmApi};
    use primitive_types::U256;
    use serde_json::json;
    use shared_types::{Action, ActionParams};

    async fn devnet_context() -> LedgerContext {
        LedgerContext::connect(RuntimeConfig::preset(Network::Devnet))
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_pays_pot_to_winner() {
        let ctx = devnet_context().await;
        let devnet = ctx.devnet().unwrap().clone();
        let initial = devnet.config().initial_balance;

        let round = raffle_demo(&ctx, 4).await.unwrap();

        let fee = U256::exp10(16);
        assert_eq!(round.pot, fee * 4);
        assert_eq!(devnet.balance_of(&round.winner), initial - fee + round.pot);
        for loser in round.entrants.iter().filter(|p| **p != round.winner) {
            assert_eq!(devnet.balance_of(loser), initial - fee);
        }

        let fulfilment = ctx
            .confirmations()
            .settled()
            .lookup(&round.fulfilment, 1)
            .unwrap();
        assert_eq!(fulfilment.status, ConfirmationStatus::Confirmed);

        let state = ctx
            .confirmations()
            .call(&Action::call(round.raffle, "getRaffleState"), &ActionParams::new())
            .await
            .unwrap();
        assert_eq!(state, json!(0));
        assert!(ctx.correlator().open_channels().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_feeds_metrics() {
        let ctx = devnet_context().await;
        raffle_demo(&ctx, 2).await.unwrap();

        ledger_telemetry::register_metrics().unwrap();
        ctx.record_metrics();
        let text = ledger_telemetry::encode_metrics().unwrap();

        assert!(text.contains("lc_confirm_requests_total"));
        assert!(text.contains("lc_correlator_watches_total"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_round_needs_new_entrants() {
        let ctx = devnet_context().await;
        let round = raffle_demo(&ctx, 1).await.unwrap();
        assert_eq!(round.winner, round.entrants[0]);

        // Players were reset, so upkeep is refused at preflight.
        let err = send(&ctx, SendRequest::new(round.raffle, "performUpkeep"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::Confirm(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_devnet_fails_round() {
        let ctx = devnet_context().await;
        ctx.devnet().unwrap().set_reachable(false);

        let err = raffle_demo(&ctx, 2).await.unwrap_err();
        assert!(
            matches!(
                err,
                ScriptError::Confirm(ConfirmError::TransientConnectivity(_))
            ),
            "{err:?}"
        );
    }
}
