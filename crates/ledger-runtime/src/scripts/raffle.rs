//! One full raffle round on the devnet.
//!
//! ```text
//! deploy Raffle
//!   → N × enterRaffle           (correlate RaffleEnter by player)
//!   → advance time past interval
//!   → performUpkeep             (correlate RequestedRaffleWinner → requestId)
//!   → fulfillRandomWords        (correlate WinnerPicked by requestId)
//! ```
//!
//! Each watch is registered before its action is submitted.

use super::correlate::{submit_and_correlate, Correlation};
use super::deploy::deploy;
use super::parse_uint;
use crate::context::LedgerContext;
use crate::errors::ScriptError;
use lc_01_submit_confirm::SubmitAndConfirmApi;
use lc_02_event_correlator::predicates::{all, field_equals, field_equals_ignore_case};
use primitive_types::U256;
use serde_json::{json, Value};
use shared_types::{keccak256, Action, ActionParams, Address, RequestId};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaffleRound {
    pub raffle: Address,
    pub entrants: Vec<Address>,
    /// Request id carried by `RequestedRaffleWinner` and `WinnerPicked`.
    pub request_id: U256,
    pub winner: Address,
    pub pot: U256,
    /// The `fulfillRandomWords` transaction.
    pub fulfilment: RequestId,
}

async fn view(ctx: &LedgerContext, raffle: Address, method: &str) -> Result<Value, ScriptError> {
    Ok(ctx
        .confirmations()
        .call(&Action::call(raffle, method), &ActionParams::new())
        .await?)
}

pub async fn raffle_demo(ctx: &LedgerContext, entrants: usize) -> Result<RaffleRound, ScriptError> {
    let devnet = ctx.devnet().ok_or(ScriptError::DevnetOnly("raffle-demo"))?.clone();
    let timeout = ctx.config().correlation_timeout;
    let raffle = deploy(ctx, "Raffle", None, vec![], None).await?.address;
    let raffle_str = raffle.to_string();

    let fee = parse_uint(&view(ctx, raffle, "getEntranceFee").await?)?;
    let players: Vec<Address> = devnet
        .accounts()
        .iter()
        .skip(1)
        .take(entrants.max(1))
        .copied()
        .collect();

    for player in &players {
        submit_and_correlate(
            ctx,
            &Action::call(raffle, "enterRaffle"),
            &ActionParams::new().with_from(*player).with_value(fee),
            Correlation::new(
                "RaffleEnter",
                all(vec![
                    field_equals_ignore_case("address", raffle_str.clone()),
                    field_equals_ignore_case("player", player.to_string()),
                ]),
                timeout,
            ),
        )
        .await?;
        info!(%player, "Entered raffle");
    }
    let pot = devnet.balance_of(&raffle);

    let interval = parse_uint(&view(ctx, raffle, "getInterval").await?)?.low_u64();
    devnet.increase_time(interval + 1);
    devnet.mine(1).await;
    let upkeep = view(ctx, raffle, "checkUpkeep").await?;
    if upkeep.get("upkeepNeeded") != Some(&Value::Bool(true)) {
        return Err(ScriptError::Unexpected(format!("upkeep not needed: {upkeep}")));
    }

    let requested = submit_and_correlate(
        ctx,
        &Action::call(raffle, "performUpkeep"),
        &ActionParams::new(),
        Correlation::new(
            "RequestedRaffleWinner",
            field_equals_ignore_case("address", raffle_str.clone()),
            timeout,
        ),
    )
    .await?;
    let request_id_value = requested
        .notification
        .get("requestId")
        .cloned()
        .ok_or_else(|| ScriptError::Unexpected("RequestedRaffleWinner without requestId".into()))?;
    let request_id = parse_uint(&request_id_value)?;
    info!(request_id = %request_id, "Winner requested");

    let seed = keccak256(format!("{request_id}:{}", devnet.timestamp()));
    let random_word = U256::from_big_endian(&seed);
    let picked = submit_and_correlate(
        ctx,
        &Action::call(raffle, "fulfillRandomWords"),
        &ActionParams::new().with_args(vec![
            request_id_value.clone(),
            json!(format!("0x{random_word:x}")),
        ]),
        Correlation::new(
            "WinnerPicked",
            all(vec![
                field_equals_ignore_case("address", raffle_str),
                field_equals("requestId", request_id_value),
            ]),
            timeout,
        ),
    )
    .await?;

    let winner = picked
        .notification
        .get_str("winner")
        .ok_or_else(|| ScriptError::Unexpected("WinnerPicked without winner".into()))?
        .parse::<Address>()
        .map_err(|e| ScriptError::Unexpected(e.to_string()))?;
    info!(%winner, pot = %pot, "Winner picked");

    Ok(RaffleRound {
        raffle,
        entrants: players,
        request_id,
        winner,
        pot,
        fulfilment: picked.result.request_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Network, RuntimeConfig};

    #[tokio::test(start_paused = true)]
    async fn test_full_round_pays_winner() {
        let ctx = LedgerContext::connect(RuntimeConfig::preset(Network::Devnet))
            .await
            .unwrap();
        let round = raffle_demo(&ctx, 3).await.unwrap();

        assert_eq!(round.entrants.len(), 3);
        assert!(round.entrants.contains(&round.winner));
        assert_eq!(round.request_id, U256::one());
        assert_eq!(round.pot, U256::exp10(16) * 3);

        let devnet = ctx.devnet().unwrap();
        assert_eq!(devnet.balance_of(&round.raffle), U256::zero());
        let winner = ctx
            .confirmations()
            .call(&Action::call(round.raffle, "getRecentWinner"), &ActionParams::new())
            .await
            .unwrap();
        assert_eq!(winner, json!(round.winner.to_string()));
    }
}
