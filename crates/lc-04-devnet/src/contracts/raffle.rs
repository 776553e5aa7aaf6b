//! Raffle: players pay an entrance fee; after `interval` seconds an upkeep
//! requests a random word and its fulfilment pays the whole pot to one
//! player.
//!
//! ```text
//! enterRaffle ──→ [Open] ──performUpkeep──→ [Calculating] ──fulfillRandomWords──→ [Open]
//!                           emits RequestedRaffleWinner        emits WinnerPicked
//! ```

use super::{method_name, uint_arg, uint_value, CallContext, Emitted, Outcome, SimulatedContract};
use crate::errors::DevnetError;
use primitive_types::U256;
use serde_json::{json, Value};
use shared_types::Address;
use std::collections::HashSet;

/// 0.01 ETH.
pub const DEFAULT_ENTRANCE_FEE_WEI: u64 = 10_000_000_000_000_000;
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaffleState {
    Open = 0,
    Calculating = 1,
}

#[derive(Debug, Clone)]
pub struct Raffle {
    entrance_fee: U256,
    interval: u64,
    players: Vec<Address>,
    state: RaffleState,
    last_timestamp: u64,
    recent_winner: Address,
    open_requests: HashSet<U256>,
    next_request_id: U256,
}

impl Raffle {
    pub fn new(entrance_fee: U256, interval: u64, deployed_at: u64) -> Self {
        Self {
            entrance_fee,
            interval,
            players: Vec::new(),
            state: RaffleState::Open,
            last_timestamp: deployed_at,
            recent_winner: Address::ZERO,
            open_requests: HashSet::new(),
            next_request_id: U256::one(),
        }
    }

    /// Constructor args: `[entranceFee?, interval?]`.
    pub fn from_args(args: &[Value], deployed_at: u64) -> Result<Self, DevnetError> {
        let entrance_fee = match args.first() {
            Some(_) => uint_arg(args, 0).map_err(DevnetError::Execution)?,
            None => U256::from(DEFAULT_ENTRANCE_FEE_WEI),
        };
        let interval = match args.get(1) {
            Some(_) => uint_arg(args, 1).map_err(DevnetError::Execution)?.low_u64(),
            None => DEFAULT_INTERVAL_SECS,
        };
        Ok(Self::new(entrance_fee, interval, deployed_at))
    }

    fn upkeep_needed(&self, ctx: &CallContext) -> bool {
        let time_passed = ctx.timestamp.saturating_sub(self.last_timestamp) > self.interval;
        self.state == RaffleState::Open
            && time_passed
            && !self.players.is_empty()
            && !ctx.balance.is_zero()
    }

    fn enter(&mut self, ctx: &CallContext) -> Outcome {
        if ctx.value < self.entrance_fee {
            return Outcome::revert("Raffle__NotEnoughETHEntered");
        }
        if self.state != RaffleState::Open {
            return Outcome::revert("Raffle__NotOpen");
        }
        self.players.push(ctx.sender);
        Outcome::emit(Emitted::new("RaffleEnter").arg("player", json!(ctx.sender.to_string())))
    }

    fn perform_upkeep(&mut self, ctx: &CallContext) -> Outcome {
        if !self.upkeep_needed(ctx) {
            return Outcome::revert(format!(
                "Raffle__UpkeepNotNeeded({}, {}, {})",
                ctx.balance,
                self.players.len(),
                self.state as u8
            ));
        }
        self.state = RaffleState::Calculating;
        let request_id = self.next_request_id;
        self.next_request_id += U256::one();
        self.open_requests.insert(request_id);
        Outcome::emit(Emitted::new("RequestedRaffleWinner").arg("requestId", uint_value(request_id)))
    }

    fn fulfill(&mut self, ctx: &CallContext, args: &[Value]) -> Outcome {
        let (request_id, random_word) = match (uint_arg(args, 0), uint_arg(args, 1)) {
            (Ok(id), Ok(word)) => (id, word),
            (Err(reason), _) | (_, Err(reason)) => return Outcome::revert(reason),
        };
        if !self.open_requests.remove(&request_id) {
            return Outcome::revert("nonexistent request");
        }
        if self.players.is_empty() {
            return Outcome::revert("Raffle__NoPlayers");
        }

        let index = (random_word % U256::from(self.players.len())).low_u64() as usize;
        let winner = self.players[index];
        self.recent_winner = winner;
        self.players.clear();
        self.state = RaffleState::Open;
        self.last_timestamp = ctx.timestamp;

        Outcome::Success {
            emitted: vec![Emitted::new("WinnerPicked")
                .arg("winner", json!(winner.to_string()))
                .arg("requestId", uint_value(request_id))],
            payouts: vec![(winner, ctx.balance)],
        }
    }
}

impl SimulatedContract for Raffle {
    fn name(&self) -> &'static str {
        "Raffle"
    }

    fn execute(&mut self, ctx: &CallContext, method: &str, args: &[Value]) -> Outcome {
        match method_name(method) {
            "enterRaffle" => self.enter(ctx),
            "performUpkeep" => self.perform_upkeep(ctx),
            "fulfillRandomWords" => self.fulfill(ctx, args),
            other => Outcome::revert(format!("Raffle has no method {other}")),
        }
    }

    fn query(&self, ctx: &CallContext, method: &str, args: &[Value]) -> Result<Value, String> {
        match method_name(method) {
            "getEntranceFee" => Ok(uint_value(self.entrance_fee)),
            "getInterval" => Ok(uint_value(U256::from(self.interval))),
            "getRaffleState" => Ok(json!(self.state as u8)),
            "getNumberOfPlayers" => Ok(uint_value(U256::from(self.players.len()))),
            "getRecentWinner" => Ok(json!(self.recent_winner.to_string())),
            "getLatestTimestamp" => Ok(uint_value(U256::from(self.last_timestamp))),
            "getPlayer" => {
                let index = uint_arg(args, 0)?;
                (index < U256::from(self.players.len()))
                    .then(|| json!(self.players[index.low_u64() as usize].to_string()))
                    .ok_or_else(|| "index out of bounds".to_string())
            }
            "checkUpkeep" => Ok(json!({ "upkeepNeeded": self.upkeep_needed(ctx) })),
            other => Err(format!("Raffle has no view {other}")),
        }
    }

    fn snapshot(&self) -> Box<dyn SimulatedContract> {
        Box::new(self.clone())
    }
}
