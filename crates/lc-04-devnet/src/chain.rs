//! The devnet chain: transaction pool, block production, contract state and
//! balances.
//!
//! State lives behind a `parking_lot` mutex that is never held across an
//! await. Block production additionally takes a tokio mutex for the whole
//! mine-then-publish sequence, so notifications from block N are always on
//! the bus before any from block N+1.

use crate::config::DevnetConfig;
use crate::contracts::{self, CallContext, Emitted, Outcome, SimulatedContract};
use crate::errors::DevnetError;
use async_trait::async_trait;
use futures::StreamExt;
use lc_01_submit_confirm::{GatewayError, LedgerGateway};
use lc_02_event_correlator::{NotificationSource, NotificationStream, SourceError};
use parking_lot::Mutex;
use primitive_types::U256;
use serde_json::{json, Value};
use shared_bus::{InMemoryNotificationBus, NotificationPublisher};
use shared_types::{
    keccak256, keccak256_hex, Action, ActionParams, Address, LedgerStatus, Notification, RequestId,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Where a transaction ended up.
#[derive(Debug, Clone)]
struct Inclusion {
    block_number: u64,
    revert_reason: Option<String>,
    contract_address: Option<Address>,
    logs: Vec<Value>,
}

#[derive(Debug, Clone)]
struct Transaction {
    from: Address,
    action: Action,
    params: ActionParams,
    inclusion: Option<Inclusion>,
}

struct ChainState {
    head: u64,
    /// Timestamp of the head block, seconds.
    timestamp: u64,
    pool: VecDeque<RequestId>,
    transactions: HashMap<RequestId, Transaction>,
    contracts: HashMap<Address, Box<dyn SimulatedContract>>,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    submitted: u64,
    automine: bool,
}

impl ChainState {
    fn balance(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn credit(&mut self, account: Address, amount: U256) {
        let balance = self.balances.entry(account).or_default();
        *balance = balance.saturating_add(amount);
    }

    fn debit(&mut self, account: Address, amount: U256) {
        let balance = self.balances.entry(account).or_default();
        *balance = balance.saturating_sub(amount);
    }

    fn context(&self, sender: Address, value: U256, contract: Address, block_number: u64) -> CallContext {
        CallContext {
            sender,
            value,
            balance: self.balance(&contract).saturating_add(value),
            block_number,
            timestamp: self.timestamp,
            contract,
        }
    }

    /// Dry run against copies of the current state.
    fn preflight(&self, from: Address, action: &Action, params: &ActionParams) -> Result<(), DevnetError> {
        let funds = self.balance(&from);
        if funds < params.value {
            return Err(DevnetError::InsufficientFunds {
                account: from,
                balance: funds,
                required: params.value,
            });
        }

        let Some(target) = action.target else {
            let ctx = self.context(from, params.value, Address::ZERO, self.head + 1);
            return contracts::deploy(&action.method, &params.args, &ctx).map(|_| ());
        };
        let contract = self
            .contracts
            .get(&target)
            .ok_or(DevnetError::NoContractAt(target))?;
        if params.gas_limit.is_some() {
            // Explicit gas limit skips estimation, as a real node does.
            return Ok(());
        }

        let ctx = self.context(from, params.value, target, self.head + 1);
        match contract.snapshot().execute(&ctx, &action.method, &params.args) {
            Outcome::Success { .. } => Ok(()),
            Outcome::Revert(reason) => Err(DevnetError::Execution(reason)),
        }
    }

    /// Execute one pooled transaction in the block being built.
    fn include(&mut self, id: &RequestId, block_number: u64) -> Vec<Notification> {
        let Some(tx) = self.transactions.get(id).cloned() else {
            return Vec::new();
        };
        let nonce = self.nonces.entry(tx.from).or_default();
        let tx_nonce = *nonce;
        *nonce += 1;

        let (inclusion, emitted, emitter) = match self.execute(&tx, tx_nonce, block_number) {
            Ok((contract, emitted, created)) => {
                let logs = emitted.iter().map(|e| log_json(e, &contract)).collect();
                let inclusion = Inclusion {
                    block_number,
                    revert_reason: None,
                    contract_address: created.then_some(contract),
                    logs,
                };
                (inclusion, emitted, contract)
            }
            Err(reason) => {
                debug!(tx = %id, %reason, "Transaction reverted");
                let inclusion = Inclusion {
                    block_number,
                    revert_reason: Some(reason),
                    contract_address: None,
                    logs: Vec::new(),
                };
                (inclusion, Vec::new(), Address::ZERO)
            }
        };

        if let Some(tx) = self.transactions.get_mut(id) {
            tx.inclusion = Some(inclusion);
        }

        emitted
            .into_iter()
            .map(|event| {
                let mut payload = event.args;
                payload.insert("address".into(), json!(emitter.to_string()));
                payload.insert("transactionHash".into(), json!(id.as_str()));
                payload.insert("blockNumber".into(), json!(block_number));
                Notification::new(event.event, payload)
            })
            .collect()
    }

    /// Returns the executing contract, its events and whether it was created.
    fn execute(
        &mut self,
        tx: &Transaction,
        nonce: u64,
        block_number: u64,
    ) -> Result<(Address, Vec<Emitted>, bool), String> {
        let value = tx.params.value;
        if self.balance(&tx.from) < value {
            return Err("insufficient funds for transfer".into());
        }

        let Some(target) = tx.action.target else {
            let address = contract_address(&tx.from, nonce);
            let ctx = self.context(tx.from, value, address, block_number);
            let contract = contracts::deploy(&tx.action.method, &tx.params.args, &ctx)
                .map_err(|e| e.to_string())?;
            self.contracts.insert(address, contract);
            self.debit(tx.from, value);
            self.credit(address, value);
            info!(contract = %tx.action.method, %address, "Contract deployed");
            return Ok((address, Vec::new(), true));
        };

        let ctx = self.context(tx.from, value, target, block_number);
        let mut working = self
            .contracts
            .get(&target)
            .ok_or_else(|| format!("no contract at {target}"))?
            .snapshot();
        match working.execute(&ctx, &tx.action.method, &tx.params.args) {
            Outcome::Revert(reason) => Err(reason),
            Outcome::Success { emitted, payouts } => {
                self.contracts.insert(target, working);
                self.debit(tx.from, value);
                self.credit(target, value);
                for (recipient, amount) in payouts {
                    let amount = amount.min(self.balance(&target));
                    self.debit(target, amount);
                    self.credit(recipient, amount);
                }
                Ok((target, emitted, false))
            }
        }
    }
}

fn log_json(event: &Emitted, address: &Address) -> Value {
    json!({
        "event": event.event,
        "address": address.to_string(),
        "args": Value::Object(event.args.clone()),
    })
}

/// keccak(sender ++ nonce), last 20 bytes.
fn contract_address(sender: &Address, nonce: u64) -> Address {
    let mut preimage = sender.as_bytes().to_vec();
    preimage.extend_from_slice(&nonce.to_be_bytes());
    Address::from_word(&keccak256(preimage))
}

fn dev_account(index: usize) -> Address {
    Address::from_word(&keccak256(format!("devnet account {index}")))
}

/// In-process development ledger.
pub struct Devnet {
    config: DevnetConfig,
    accounts: Vec<Address>,
    state: Mutex<ChainState>,
    /// Serialises block production with event publication.
    mining: tokio::sync::Mutex<()>,
    bus: Arc<InMemoryNotificationBus>,
    reachable: watch::Sender<bool>,
    interval_miner: Mutex<Option<JoinHandle<()>>>,
}

impl Devnet {
    /// Start a devnet. With `block_time` set this spawns the interval miner,
    /// so it must be called inside a tokio runtime.
    pub fn new(config: DevnetConfig) -> Arc<Self> {
        let accounts: Vec<Address> = (0..config.accounts).map(dev_account).collect();
        let balances = accounts
            .iter()
            .map(|account| (*account, config.initial_balance))
            .collect();
        let state = ChainState {
            head: 0,
            timestamp: config.genesis_timestamp,
            pool: VecDeque::new(),
            transactions: HashMap::new(),
            contracts: HashMap::new(),
            balances,
            nonces: HashMap::new(),
            submitted: 0,
            automine: config.automine,
        };
        let (reachable, _) = watch::channel(true);

        let devnet = Arc::new(Self {
            config,
            accounts,
            state: Mutex::new(state),
            mining: tokio::sync::Mutex::new(()),
            bus: Arc::new(InMemoryNotificationBus::new()),
            reachable,
            interval_miner: Mutex::new(None),
        });
        if let Some(block_time) = devnet.config.block_time {
            let handle = Self::spawn_interval_mining(Arc::downgrade(&devnet), block_time);
            *devnet.interval_miner.lock() = Some(handle);
        }
        info!(
            chain_id = devnet.config.chain_id,
            automine = devnet.config.automine,
            block_time_ms = devnet.config.block_time.map(|t| t.as_millis() as u64),
            "Devnet started"
        );
        devnet
    }

    fn spawn_interval_mining(devnet: Weak<Self>, block_time: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(block_time);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(devnet) = devnet.upgrade() else {
                    break;
                };
                devnet.mine(1).await;
            }
        })
    }

    pub fn config(&self) -> &DevnetConfig {
        &self.config
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    /// Funded development accounts. The first is the default sender.
    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    pub fn block_number(&self) -> u64 {
        self.state.lock().head
    }

    /// Head block timestamp in seconds.
    pub fn timestamp(&self) -> u64 {
        self.state.lock().timestamp
    }

    pub fn balance_of(&self, account: &Address) -> U256 {
        self.state.lock().balance(account)
    }

    pub fn contract_name(&self, address: &Address) -> Option<&'static str> {
        self.state.lock().contracts.get(address).map(|c| c.name())
    }

    /// Transactions waiting for a block.
    pub fn pool_size(&self) -> usize {
        self.state.lock().pool.len()
    }

    /// Bus the devnet publishes contract events on.
    pub fn bus(&self) -> Arc<InMemoryNotificationBus> {
        self.bus.clone()
    }

    pub fn set_automine(&self, enabled: bool) {
        self.state.lock().automine = enabled;
    }

    /// Toggle connectivity. While unreachable every port call fails and
    /// open notification streams end.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.send_replace(reachable);
        if !reachable {
            warn!("Devnet made unreachable");
        }
    }

    pub fn is_reachable(&self) -> bool {
        *self.reachable.borrow()
    }

    /// Advance the clock; takes effect from the next block and for reads.
    pub fn increase_time(&self, seconds: u64) {
        let mut state = self.state.lock();
        state.timestamp += seconds;
        debug!(seconds, timestamp = state.timestamp, "Time increased");
    }

    /// Mine `blocks` blocks, the first one including the whole pool.
    /// Returns the new head.
    pub async fn mine(&self, blocks: u64) -> u64 {
        let _guard = self.mining.lock().await;
        let mut head = self.block_number();
        for _ in 0..blocks {
            let notifications = {
                let mut state = self.state.lock();
                state.head += 1;
                state.timestamp += 1;
                let block_number = state.head;
                let pooled: Vec<RequestId> = state.pool.drain(..).collect();
                let notifications: Vec<Notification> = pooled
                    .iter()
                    .flat_map(|id| state.include(id, block_number))
                    .collect();
                debug!(
                    block = block_number,
                    transactions = pooled.len(),
                    events = notifications.len(),
                    "Block mined"
                );
                head = block_number;
                notifications
            };
            for notification in notifications {
                self.bus.publish(notification).await;
            }
        }
        head
    }

    fn ensure_reachable(&self) -> Result<(), DevnetError> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(DevnetError::Unreachable)
        }
    }

    /// `None` for a request this devnet never accepted.
    fn status_of(&self, id: &RequestId) -> Option<LedgerStatus> {
        let state = self.state.lock();
        let tx = state.transactions.get(id)?;
        let Some(inclusion) = &tx.inclusion else {
            return Some(LedgerStatus::pending());
        };

        // Subsequent blocks only: inclusion is zero confirmations.
        let mut status = LedgerStatus::included(
            inclusion.block_number,
            state.head - inclusion.block_number,
        );
        status.reverted = inclusion.revert_reason.is_some();
        status.reason = inclusion.revert_reason.clone();
        let receipt = json!({
            "transactionHash": id.as_str(),
            "blockNumber": inclusion.block_number,
            "status": if status.reverted { "0x0" } else { "0x1" },
            "from": tx.from.to_string(),
            "to": tx.action.target.map(|t| t.to_string()),
            "contractAddress": inclusion.contract_address.map(|a| a.to_string()),
            "logs": inclusion.logs,
        });
        Some(status.with_payload(receipt))
    }
}

impl Drop for Devnet {
    fn drop(&mut self) {
        if let Some(handle) = self.interval_miner.lock().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl LedgerGateway for Devnet {
    async fn submit(&self, action: &Action, params: &ActionParams) -> Result<RequestId, GatewayError> {
        self.ensure_reachable()?;
        let from = params
            .from
            .or_else(|| self.accounts.first().copied())
            .unwrap_or(Address::ZERO);

        let (automine, id) = {
            let mut state = self.state.lock();
            state.preflight(from, action, params).map_err(|e| {
                debug!(method = %action.method, reason = %e, "Submission rejected");
                GatewayError::from(e)
            })?;

            state.submitted += 1;
            let id = RequestId::new(keccak256_hex(format!(
                "{}:{}:{}",
                self.config.chain_id, from, state.submitted
            )));
            state.transactions.insert(
                id.clone(),
                Transaction {
                    from,
                    action: action.clone(),
                    params: params.clone(),
                    inclusion: None,
                },
            );
            state.pool.push_back(id.clone());
            (state.automine, id)
        };

        debug!(tx = %id, method = %action.method, automine, "Transaction pooled");
        if automine {
            self.mine(1).await;
        }
        Ok(id)
    }

    async fn get_status(&self, request_id: &RequestId) -> Result<LedgerStatus, GatewayError> {
        self.ensure_reachable()?;
        self.status_of(request_id)
            .ok_or_else(|| GatewayError::UnknownRequest(request_id.clone()))
    }

    async fn call(&self, action: &Action, params: &ActionParams) -> Result<Value, GatewayError> {
        self.ensure_reachable()?;
        let Some(target) = action.target else {
            return Err(GatewayError::Rejected("cannot call a deployment".into()));
        };
        let state = self.state.lock();
        let contract = state
            .contracts
            .get(&target)
            .ok_or(DevnetError::NoContractAt(target))?;
        let from = params.from.unwrap_or(Address::ZERO);
        let ctx = state.context(from, params.value, target, state.head);
        contract
            .query(&ctx, &action.method, &params.args)
            .map_err(GatewayError::Rejected)
    }
}

#[async_trait]
impl NotificationSource for Devnet {
    async fn subscribe(&self, channel: &str) -> Result<NotificationStream, SourceError> {
        self.ensure_reachable()?;
        let mut reachable = self.reachable.subscribe();
        let stream = self
            .bus
            .notification_stream(channel)
            .take_until(async move {
                // Also resolves if the devnet is dropped.
                let _ = reachable.wait_for(|up| !*up).await;
            })
            .boxed();
        Ok(stream)
    }
}
