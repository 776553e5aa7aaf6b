//! # Ledger Context
//!
//! The one object scripts receive: configuration, the ledger backend, and
//! the confirmation and correlation services wired to it. Built once at
//! start, passed by reference, dropped at exit.

use crate::config::{Network, RuntimeConfig};
use crate::errors::ScriptError;
use lc_01_submit_confirm::{ConfirmError, ConfirmationService, LedgerGateway};
use lc_02_event_correlator::{EventCorrelator, NotificationSource};
use lc_03_json_rpc::{EventBook, JsonRpcLedger, RpcClient, WsNotificationSource};
use lc_04_devnet::{Devnet, DevnetConfig};
use shared_types::Address;
use std::sync::Arc;
use tracing::info;

/// Where actions go.
pub enum Backend {
    Devnet(Arc<Devnet>),
    Remote(Arc<JsonRpcLedger>),
}

pub struct LedgerContext {
    config: RuntimeConfig,
    backend: Backend,
    confirmations: ConfirmationService,
    correlator: EventCorrelator,
}

impl LedgerContext {
    /// Validate `config` and connect. Remote ledgers must report the
    /// configured chain id.
    pub async fn connect(config: RuntimeConfig) -> Result<Self, ScriptError> {
        config.validate()?;

        if config.network == Network::Devnet {
            let devnet = Devnet::new(DevnetConfig {
                chain_id: config.chain_id,
                ..DevnetConfig::default().with_block_time(config.devnet_block_time)
            });
            return Ok(Self::with_devnet(config, devnet));
        }

        let rpc_url = config
            .rpc_url
            .clone()
            .ok_or(crate::config::ConfigError::MissingEndpoint(config.network))?;
        let mut ledger = JsonRpcLedger::new(RpcClient::new(rpc_url.as_str()));
        if let Some(sender) = config.sender {
            ledger = ledger.with_sender(sender);
        }
        let actual = ledger.chain_id().await.map_err(ConfirmError::from)?;
        if actual != config.chain_id {
            return Err(ScriptError::ChainMismatch {
                expected: config.chain_id,
                actual,
            });
        }

        let ws_url = config.effective_ws_url().unwrap_or_else(|| rpc_url.clone());
        let mut source = WsNotificationSource::new(ws_url, EventBook::with_builtin());
        if let Some(contract) = config.contract_address {
            source = source.with_contract(contract);
        }

        info!(network = %config.network, rpc_url = %rpc_url, chain_id = actual, "Connected to ledger");
        let ledger = Arc::new(ledger);
        Ok(Self::assemble(
            config,
            Backend::Remote(ledger.clone()),
            ledger,
            Arc::new(source),
        ))
    }

    /// Context over an existing devnet.
    pub fn with_devnet(config: RuntimeConfig, devnet: Arc<Devnet>) -> Self {
        let gateway: Arc<dyn LedgerGateway> = devnet.clone();
        let source: Arc<dyn NotificationSource> = devnet.clone();
        Self::assemble(config, Backend::Devnet(devnet), gateway, source)
    }

    fn assemble(
        config: RuntimeConfig,
        backend: Backend,
        gateway: Arc<dyn LedgerGateway>,
        source: Arc<dyn NotificationSource>,
    ) -> Self {
        let confirmations = ConfirmationService::new(gateway, config.confirm_config());
        let correlator = EventCorrelator::new(source);
        Self {
            config,
            backend,
            confirmations,
            correlator,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn confirmations(&self) -> &ConfirmationService {
        &self.confirmations
    }

    pub fn correlator(&self) -> &EventCorrelator {
        &self.correlator
    }

    pub fn devnet(&self) -> Option<&Arc<Devnet>> {
        match &self.backend {
            Backend::Devnet(devnet) => Some(devnet),
            Backend::Remote(_) => None,
        }
    }

    /// Configured sender, else the devnet's first account.
    pub fn default_sender(&self) -> Option<Address> {
        self.config
            .sender
            .or_else(|| self.devnet().and_then(|d| d.accounts().first().copied()))
    }

    /// Mirror service counters into the metrics registry.
    pub fn record_metrics(&self) {
        ledger_telemetry::record_confirm_stats(&self.confirmations.stats().snapshot());
        ledger_telemetry::record_correlator_stats(&self.correlator.stats());
    }
}
