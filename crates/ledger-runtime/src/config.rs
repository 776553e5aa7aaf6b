//! # Runtime Configuration
//!
//! A [`RuntimeConfig`] starts from a network preset, then takes `LC_*`
//! environment overrides, then CLI flags. [`RuntimeConfig::validate`] runs
//! before a context is built.
//!
//! | Network | Chain id | Confirmations | Endpoint |
//! |---------|----------|---------------|----------|
//! | `devnet` | 31337 | 1 | in-process |
//! | `localhost` / `hardhat` | 31337 | 1 | `http://127.0.0.1:8545` |
//! | `sepolia` | 11155111 | 6 | `LC_RPC_URL` |
//! | `rinkeby` | 4 | 6 | `LC_RPC_URL` |

use lc_01_submit_confirm::ConfirmConfig;
use shared_types::Address;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown network '{0}' (expected devnet, localhost, hardhat, sepolia or rinkeby)")]
    UnknownNetwork(String),

    #[error("invalid {key}='{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("network {0} needs an RPC endpoint; set LC_RPC_URL")]
    MissingEndpoint(Network),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Devnet,
    Localhost,
    Hardhat,
    Sepolia,
    Rinkeby,
}

impl Network {
    pub fn name(self) -> &'static str {
        match self {
            Network::Devnet => "devnet",
            Network::Localhost => "localhost",
            Network::Hardhat => "hardhat",
            Network::Sepolia => "sepolia",
            Network::Rinkeby => "rinkeby",
        }
    }

    /// Local chains where one confirmation is enough.
    pub fn is_development(self) -> bool {
        matches!(self, Network::Devnet | Network::Localhost | Network::Hardhat)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "devnet" => Ok(Network::Devnet),
            "localhost" => Ok(Network::Localhost),
            "hardhat" => Ok(Network::Hardhat),
            "sepolia" => Ok(Network::Sepolia),
            "rinkeby" => Ok(Network::Rinkeby),
            _ => Err(ConfigError::UnknownNetwork(s.to_string())),
        }
    }
}

/// Everything a [`LedgerContext`](crate::LedgerContext) needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub network: Network,
    pub chain_id: u64,
    /// HTTP JSON-RPC endpoint. Unused on devnet.
    pub rpc_url: Option<String>,
    /// WebSocket endpoint for log subscriptions. Derived from `rpc_url`
    /// when unset.
    pub ws_url: Option<String>,
    /// Confirmations scripts wait for after deploy and send.
    pub block_confirmations: u64,
    pub poll_interval: Duration,
    /// Local wait budget for confirmations. `None` waits indefinitely.
    pub max_wait: Option<Duration>,
    /// Deadline for correlation watches started by scripts.
    pub correlation_timeout: Duration,
    /// Default sender. Devnet falls back to its first account.
    pub sender: Option<Address>,
    /// Contract the websocket log filter is scoped to.
    pub contract_address: Option<Address>,
    /// Interval mining period of the in-process devnet.
    pub devnet_block_time: Duration,
}

impl RuntimeConfig {
    /// Defaults for `network`.
    pub fn preset(network: Network) -> Self {
        let (chain_id, rpc_url) = match network {
            Network::Devnet => (31337, None),
            Network::Localhost | Network::Hardhat => {
                (31337, Some("http://127.0.0.1:8545".to_string()))
            }
            Network::Sepolia => (11_155_111, None),
            Network::Rinkeby => (4, None),
        };
        let block_confirmations = if network.is_development() { 1 } else { 6 };
        Self {
            network,
            chain_id,
            rpc_url,
            ws_url: None,
            block_confirmations,
            poll_interval: Duration::from_millis(match network {
                Network::Devnet => 10,
                Network::Localhost | Network::Hardhat => 250,
                Network::Sepolia | Network::Rinkeby => 4_000,
            }),
            max_wait: None,
            correlation_timeout: Duration::from_secs(60),
            sender: None,
            contract_address: None,
            devnet_block_time: Duration::from_secs(1),
        }
    }

    /// Preset plus `LC_*` environment overrides.
    pub fn from_env(network: Network) -> Result<Self, ConfigError> {
        Self::preset(network).with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from `lookup`:
    ///
    /// - `LC_RPC_URL`, `LC_WS_URL`
    /// - `LC_CHAIN_ID`, `LC_BLOCK_CONFIRMATIONS`
    /// - `LC_POLL_INTERVAL_MS`, `LC_MAX_WAIT_MS`
    /// - `LC_SENDER`, `LC_CONTRACT_ADDRESS`
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = lookup("LC_RPC_URL") {
            self.rpc_url = Some(url);
        }
        if let Some(url) = lookup("LC_WS_URL") {
            self.ws_url = Some(url);
        }
        if let Some(v) = lookup("LC_CHAIN_ID") {
            self.chain_id = parse_u64("LC_CHAIN_ID", &v)?;
        }
        if let Some(v) = lookup("LC_BLOCK_CONFIRMATIONS") {
            self.block_confirmations = parse_u64("LC_BLOCK_CONFIRMATIONS", &v)?;
        }
        if let Some(v) = lookup("LC_POLL_INTERVAL_MS") {
            self.poll_interval = Duration::from_millis(parse_u64("LC_POLL_INTERVAL_MS", &v)?);
        }
        if let Some(v) = lookup("LC_MAX_WAIT_MS") {
            self.max_wait = Some(Duration::from_millis(parse_u64("LC_MAX_WAIT_MS", &v)?));
        }
        if let Some(v) = lookup("LC_SENDER") {
            self.sender = Some(parse_address("LC_SENDER", &v)?);
        }
        if let Some(v) = lookup("LC_CONTRACT_ADDRESS") {
            self.contract_address = Some(parse_address("LC_CONTRACT_ADDRESS", &v)?);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network != Network::Devnet && self.rpc_url.is_none() {
            return Err(ConfigError::MissingEndpoint(self.network));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll interval must be positive".into()));
        }
        if self.max_wait.is_some_and(|w| w.is_zero()) {
            return Err(ConfigError::Invalid("max wait must be positive".into()));
        }
        if self.network == Network::Devnet && self.devnet_block_time.is_zero() {
            return Err(ConfigError::Invalid("devnet block time must be positive".into()));
        }
        Ok(())
    }

    /// Websocket endpoint: explicit, or the RPC URL with its scheme swapped.
    pub fn effective_ws_url(&self) -> Option<String> {
        self.ws_url.clone().or_else(|| {
            self.rpc_url.as_ref().map(|url| {
                if let Some(rest) = url.strip_prefix("https://") {
                    format!("wss://{rest}")
                } else if let Some(rest) = url.strip_prefix("http://") {
                    format!("ws://{rest}")
                } else {
                    url.clone()
                }
            })
        })
    }

    pub fn confirm_config(&self) -> ConfirmConfig {
        ConfirmConfig {
            poll_interval: self.poll_interval,
            default_confirmations: self.block_confirmations,
            max_wait: self.max_wait,
            ..ConfirmConfig::default()
        }
    }
}

fn parse_u64(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_address(key: &'static str, value: &str) -> Result<Address, ConfigError> {
    value.trim().parse().map_err(|e: shared_types::AddressError| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
