//! Devnet configuration.

use primitive_types::U256;
use std::time::Duration;

/// Chain id used by local development nodes.
pub const DEVNET_CHAIN_ID: u64 = 31337;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevnetConfig {
    pub chain_id: u64,
    /// Mine a block for every submitted transaction.
    pub automine: bool,
    /// Also mine on a timer.
    pub block_time: Option<Duration>,
    /// Seconds since the epoch of block zero.
    pub genesis_timestamp: u64,
    /// Number of funded development accounts.
    pub accounts: usize,
    /// Starting balance of every development account, in wei.
    pub initial_balance: U256,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            chain_id: DEVNET_CHAIN_ID,
            automine: true,
            block_time: None,
            genesis_timestamp: 1_700_000_000,
            accounts: 10,
            // 10_000 ETH
            initial_balance: U256::from(10_000u64) * U256::exp10(18),
        }
    }
}

impl DevnetConfig {
    /// Manual mining: transactions wait in the pool until `mine` is called.
    pub fn manual() -> Self {
        Self {
            automine: false,
            ..Self::default()
        }
    }

    pub fn with_block_time(mut self, block_time: Duration) -> Self {
        self.block_time = Some(block_time);
        self
    }
}
