//! Test wiring: one devnet shared by a confirmation service and a correlator.

use lc_01_submit_confirm::{ConfirmConfig, ConfirmationService, SubmitAndConfirmApi};
use lc_02_event_correlator::EventCorrelator;
use lc_04_devnet::{Devnet, DevnetConfig};
use shared_types::{Action, ActionParams, Address};
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub devnet: Arc<Devnet>,
    pub confirmations: Arc<ConfirmationService>,
    pub correlator: EventCorrelator,
}

impl Harness {
    pub fn new(devnet_config: DevnetConfig) -> Self {
        Self::with_confirm_config(
            devnet_config,
            ConfirmConfig {
                poll_interval: Duration::from_millis(50),
                ..ConfirmConfig::default()
            },
        )
    }

    pub fn with_confirm_config(devnet_config: DevnetConfig, confirm: ConfirmConfig) -> Self {
        let devnet = Devnet::new(devnet_config);
        let confirmations = Arc::new(ConfirmationService::new(devnet.clone(), confirm));
        let correlator = EventCorrelator::new(devnet.clone());
        Self {
            devnet,
            confirmations,
            correlator,
        }
    }

    /// Deploy `contract` and return its address. Mines a block first on a
    /// manual devnet.
    pub async fn deploy(&self, contract: &str) -> Address {
        let pending = self
            .confirmations
            .submit(&Action::deploy(contract), &ActionParams::new())
            .await
            .unwrap();
        if !self.devnet.config().automine {
            self.devnet.mine(1).await;
        }
        let result = self
            .confirmations
            .await_confirmation(&pending, 0)
            .await
            .unwrap();
        result
            .payload_field("contractAddress")
            .and_then(|v| v.as_str())
            .unwrap()
            .parse()
            .unwrap()
    }
}
