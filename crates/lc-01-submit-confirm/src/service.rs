//! # Confirmation Service
//!
//! Implements [`SubmitAndConfirmApi`] on top of a [`LedgerGateway`].
//!
//! The wait is a polling loop: ask the ledger for the request's status every
//! `poll_interval` until it reports enough confirmations or a revert. The
//! optional `max_wait` budget bounds the local wait only; the remote action
//! is never cancelled.

use crate::domain::{
    ConfirmError, ConfirmStats, ConfirmationResult, PendingRequest, SettledResults,
};
use crate::ports::{
    GatewayError, LedgerGateway, SubmitAndConfirmApi, SystemTimeSource, TimeSource,
};
use async_trait::async_trait;
use serde_json::Value;
use shared_types::{Action, ActionParams, LedgerStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Tuning for the confirmation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmConfig {
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Confirmations stamped on new pending requests.
    pub default_confirmations: u64,
    /// Local wait budget. `None` waits indefinitely.
    pub max_wait: Option<Duration>,
    /// How long a settled result answers re-awaits before the ledger is
    /// asked again. `None` keeps results for the life of the service.
    pub settled_max_age: Option<Duration>,
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            default_confirmations: 1,
            max_wait: None,
            settled_max_age: Some(Duration::from_secs(3_600)),
        }
    }
}

/// The SubmitAndConfirm service.
pub struct ConfirmationService {
    gateway: Arc<dyn LedgerGateway>,
    time_source: Arc<dyn TimeSource>,
    config: ConfirmConfig,
    settled: SettledResults,
    stats: Arc<ConfirmStats>,
}

impl ConfirmationService {
    /// Create a service using the system clock.
    pub fn new(gateway: Arc<dyn LedgerGateway>, config: ConfirmConfig) -> Self {
        Self::with_time_source(gateway, Arc::new(SystemTimeSource), config)
    }

    /// Create a service with an explicit clock.
    pub fn with_time_source(
        gateway: Arc<dyn LedgerGateway>,
        time_source: Arc<dyn TimeSource>,
        config: ConfirmConfig,
    ) -> Self {
        Self {
            gateway,
            time_source,
            config,
            settled: SettledResults::new(),
            stats: Arc::new(ConfirmStats::default()),
        }
    }

    pub fn config(&self) -> &ConfirmConfig {
        &self.config
    }

    pub fn stats(&self) -> Arc<ConfirmStats> {
        Arc::clone(&self.stats)
    }

    pub fn settled(&self) -> &SettledResults {
        &self.settled
    }

    /// Wait for the confirmations stamped on the request at submission.
    pub async fn await_default(
        &self,
        request: &PendingRequest,
    ) -> Result<ConfirmationResult, ConfirmError> {
        self.wait(request, request.required_confirmations, self.config.max_wait)
            .await
    }

    /// Submit, then wait for `required` confirmations.
    pub async fn submit_and_confirm(
        &self,
        action: &Action,
        params: &ActionParams,
        required: u64,
    ) -> Result<ConfirmationResult, ConfirmError> {
        let pending = SubmitAndConfirmApi::submit(self, action, params).await?;
        self.wait(&pending, required, self.config.max_wait).await
    }

    async fn wait(
        &self,
        request: &PendingRequest,
        required: u64,
        max_wait: Option<Duration>,
    ) -> Result<ConfirmationResult, ConfirmError> {
        if let Some(max_age) = self.config.settled_max_age {
            self.settled.prune(max_age);
        }
        if let Some(result) = self.settled.lookup(&request.request_id, required) {
            ConfirmStats::bump(&self.stats.total_memo_hits);
            debug!(
                request_id = %request.request_id,
                status = %result.status,
                "Confirmation answered from settled results"
            );
            return Ok(result);
        }

        let mut observed = LedgerStatus::pending();
        let outcome = match max_wait {
            None => self.poll_until_settled(request, required, &mut observed).await,
            Some(limit) => {
                let waited = tokio::time::timeout(
                    limit,
                    self.poll_until_settled(request, required, &mut observed),
                )
                .await;
                match waited {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        ConfirmStats::bump(&self.stats.total_timeouts);
                        warn!(
                            request_id = %request.request_id,
                            action = %request.action,
                            confirmations = observed.confirmations,
                            required,
                            max_wait_ms = limit.as_millis() as u64,
                            "Gave up waiting for confirmation; remote action may still land"
                        );
                        return Ok(ConfirmationResult::timed_out(
                            request.request_id.clone(),
                            &observed,
                        ));
                    }
                }
            }
        };

        if let Ok(result) = &outcome {
            self.settled.record(result);
        }
        outcome
    }

    async fn poll_until_settled(
        &self,
        request: &PendingRequest,
        required: u64,
        observed: &mut LedgerStatus,
    ) -> Result<ConfirmationResult, ConfirmError> {
        let period = self.config.poll_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let status = match self.gateway.get_status(&request.request_id).await {
                Ok(status) => status,
                Err(GatewayError::UnknownRequest(_)) => {
                    debug!(request_id = %request.request_id, "Ledger has not seen request yet");
                    continue;
                }
                Err(GatewayError::Unreachable(msg)) => {
                    ConfirmStats::bump(&self.stats.total_connectivity_failures);
                    warn!(
                        request_id = %request.request_id,
                        error = %msg,
                        "Ledger unreachable while waiting for confirmation"
                    );
                    return Err(ConfirmError::TransientConnectivity(msg));
                }
                Err(e) => return Err(e.into()),
            };

            if status.reverted {
                ConfirmStats::bump(&self.stats.total_reverted);
                let result = ConfirmationResult::reverted(request.request_id.clone(), status);
                warn!(
                    request_id = %request.request_id,
                    action = %request.action,
                    reason = result.reason.as_deref().unwrap_or_default(),
                    "Action reverted"
                );
                return Ok(result);
            }

            if status.included && status.confirmations >= required {
                ConfirmStats::bump(&self.stats.total_confirmed);
                info!(
                    request_id = %request.request_id,
                    action = %request.action,
                    block = status.block_number.unwrap_or_default(),
                    confirmations = status.confirmations,
                    "Action confirmed"
                );
                return Ok(ConfirmationResult::confirmed(
                    request.request_id.clone(),
                    status,
                ));
            }

            if status.confirmations != observed.confirmations || status.included != observed.included {
                debug!(
                    request_id = %request.request_id,
                    included = status.included,
                    confirmations = status.confirmations,
                    required,
                    "Confirmation progress"
                );
            }
            *observed = status;
        }
    }
}

#[async_trait]
impl SubmitAndConfirmApi for ConfirmationService {
    async fn submit(
        &self,
        action: &Action,
        params: &ActionParams,
    ) -> Result<PendingRequest, ConfirmError> {
        match self.gateway.submit(action, params).await {
            Ok(request_id) => {
                ConfirmStats::bump(&self.stats.total_submitted);
                info!(
                    request_id = %request_id,
                    action = %action.method,
                    "Action submitted"
                );
                Ok(PendingRequest::new(
                    request_id,
                    action.method.clone(),
                    self.time_source.now(),
                    self.config.default_confirmations,
                ))
            }
            Err(err) => {
                match &err {
                    GatewayError::Rejected(reason) => {
                        ConfirmStats::bump(&self.stats.total_rejected);
                        warn!(action = %action.method, reason = %reason, "Action rejected");
                    }
                    GatewayError::Unreachable(msg) => {
                        ConfirmStats::bump(&self.stats.total_connectivity_failures);
                        warn!(action = %action.method, error = %msg, "Ledger unreachable on submit");
                    }
                    _ => {}
                }
                Err(err.into())
            }
        }
    }

    async fn await_confirmation(
        &self,
        request: &PendingRequest,
        required: u64,
    ) -> Result<ConfirmationResult, ConfirmError> {
        self.wait(request, required, self.config.max_wait).await
    }

    async fn await_confirmation_within(
        &self,
        request: &PendingRequest,
        required: u64,
        max_wait: Duration,
    ) -> Result<ConfirmationResult, ConfirmError> {
        self.wait(request, required, Some(max_wait)).await
    }

    async fn call(&self, action: &Action, params: &ActionParams) -> Result<Value, ConfirmError> {
        self.gateway.call(action, params).await.map_err(|err| {
            if matches!(err, GatewayError::Unreachable(_)) {
                ConfirmStats::bump(&self.stats.total_connectivity_failures);
            }
            err.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConfirmationStatus;
    use parking_lot::Mutex;
    use serde_json::json;
    use shared_types::{Address, RequestId};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Gateway that replays a scripted sequence of status answers. The last
    /// answer repeats once the script runs out.
    struct ScriptedGateway {
        submit_answer: Mutex<Result<RequestId, GatewayError>>,
        statuses: Mutex<VecDeque<Result<LedgerStatus, GatewayError>>>,
        last: Mutex<Result<LedgerStatus, GatewayError>>,
        status_calls: AtomicUsize,
    }

    impl ScriptedGateway {
        fn new(statuses: Vec<Result<LedgerStatus, GatewayError>>) -> Arc<Self> {
            Arc::new(Self {
                submit_answer: Mutex::new(Ok(RequestId::new("0xabc"))),
                statuses: Mutex::new(statuses.into()),
                last: Mutex::new(Ok(LedgerStatus::pending())),
                status_calls: AtomicUsize::new(0),
            })
        }

        fn refusing(reason: &str) -> Arc<Self> {
            let gateway = Self::new(vec![]);
            *gateway.submit_answer.lock() = Err(GatewayError::Rejected(reason.to_string()));
            gateway
        }

        fn push(&self, status: Result<LedgerStatus, GatewayError>) {
            self.statuses.lock().push_back(status);
        }

        fn calls(&self) -> usize {
            self.status_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LedgerGateway for ScriptedGateway {
        async fn submit(
            &self,
            _action: &Action,
            _params: &ActionParams,
        ) -> Result<RequestId, GatewayError> {
            self.submit_answer.lock().clone()
        }

        async fn get_status(&self, _id: &RequestId) -> Result<LedgerStatus, GatewayError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.statuses.lock().pop_front();
            match next {
                Some(answer) => {
                    *self.last.lock() = answer.clone();
                    answer
                }
                None => self.last.lock().clone(),
            }
        }

        async fn call(&self, action: &Action, _params: &ActionParams) -> Result<Value, GatewayError> {
            Ok(json!({ "method": action.method }))
        }
    }

    fn service(gateway: Arc<ScriptedGateway>, max_wait: Option<Duration>) -> ConfirmationService {
        ConfirmationService::new(
            gateway,
            ConfirmConfig {
                poll_interval: Duration::from_millis(10),
                default_confirmations: 1,
                max_wait,
                settled_max_age: Some(Duration::from_secs(60)),
            },
        )
    }

    fn enter() -> Action {
        Action::call(Address::ZERO, "enterRaffle")
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_after_one_block() {
        let gateway = ScriptedGateway::new(vec![
            Ok(LedgerStatus::pending()),
            Ok(LedgerStatus::included(5, 0)),
            Ok(LedgerStatus::included(5, 1)),
        ]);
        let svc = service(gateway.clone(), None);

        let pending = svc.submit(&enter(), &ActionParams::new()).await.unwrap();
        assert_eq!(pending.request_id.as_str(), "0xabc");
        assert_eq!(pending.required_confirmations, 1);

        let result = svc.await_confirmation(&pending, 1).await.unwrap();
        assert_eq!(result.status, ConfirmationStatus::Confirmed);
        assert_eq!(result.confirmations, 1);
        assert_eq!(result.block_number, Some(5));
        assert_eq!(gateway.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_confirmations_resolves_on_inclusion() {
        let gateway = ScriptedGateway::new(vec![
            Ok(LedgerStatus::pending()),
            Ok(LedgerStatus::included(2, 0)),
        ]);
        let svc = service(gateway, None);
        let pending = svc.submit(&enter(), &ActionParams::new()).await.unwrap();

        let result = svc.await_confirmation(&pending, 0).await.unwrap();
        assert!(result.is_confirmed());
        assert_eq!(result.confirmations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_uses_gateway_count_verbatim() {
        // A node-style gateway already counts the inclusion block as one.
        let gateway = ScriptedGateway::new(vec![
            Ok(LedgerStatus::pending()),
            Ok(LedgerStatus::included(7, 1)),
        ]);
        let svc = service(gateway.clone(), None);
        let pending = svc.submit(&enter(), &ActionParams::new()).await.unwrap();

        let result = svc.await_confirmation(&pending, 1).await.unwrap();
        assert!(result.is_confirmed());
        assert_eq!(result.confirmations, 1);
        assert_eq!(result.block_number, Some(7));
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_revert_is_a_result_not_an_error() {
        let gateway = ScriptedGateway::new(vec![
            Ok(LedgerStatus::pending()),
            Ok(LedgerStatus::reverted("Raffle__NotOpen")),
        ]);
        let svc = service(gateway, None);
        let pending = svc.submit(&enter(), &ActionParams::new()).await.unwrap();

        let result = svc.await_confirmation(&pending, 1).await.unwrap();
        assert_eq!(result.status, ConfirmationStatus::Reverted);
        assert_eq!(result.reason.as_deref(), Some("Raffle__NotOpen"));
        assert_eq!(svc.stats().snapshot().reverted, 1);
    }

    #[tokio::test]
    async fn test_refused_submit_is_action_rejected() {
        let svc = service(ScriptedGateway::refusing("Raffle__NotEnoughETHEntered"), None);

        let err = svc.submit(&enter(), &ActionParams::new()).await.unwrap_err();
        assert!(matches!(
            err,
            ConfirmError::ActionRejected { ref reason, .. } if reason == "Raffle__NotEnoughETHEntered"
        ));
        assert_eq!(svc.stats().snapshot().rejected, 1);
        assert_eq!(svc.stats().snapshot().submitted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_wait_times_out_without_caching() {
        let gateway = ScriptedGateway::new(vec![Ok(LedgerStatus::included(9, 0))]);
        let svc = service(gateway.clone(), Some(Duration::from_millis(500)));
        let pending = svc.submit(&enter(), &ActionParams::new()).await.unwrap();

        let result = svc.await_confirmation(&pending, 3).await.unwrap();
        assert_eq!(result.status, ConfirmationStatus::TimedOut);
        assert_eq!(result.block_number, Some(9));
        assert!(svc.settled().is_empty());

        // The ledger keeps going; a later await sees the real outcome.
        gateway.push(Ok(LedgerStatus::included(9, 3)));
        let result = svc.await_confirmation(&pending, 3).await.unwrap();
        assert!(result.is_confirmed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_budget_overrides_config() {
        let gateway = ScriptedGateway::new(vec![Ok(LedgerStatus::pending())]);
        let svc = service(gateway, None);
        let pending = svc.submit(&enter(), &ActionParams::new()).await.unwrap();

        let started = tokio::time::Instant::now();
        let result = svc
            .await_confirmation_within(&pending, 1, Duration::from_millis(5000))
            .await
            .unwrap();
        assert_eq!(result.status, ConfirmationStatus::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(5000));
        assert_eq!(svc.stats().snapshot().timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_await_returns_same_result() {
        let gateway = ScriptedGateway::new(vec![Ok(LedgerStatus::included(4, 2))]);
        let svc = service(gateway.clone(), None);
        let pending = svc.submit(&enter(), &ActionParams::new()).await.unwrap();

        let first = svc.await_confirmation(&pending, 2).await.unwrap();
        let calls = gateway.calls();
        let second = svc.await_confirmation(&pending, 1).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(gateway.calls(), calls);
        assert_eq!(svc.stats().snapshot().memo_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_result_polls_ledger_again() {
        let gateway = ScriptedGateway::new(vec![Ok(LedgerStatus::included(4, 2))]);
        let svc = service(gateway.clone(), None);
        let pending = svc.submit(&enter(), &ActionParams::new()).await.unwrap();

        svc.await_confirmation(&pending, 2).await.unwrap();
        assert_eq!(svc.settled().len(), 1);

        tokio::time::advance(Duration::from_secs(30)).await;
        let calls = gateway.calls();
        svc.await_confirmation(&pending, 2).await.unwrap();
        assert_eq!(gateway.calls(), calls);

        tokio::time::advance(Duration::from_secs(61)).await;
        let again = svc.await_confirmation(&pending, 2).await.unwrap();
        assert!(again.is_confirmed());
        assert!(gateway.calls() > calls);
        assert_eq!(svc.stats().snapshot().memo_hits, 1);
        assert_eq!(svc.settled().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_mid_wait() {
        let gateway = ScriptedGateway::new(vec![
            Ok(LedgerStatus::pending()),
            Err(GatewayError::Unreachable("connection reset".into())),
        ]);
        let svc = service(gateway, None);
        let pending = svc.submit(&enter(), &ActionParams::new()).await.unwrap();

        let err = svc.await_confirmation(&pending, 1).await.unwrap_err();
        assert_eq!(
            err,
            ConfirmError::TransientConnectivity("connection reset".into())
        );
        assert_eq!(svc.stats().snapshot().connectivity_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_request_keeps_waiting() {
        let gateway = ScriptedGateway::new(vec![
            Err(GatewayError::UnknownRequest(RequestId::new("0xabc"))),
            Err(GatewayError::UnknownRequest(RequestId::new("0xabc"))),
            Ok(LedgerStatus::included(1, 1)),
        ]);
        let svc = service(gateway, None);
        let pending = svc.submit(&enter(), &ActionParams::new()).await.unwrap();

        let result = svc.await_confirmation(&pending, 1).await.unwrap();
        assert!(result.is_confirmed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_and_confirm() {
        let gateway = ScriptedGateway::new(vec![Ok(LedgerStatus::included(3, 1)
            .with_payload(json!({"contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3"})))]);
        let svc = service(gateway, None);

        let result = svc
            .submit_and_confirm(&Action::deploy("SimpleStorage"), &ActionParams::new(), 1)
            .await
            .unwrap();
        assert!(result.payload_field("contractAddress").is_some());
    }

    #[tokio::test]
    async fn test_call_passes_through() {
        let svc = service(ScriptedGateway::new(vec![]), None);
        let value = svc
            .call(&Action::call(Address::ZERO, "getEntranceFee"), &ActionParams::new())
            .await
            .unwrap();
        assert_eq!(value["method"], "getEntranceFee");
    }
}
