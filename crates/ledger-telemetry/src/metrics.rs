//! Prometheus metrics for the confirmation protocol and the correlator.
//!
//! All metrics follow the naming convention: `lc_<component>_<metric>_<unit>`
//!
//! The services keep their own atomic counters; this module mirrors their
//! snapshots into the registry when asked, so the hot paths never touch
//! prometheus.

use lazy_static::lazy_static;
use lc_01_submit_confirm::ConfirmStatsSnapshot;
use lc_02_event_correlator::CorrelatorStatsSnapshot;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Registry for everything below.
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // CONFIRMATION METRICS (lc-01)
    // =========================================================================

    /// Requests by outcome: submitted, rejected, confirmed, reverted,
    /// timed_out, connectivity_failure, memo_hit.
    pub static ref CONFIRM_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("lc_confirm_requests_total", "Confirmation requests by outcome"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Wall time from submit to settled result.
    pub static ref CONFIRM_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "lc_confirm_duration_seconds",
            "Time from submission to a settled confirmation result"
        ).buckets(exponential_buckets(0.01, 2.0, 14).expect("bucket layout"))
    ).expect("metric creation failed");

    /// Last block number seen by a script.
    pub static ref LEDGER_HEAD: IntGauge = IntGauge::new(
        "lc_ledger_head_block",
        "Most recent block number observed"
    ).expect("metric creation failed");

    // =========================================================================
    // CORRELATOR METRICS (lc-02)
    // =========================================================================

    /// Watches by outcome: registered, matched, timed_out, cancelled,
    /// stream_failure.
    pub static ref CORRELATOR_WATCHES: IntCounterVec = IntCounterVec::new(
        Opts::new("lc_correlator_watches_total", "Correlation watches by outcome"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Channel subscriptions currently held open.
    pub static ref CORRELATOR_SUBSCRIPTIONS: IntGauge = IntGauge::new(
        "lc_correlator_subscriptions_open",
        "Channel subscriptions currently open"
    ).expect("metric creation failed");
}

/// Register all metrics. Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(CONFIRM_REQUESTS.clone()),
        Box::new(CONFIRM_DURATION.clone()),
        Box::new(LEDGER_HEAD.clone()),
        Box::new(CORRELATOR_WATCHES.clone()),
        Box::new(CORRELATOR_SUBSCRIPTIONS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Raise a counter to `total`. Counters never go down.
fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

/// Mirror a confirmation service snapshot.
pub fn record_confirm_stats(stats: &ConfirmStatsSnapshot) {
    for (outcome, total) in [
        ("submitted", stats.submitted),
        ("rejected", stats.rejected),
        ("confirmed", stats.confirmed),
        ("reverted", stats.reverted),
        ("timed_out", stats.timeouts),
        ("connectivity_failure", stats.connectivity_failures),
        ("memo_hit", stats.memo_hits),
    ] {
        advance(&CONFIRM_REQUESTS.with_label_values(&[outcome]), total);
    }
}

/// Mirror a correlator snapshot.
pub fn record_correlator_stats(stats: &CorrelatorStatsSnapshot) {
    for (outcome, total) in [
        ("registered", stats.watches),
        ("matched", stats.matched),
        ("timed_out", stats.timeouts),
        ("cancelled", stats.cancelled),
        ("stream_failure", stats.stream_failures),
    ] {
        advance(&CORRELATOR_WATCHES.with_label_values(&[outcome]), total);
    }
    let open = stats
        .subscriptions_opened
        .saturating_sub(stats.subscriptions_closed);
    CORRELATOR_SUBSCRIPTIONS.set(i64::try_from(open).unwrap_or(i64::MAX));
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Observes elapsed seconds into a histogram on drop.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
