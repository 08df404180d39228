// Metrics and observability module
// Prometheus collectors for quote gathering, bridge attempts, and
// settlement-wait timing.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

pub static QUOTE_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "bridge_quote_latency_seconds",
        "latency of per-protocol quote fetches",
        &["protocol"]
    )
    .unwrap()
});

pub static BRIDGE_ATTEMPTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bridge_attempts_total",
        "bridge initiations by protocol and outcome",
        &["protocol", "outcome"]
    )
    .unwrap()
});

pub static ATTESTATION_WAIT: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "bridge_settlement_wait_seconds",
        "time spent waiting for attestations or relayer fills",
        &["protocol"]
    )
    .unwrap()
});
