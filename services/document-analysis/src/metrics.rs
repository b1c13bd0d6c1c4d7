//! Prometheus counters for the analysis pipeline, exported on `/metrics`.

use lexbid_models::{AnalysisSource, FusionSource};
use prometheus::{register_int_counter_vec, IntCounterVec, TextEncoder};
use std::sync::LazyLock;

static ANALYSES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "lexbid_analyses_total",
        "Document analyses run, by outcome",
        &["outcome"]
    )
    .expect("valid analyses counter")
});

static FUSION_DECISIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "lexbid_fusion_decisions_total",
        "Fused classifications, by how the result was chosen",
        &["source"]
    )
    .expect("valid fusion counter")
});

static CHANNEL_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "lexbid_channel_failures_total",
        "Analysis channels that failed, by channel",
        &["channel"]
    )
    .expect("valid channel failure counter")
});

pub fn record_analysis(outcome: &str) {
    ANALYSES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_fusion(source: FusionSource) {
    FUSION_DECISIONS_TOTAL.with_label_values(&[source.kind()]).inc();
}

pub fn record_channel_failure(channel: AnalysisSource) {
    CHANNEL_FAILURES_TOTAL.with_label_values(&[channel.as_str()]).inc();
}

/// All registered metrics in the text exposition format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_else(|_| "Error encoding metrics".to_string())
}
