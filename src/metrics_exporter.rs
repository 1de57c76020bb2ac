//! Periodic Prometheus Pushgateway reporter, enabled by the
//! `prometheus_exporter` feature.
//!
//! Grounded on `tom14cat14-elite-mev-bot`'s `monitoring_alerting.rs`
//! `PrometheusClient` (endpoint/job_name/instance push shape) — this
//! system has no long-lived request-serving surface worth adding a second
//! HTTP server for, so metrics are pushed rather than scraped, same as
//! that example's `push_metrics` call site.
//!
//! [`crate::metrics::metrics`]'s registry is a plain name→value map, not
//! the `prometheus` crate's own types, so a fresh `prometheus::Registry`
//! is built from its snapshot on every push and thrown away afterward.

use std::time::Duration;

use prometheus::{Encoder, IntGauge, Opts, Registry, TextEncoder};
use tracing::{debug, warn};

use crate::metrics::metrics;

fn render() -> Vec<u8> {
    let registry = Registry::new();
    let snapshot = metrics().export_metrics();

    for (name, value) in &snapshot.counters {
        if let Ok(gauge) = IntGauge::with_opts(Opts::new(format!("{name}_total"), "counter")) {
            gauge.set(*value as i64);
            let _ = registry.register(Box::new(gauge));
        }
    }
    for (name, value) in &snapshot.gauges {
        if let Ok(gauge) = IntGauge::with_opts(Opts::new(name.clone(), "gauge")) {
            gauge.set(*value as i64);
            let _ = registry.register(Box::new(gauge));
        }
    }
    for (name, stats) in &snapshot.histograms {
        for (suffix, value) in [
            ("p50", stats.p50),
            ("p95", stats.p95),
            ("p99", stats.p99),
            ("count", stats.count),
        ] {
            if let Ok(gauge) = IntGauge::with_opts(Opts::new(format!("{name}_{suffix}"), "histogram summary")) {
                gauge.set(value as i64);
                let _ = registry.register(Box::new(gauge));
            }
        }
    }

    let mut buf = Vec::new();
    let _ = TextEncoder::new().encode(&registry.gather(), &mut buf);
    buf
}

/// Pushes the current metrics snapshot to `endpoint/metrics/job/<job_name>/instance/<instance>`
/// (the standard Pushgateway path convention) every `interval_sec`. Runs until the process
/// exits; a failed push is logged and the loop continues on its normal cadence.
pub async fn run(endpoint: String, job_name: String, instance: String, interval_sec: u64) {
    let client = reqwest::Client::new();
    let url = format!("{}/metrics/job/{}/instance/{}", endpoint.trim_end_matches('/'), job_name, instance);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_sec));

    loop {
        ticker.tick().await;
        let body = render();
        match client.post(&url).body(body).send().await {
            Ok(resp) if resp.status().is_success() => debug!(%url, "pushed metrics snapshot"),
            Ok(resp) => warn!(%url, status = %resp.status(), "pushgateway rejected metrics push"),
            Err(e) => warn!(error = %e, %url, "metrics push failed"),
        }
    }
}
