//! Notifier: best-effort delivery of emitted `Signal`s to an external
//! sink (§6 `sendSignalAlert`). The core never awaits delivery success —
//! a slow or failing webhook must never hold up the next scan cycle.
//!
//! The webhook transport follows `providers::market_data`'s shape (a
//! single shared `reqwest::Client`, one bounded per-call timeout); the
//! logging stub is the default so the crate runs with zero external
//! configuration.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::types::Signal;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Fire a signal alert. Implementations should not propagate transport
    /// errors to the caller — they are expected to log and drop.
    async fn send_signal_alert(&self, signal: &Signal);
}

/// Default notifier: logs the signal at INFO. Always available, never
/// fails, used when no webhook is configured.
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send_signal_alert(&self, signal: &Signal) {
        info!(
            address = %signal.address,
            confidence = signal.confidence,
            kelly_size = signal.kelly_size,
            degen_score = signal.degen_score,
            "signal alert"
        );
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    address: &'a str,
    entry_price: f64,
    confidence: f64,
    kelly_size: f64,
    degen_score: f64,
    hard_stop: f64,
    take_profit_1: f64,
}

impl<'a> From<&'a Signal> for WebhookPayload<'a> {
    fn from(s: &'a Signal) -> Self {
        Self {
            address: &s.address,
            entry_price: s.entry_price,
            confidence: s.confidence,
            kelly_size: s.kelly_size,
            degen_score: s.degen_score,
            hard_stop: s.hard_stop,
            take_profit_1: s.take_profit_1,
        }
    }
}

/// Posts each signal as JSON to a configured webhook URL (Slack/Discord-
/// shaped or a plain ingest endpoint). A failed POST is logged and
/// discarded — never retried, never surfaced to the Scheduler.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self { client: reqwest::Client::new(), url, timeout: Duration::from_secs(5) }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_signal_alert(&self, signal: &Signal) {
        let payload = WebhookPayload::from(signal);
        let result = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await;

        if let Err(e) = result {
            warn!(error = %e, address = %signal.address, "notifier: webhook delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Known;

    fn sample_signal() -> Signal {
        Signal {
            token_id: 1,
            address: "abcpump".to_string(),
            observed_at_ms: 0,
            instability_index: 10.0,
            entry_price: 1.0,
            liquidity: 4000.0,
            marketcap: 60_000.0,
            confidence: 0.6,
            kelly_size: 0.1,
            insider_probability: Known::Known(0.1),
            creator_risk: Known::Known(0.1),
            degen_score: 50.0,
            hard_stop: 0.85,
            take_profit_1: 1.4,
            trailing_trigger: 1.4,
            trailing_distance: 0.2,
            ai_summary: Known::Unknown,
        }
    }

    #[tokio::test]
    async fn logging_notifier_never_panics() {
        let notifier = LoggingNotifier;
        notifier.send_signal_alert(&sample_signal()).await;
    }

    #[tokio::test]
    async fn webhook_notifier_swallows_connection_failure() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:1/unreachable".to_string());
        notifier.send_signal_alert(&sample_signal()).await;
    }
}
