//! `MarketDataProvider` implementation: a DexScreener-shaped pair
//! aggregator as primary, a Jupiter-shaped price endpoint as fallback.
//!
//! Grounded on `collector.py::fetch_dexscreener_pair` /
//! `fetch_jupiter_price`: same fallback order, same per-call timeout
//! discipline, same "pick the pair with the highest liquidity" tie-break.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use moka::sync::Cache;
use serde_json::Value;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::errors::{DetectorError, ErrorContext};

use super::{MarketDataProvider, PairSnapshot};

/// DexScreener's public tier throttles well under what the fan-out in
/// `Scheduler::collect_all` would otherwise burst at; this keeps the
/// collector under that ceiling instead of discovering it via 429s.
const CALLS_PER_SEC: u32 = 15;
const MAX_RETRIES: usize = 2;

pub struct HttpMarketDataProvider {
    client: reqwest::Client,
    pair_url_base: String,
    price_url_base: String,
    pair_timeout: Duration,
    price_timeout: Duration,
    /// Short-lived cache so a token scanned every cycle doesn't double-hit
    /// the upstream API within the same second under bursty fan-out.
    cache: Cache<String, Option<PairSnapshot>>,
    limiter: governor::DefaultDirectRateLimiter,
}

impl HttpMarketDataProvider {
    pub fn new(pair_url_base: String, price_url_base: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            pair_url_base,
            price_url_base,
            pair_timeout: Duration::from_secs(10),
            price_timeout: Duration::from_secs(8),
            cache: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(Duration::from_secs(3))
                .build(),
            limiter: RateLimiter::direct(Quota::per_second(NonZeroU32::new(CALLS_PER_SEC).unwrap())),
        }
    }

    async fn get_with_retry(&self, url: &str, timeout: Duration) -> Option<reqwest::Response> {
        let retry_strategy = ExponentialBackoff::from_millis(100).map(jitter).take(MAX_RETRIES);
        Retry::spawn(retry_strategy, || async {
            self.limiter.until_ready().await;
            match tokio::time::timeout(timeout, self.client.get(url).send()).await {
                Ok(Ok(r)) => Ok(r),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err("request timed out".to_string()),
            }
        })
        .await
        .ok()
    }

    fn parse_pair(body: &Value) -> Option<PairSnapshot> {
        let pairs = body.get("pairs")?.as_array()?;
        if pairs.is_empty() {
            return None;
        }
        let pair = pairs.iter().max_by(|a, b| {
            let la = a
                .pointer("/liquidity/usd")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let lb = b
                .pointer("/liquidity/usd")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            la.partial_cmp(&lb).unwrap_or(std::cmp::Ordering::Equal)
        })?;

        let has_twitter = pair
            .pointer("/info/socials")
            .and_then(Value::as_array)
            .map(|socials| {
                socials
                    .iter()
                    .any(|s| s.get("type").and_then(Value::as_str) == Some("twitter"))
            })
            .unwrap_or(false);

        Some(PairSnapshot {
            name: pair.pointer("/baseToken/name").and_then(Value::as_str).map(String::from),
            symbol: pair
                .pointer("/baseToken/symbol")
                .and_then(Value::as_str)
                .map(String::from),
            price: pair
                .get("priceUsd")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0),
            marketcap: pair.get("fdv").and_then(Value::as_f64).unwrap_or(0.0),
            liquidity: pair.pointer("/liquidity/usd").and_then(Value::as_f64).unwrap_or(0.0),
            volume_5m: pair.pointer("/volume/m5").and_then(Value::as_f64).unwrap_or(0.0),
            volume_1h: pair.pointer("/volume/h1").and_then(Value::as_f64).unwrap_or(0.0),
            buys_5m: pair.pointer("/txns/m5/buys").and_then(Value::as_u64).unwrap_or(0),
            sells_5m: pair.pointer("/txns/m5/sells").and_then(Value::as_u64).unwrap_or(0),
            pair_created_at_ms: pair.get("pairCreatedAt").and_then(Value::as_i64),
            has_twitter,
        })
    }
}

#[async_trait]
impl MarketDataProvider for HttpMarketDataProvider {
    async fn fetch_pair(&self, address: &str) -> Result<Option<PairSnapshot>, DetectorError> {
        if let Some(cached) = self.cache.get(address) {
            return Ok(cached);
        }

        let url = format!("{}/dex/tokens/{}", self.pair_url_base, address);
        let snapshot = match self.get_with_retry(&url, self.pair_timeout).await {
            Some(resp) if resp.status().is_success() => {
                let body: Value = resp
                    .json()
                    .await
                    .map_err(|e| anyhow::Error::from(e).provider_context("market_data", "decoding pair response"))?;
                Self::parse_pair(&body)
            }
            _ => None,
        };

        self.cache.insert(address.to_string(), snapshot.clone());
        Ok(snapshot)
    }

    async fn fetch_price(&self, address: &str) -> Result<Option<f64>, DetectorError> {
        let url = format!("{}?ids={}", self.price_url_base, address);
        match self.get_with_retry(&url, self.price_timeout).await {
            Some(resp) if resp.status().is_success() => {
                let body: Value = resp
                    .json()
                    .await
                    .map_err(|e| anyhow::Error::from(e).provider_context("market_data", "decoding price response"))?;
                Ok(body
                    .pointer(&format!("/data/{}/price", address))
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<f64>().ok())
                    .filter(|p| *p > 0.0))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pair_picks_highest_liquidity_and_flags_twitter() {
        let body = serde_json::json!({
            "pairs": [
                {
                    "baseToken": {"name": "Low", "symbol": "LOW"},
                    "priceUsd": "0.01",
                    "fdv": 1000.0,
                    "liquidity": {"usd": 100.0},
                    "volume": {"m5": 10.0, "h1": 50.0},
                    "txns": {"m5": {"buys": 1, "sells": 1}},
                    "info": {"socials": []}
                },
                {
                    "baseToken": {"name": "High", "symbol": "HI"},
                    "priceUsd": "0.02",
                    "fdv": 2000.0,
                    "liquidity": {"usd": 5000.0},
                    "volume": {"m5": 20.0, "h1": 80.0},
                    "txns": {"m5": {"buys": 5, "sells": 2}},
                    "pairCreatedAt": 123456,
                    "info": {"socials": [{"type": "twitter"}]}
                }
            ]
        });

        let snap = HttpMarketDataProvider::parse_pair(&body).unwrap();
        assert_eq!(snap.symbol.as_deref(), Some("HI"));
        assert!(snap.has_twitter);
        assert_eq!(snap.buys_5m, 5);
        assert_eq!(snap.pair_created_at_ms, Some(123456));
    }

    #[test]
    fn parse_pair_returns_none_for_empty_pairs() {
        let body = serde_json::json!({"pairs": []});
        assert!(HttpMarketDataProvider::parse_pair(&body).is_none());
    }
}
