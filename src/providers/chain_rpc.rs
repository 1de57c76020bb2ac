//! `ChainRpc` implementation backed by the rotating [`RpcPool`] + circuit
//! breaker. Bonding-curve mints skip `largest_accounts`/`asset_metadata`
//! entirely (§4.2) — the bonding contract holds supply by construction and
//! the asset usually isn't indexed yet, so the call would just burn a
//! provider credit for a known answer.
//!
//! Grounded on `helius_client.py` (`get_token_largest_accounts`,
//! `get_asset`, `get_token_buyers`'s two-step
//! signatures-then-transactions lookup) and on the teacher's
//! `rpc_manager.rs` pool/timeout/rotation shape.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde_json::{json, Value};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::clock::Clock;
use crate::config::Config;
use crate::errors::{DetectorError, ErrorContext};

use super::rpc_pool::RpcPool;
use super::{AssetMetadata, ChainRpc, LargestAccount, RecentBuyer, WalletTx};

/// Caps outbound RPC calls at a rate no free-tier Helius/public endpoint
/// rejects outright, independent of the pool's per-endpoint 429 cooldown
/// (that cooldown reacts after the fact; this limiter avoids tripping it).
const CALLS_PER_SEC: u32 = 20;
const MAX_RETRIES: usize = 2;

pub struct HttpChainRpc {
    client: reqwest::Client,
    pool: RpcPool,
    helius_url: Option<String>,
    clock: Arc<dyn Clock>,
    helius_cooldown_ms: i64,
    default_cooldown_ms: i64,
    limiter: governor::DefaultDirectRateLimiter,
}

impl HttpChainRpc {
    pub fn new(cfg: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            client: reqwest::Client::new(),
            pool: RpcPool::new(cfg.rpc_endpoints.clone(), (cfg.rpc_cooldown_sec * 1000) as i64),
            helius_url: cfg.helius_endpoints.first().cloned(),
            clock,
            helius_cooldown_ms: (cfg.helius_cooldown_sec * 1000) as i64,
            default_cooldown_ms: (cfg.rpc_cooldown_sec * 1000) as i64,
            limiter: RateLimiter::direct(Quota::per_second(NonZeroU32::new(CALLS_PER_SEC).unwrap())),
        }
    }

    async fn call(&self, url: &str, payload: &Value, timeout: Duration) -> Result<Option<Value>, DetectorError> {
        let retry_strategy = ExponentialBackoff::from_millis(100).map(jitter).take(MAX_RETRIES);
        let resp = Retry::spawn(retry_strategy, || async {
            self.limiter.until_ready().await;
            match tokio::time::timeout(timeout, self.client.post(url).json(payload).send()).await {
                Ok(Ok(r)) => Ok(r),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err("request timed out".to_string()),
            }
        })
        .await;

        match resp {
            Ok(r) if r.status().as_u16() == 429 => {
                let cooldown = if self.helius_url.as_deref() == Some(url) {
                    Some(self.helius_cooldown_ms)
                } else {
                    Some(self.default_cooldown_ms)
                };
                self.pool.disable(url, self.clock.as_ref(), cooldown);
                Ok(None)
            }
            Ok(r) if r.status().is_success() => {
                let body: Value = r
                    .json()
                    .await
                    .map_err(|e| anyhow::Error::from(e).provider_context("chain_rpc", "decoding response"))?;
                if body.get("error").is_some() {
                    return Ok(None);
                }
                Ok(body.get("result").cloned())
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl ChainRpc for HttpChainRpc {
    async fn largest_accounts(&self, mint: &str) -> Result<Vec<LargestAccount>, DetectorError> {
        if mint.ends_with("pump") {
            return Ok(Vec::new());
        }
        let Some(url) = self.pool.next_endpoint(self.clock.as_ref()) else {
            return Ok(Vec::new());
        };

        let payload = json!({
            "jsonrpc": "2.0", "id": 1, "method": "getTokenLargestAccounts", "params": [mint]
        });
        let result = self.call(&url, &payload, Duration::from_secs(8)).await?;
        Ok(result
            .and_then(|r| r.pointer("/value").cloned())
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|acc| {
                acc.get("amount")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<f64>().ok())
                    .map(|amount| LargestAccount { amount })
            })
            .collect())
    }

    async fn asset_metadata(&self, mint: &str) -> Result<AssetMetadata, DetectorError> {
        if mint.ends_with("pump") {
            return Ok(AssetMetadata::default());
        }
        let Some(url) = self.helius_url.clone() else {
            return Ok(AssetMetadata::default());
        };

        let payload = json!({
            "jsonrpc": "2.0", "id": 1, "method": "getAsset", "params": {"id": mint}
        });
        let result = self.call(&url, &payload, Duration::from_secs(8)).await?;
        let Some(asset) = result else {
            return Ok(AssetMetadata::default());
        };

        let creators = asset
            .get("creators")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|c| c.get("address").and_then(Value::as_str).map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Ok(AssetMetadata {
            creators,
            update_authority: asset
                .pointer("/token_info/update_authority")
                .and_then(Value::as_str)
                .map(String::from),
            mint_authority: asset
                .pointer("/token_info/mint_authority")
                .and_then(Value::as_str)
                .map(String::from),
            freeze_authority: asset
                .pointer("/token_info/freeze_authority")
                .and_then(Value::as_str)
                .map(String::from),
        })
    }

    async fn recent_buyers(&self, mint: &str, n: usize) -> Result<Vec<RecentBuyer>, DetectorError> {
        let Some(url) = self.pool.next_endpoint(self.clock.as_ref()) else {
            return Ok(Vec::new());
        };

        let sigs_payload = json!({
            "jsonrpc": "2.0", "id": 1, "method": "getSignaturesForAddress",
            "params": [mint, {"limit": n}]
        });
        let Some(sigs_result) = self.call(&url, &sigs_payload, Duration::from_secs(10)).await? else {
            return Ok(Vec::new());
        };
        let sigs: Vec<String> = sigs_result
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|s| s.get("signature").and_then(Value::as_str).map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        if sigs.is_empty() {
            return Ok(Vec::new());
        }

        let mut buyers = Vec::new();
        for (i, sig) in sigs.iter().take(10).enumerate() {
            let tx_payload = json!({
                "jsonrpc": "2.0", "id": i, "method": "getTransaction",
                "params": [sig, {"encoding": "jsonParsed", "maxSupportedTransactionVersion": 0}]
            });
            if let Some(tx) = self.call(&url, &tx_payload, Duration::from_secs(15)).await? {
                if let Some(wallet) = tx
                    .pointer("/transaction/message/accountKeys/0/pubkey")
                    .and_then(Value::as_str)
                {
                    let block_time_ms = tx.get("blockTime").and_then(Value::as_i64).unwrap_or(0) * 1000;
                    buyers.push(RecentBuyer {
                        wallet: wallet.to_string(),
                        first_trade_time_ms: block_time_ms,
                        volume: 0.0,
                    });
                }
            }
        }
        Ok(buyers)
    }

    async fn wallet_txs(&self, wallet: &str, n: usize) -> Result<Vec<WalletTx>, DetectorError> {
        let Some(url) = self.pool.next_endpoint(self.clock.as_ref()) else {
            return Ok(Vec::new());
        };

        let sigs_payload = json!({
            "jsonrpc": "2.0", "id": 1, "method": "getSignaturesForAddress",
            "params": [wallet, {"limit": n}]
        });
        let Some(sigs_result) = self.call(&url, &sigs_payload, Duration::from_secs(10)).await? else {
            return Ok(Vec::new());
        };
        let sigs: Vec<String> = sigs_result
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|s| s.get("signature").and_then(Value::as_str).map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let mut txs = Vec::new();
        for (i, sig) in sigs.iter().enumerate() {
            let tx_payload = json!({
                "jsonrpc": "2.0", "id": i, "method": "getTransaction",
                "params": [sig, {"encoding": "jsonParsed", "maxSupportedTransactionVersion": 0}]
            });
            if let Some(tx) = self.call(&url, &tx_payload, Duration::from_secs(15)).await? {
                let pre = tx.pointer("/meta/preBalances").and_then(Value::as_array);
                let post = tx.pointer("/meta/postBalances").and_then(Value::as_array);
                let sol_delta = match (pre, post) {
                    (Some(pre), Some(post)) if !pre.is_empty() && !post.is_empty() => {
                        let pre0 = pre[0].as_f64().unwrap_or(0.0);
                        let post0 = post[0].as_f64().unwrap_or(0.0);
                        (post0 - pre0) / 1_000_000_000.0
                    }
                    _ => 0.0,
                };
                let token_transfers = tx
                    .pointer("/meta/postTokenBalances")
                    .and_then(Value::as_array)
                    .map(|v| v.len() as u64)
                    .unwrap_or(0);
                let time_ms = tx.get("blockTime").and_then(Value::as_i64).unwrap_or(0) * 1000;
                txs.push(WalletTx {
                    sol_delta,
                    token_transfers,
                    time_ms,
                });
            }
        }
        Ok(txs)
    }
}
