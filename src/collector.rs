//! Collector: given a mint address, composes `MarketDataProvider` and
//! `ChainRpc` calls into a single `TokenMetric` snapshot (§4.2).
//!
//! Grounded on `collector.py::fetch_token_metrics`'s fallback order
//! (DexScreener primary → Jupiter price fallback → pump-suffix virtual
//! liquidity correction → Helius enrichment gated behind
//! `price>0 and liquidity>200`). A single upstream failure degrades the
//! snapshot's fidelity; it never aborts it — the result is always a
//! `TokenMetric`, at worst `TokenMetric::empty()`.

use std::sync::Arc;

use tracing::debug;

use crate::clock::Clock;
use crate::config::Config;
use crate::errors::DetectorError;
use crate::providers::{AssetMetadata, ChainRpc, MarketDataProvider};
use crate::types::{Known, Token, TokenMetric};

/// Everything the Collector learned about a token this cycle: the
/// persisted `TokenMetric` plus the asset metadata needed to keep the
/// `Token` row's authority flags current. Kept separate from `TokenMetric`
/// because authority fields live on `Token` (upserted, mutable) rather
/// than on the append-only metric row (§3's Token/TokenMetric split).
pub struct CollectedSnapshot {
    pub metric: TokenMetric,
    pub asset_metadata: AssetMetadata,
}

pub struct Collector {
    market_data: Arc<dyn MarketDataProvider>,
    chain_rpc: Arc<dyn ChainRpc>,
    clock: Arc<dyn Clock>,
    virtual_liquidity_ratio: f64,
    virtual_liquidity_cap: f64,
    helius_gate_liquidity: f64,
}

impl Collector {
    pub fn new(
        market_data: Arc<dyn MarketDataProvider>,
        chain_rpc: Arc<dyn ChainRpc>,
        clock: Arc<dyn Clock>,
        cfg: &Config,
    ) -> Self {
        Self {
            market_data,
            chain_rpc,
            clock,
            virtual_liquidity_ratio: cfg.virtual_liquidity_ratio,
            virtual_liquidity_cap: cfg.virtual_liquidity_cap,
            helius_gate_liquidity: 200.0,
        }
    }

    /// Collect a single token's snapshot. `token_id` and the token's
    /// bonding-curve flag come from the Store record the Scheduler already
    /// holds — the Collector never upserts the `Token` row itself.
    pub async fn collect(&self, token: &Token, token_id: i64) -> CollectedSnapshot {
        let now = self.clock.now_ms();
        let mut metric = TokenMetric::empty(token_id, now);

        let pair = match self.market_data.fetch_pair(&token.mint).await {
            Ok(p) => p,
            Err(e) => {
                debug!(error=%e, mint=%token.mint, "fetch_pair failed");
                None
            }
        };

        if let Some(pair) = &pair {
            metric.price = pair.price;
            metric.marketcap = pair.marketcap;
            metric.liquidity = pair.liquidity;
            metric.volume_5m = pair.volume_5m;
            metric.volume_1h = pair.volume_1h;
            metric.buys_5m = pair.buys_5m;
            metric.sells_5m = pair.sells_5m;
        }

        if metric.price <= 0.0 {
            match self.market_data.fetch_price(&token.mint).await {
                Ok(Some(price)) => metric.price = price,
                Ok(None) => {}
                Err(e) => debug!(error=%e, mint=%token.mint, "fetch_price failed"),
            }
        }

        if token.is_bonding_curve {
            self.apply_bonding_curve_corrections(&mut metric, token);
            metric.top10_ratio = Known::Known(100.0);
        } else {
            match self.chain_rpc.largest_accounts(&token.mint).await {
                Ok(accounts) if !accounts.is_empty() => {
                    let top10: f64 = accounts.iter().take(10).map(|a| a.amount).sum();
                    let total: f64 = accounts.iter().map(|a| a.amount).sum();
                    if total > 0.0 {
                        metric.top10_ratio = Known::Known((top10 / total * 100.0).min(100.0));
                    }
                }
                Ok(_) => {}
                Err(e) => debug!(error=%e, mint=%token.mint, "largest_accounts failed"),
            }
        }

        let asset_metadata = match self.chain_rpc.asset_metadata(&token.mint).await {
            Ok(meta) => meta,
            Err(e) => {
                debug!(error=%e, mint=%token.mint, "asset_metadata failed");
                AssetMetadata::default()
            }
        };

        // Helius-class enrichment (recent buyers) is gated behind a
        // viability check to preserve the provider's request budget: a
        // dead token with no price and no liquidity is never worth a
        // second RPC round-trip (collector.py's rationale, verbatim).
        if metric.price > 0.0 && metric.liquidity > self.helius_gate_liquidity {
            match self.chain_rpc.recent_buyers(&token.mint, 15).await {
                Ok(buyers) => {
                    metric.smart_wallets_active = buyers.len() as u64;
                }
                Err(e) => debug!(error=%e, mint=%token.mint, "recent_buyers failed"),
            }
        }

        CollectedSnapshot { metric, asset_metadata }
    }

    /// `collector.py`'s V4.4 fix: pump-suffix tokens with no real on-chain
    /// liquidity get a flagged synthetic estimate derived from marketcap,
    /// never a bare zero that downstream gates would read as "no
    /// liquidity whatsoever".
    fn apply_bonding_curve_corrections(&self, metric: &mut TokenMetric, token: &Token) {
        if metric.marketcap <= 0.0 && metric.price > 0.0 {
            metric.marketcap = metric.price * 1_000_000_000.0;
        }
        if metric.liquidity < 100.0 && metric.marketcap > 0.0 {
            metric.liquidity = (metric.marketcap * self.virtual_liquidity_ratio).min(self.virtual_liquidity_cap);
            metric.liquidity_is_virtual = true;
        } else {
            metric.liquidity_is_virtual = false;
        }
        debug!(mint = %token.mint, liquidity = metric.liquidity, virtual = metric.liquidity_is_virtual, "bonding-curve liquidity corrected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::providers::{LargestAccount, PairSnapshot, RecentBuyer, WalletTx};
    use async_trait::async_trait;

    struct FakeMarketData {
        pair: Option<PairSnapshot>,
        price: Option<f64>,
    }

    #[async_trait]
    impl MarketDataProvider for FakeMarketData {
        async fn fetch_pair(&self, _address: &str) -> Result<Option<PairSnapshot>, DetectorError> {
            Ok(self.pair.clone())
        }
        async fn fetch_price(&self, _address: &str) -> Result<Option<f64>, DetectorError> {
            Ok(self.price)
        }
    }

    struct FakeChainRpc {
        accounts: Vec<LargestAccount>,
        buyers: Vec<RecentBuyer>,
    }

    #[async_trait]
    impl ChainRpc for FakeChainRpc {
        async fn largest_accounts(&self, _mint: &str) -> Result<Vec<LargestAccount>, DetectorError> {
            Ok(self.accounts.clone())
        }
        async fn asset_metadata(&self, _mint: &str) -> Result<AssetMetadata, DetectorError> {
            Ok(AssetMetadata::default())
        }
        async fn recent_buyers(&self, _mint: &str, _n: usize) -> Result<Vec<RecentBuyer>, DetectorError> {
            Ok(self.buyers.clone())
        }
        async fn wallet_txs(&self, _wallet: &str, _n: usize) -> Result<Vec<WalletTx>, DetectorError> {
            Ok(Vec::new())
        }
    }

    fn collector(market_data: FakeMarketData, chain_rpc: FakeChainRpc) -> Collector {
        Collector::new(
            Arc::new(market_data),
            Arc::new(chain_rpc),
            Arc::new(FixedClock::new(1_000)),
            &Config::default(),
        )
    }

    #[tokio::test]
    async fn bonding_curve_token_gets_virtual_liquidity_and_full_top10() {
        let token = Token::new("abcpump", 0);
        let c = collector(
            FakeMarketData {
                pair: Some(PairSnapshot {
                    price: 0.001,
                    marketcap: 0.0,
                    liquidity: 0.0,
                    ..Default::default()
                }),
                price: None,
            },
            FakeChainRpc { accounts: vec![], buyers: vec![] },
        );

        let metric = c.collect(&token, 1).await.metric;
        assert!(metric.marketcap > 0.0);
        assert!(metric.liquidity_is_virtual);
        assert!(metric.liquidity <= 2000.0);
        assert_eq!(metric.top10_ratio, Known::Known(100.0));
    }

    #[tokio::test]
    async fn non_bonding_token_computes_top10_from_largest_accounts() {
        let token = Token::new("abcdef", 0);
        let c = collector(
            FakeMarketData {
                pair: Some(PairSnapshot {
                    price: 1.0,
                    marketcap: 100_000.0,
                    liquidity: 10_000.0,
                    ..Default::default()
                }),
                price: None,
            },
            FakeChainRpc {
                accounts: vec![
                    LargestAccount { amount: 80.0 },
                    LargestAccount { amount: 20.0 },
                ],
                buyers: vec![],
            },
        );

        let metric = c.collect(&token, 2).await.metric;
        assert_eq!(metric.top10_ratio, Known::Known(100.0));
        assert!(!metric.liquidity_is_virtual);
    }

    #[tokio::test]
    async fn falls_back_to_price_oracle_when_pair_missing() {
        let token = Token::new("abcdef", 0);
        let c = collector(
            FakeMarketData { pair: None, price: Some(0.5) },
            FakeChainRpc { accounts: vec![], buyers: vec![] },
        );

        let metric = c.collect(&token, 3).await.metric;
        assert_eq!(metric.price, 0.5);
    }

    #[tokio::test]
    async fn recent_buyers_skipped_below_helius_gate() {
        let token = Token::new("abcdef", 0);
        let c = collector(
            FakeMarketData {
                pair: Some(PairSnapshot {
                    price: 1.0,
                    marketcap: 50_000.0,
                    liquidity: 50.0,
                    ..Default::default()
                }),
                price: None,
            },
            FakeChainRpc {
                accounts: vec![],
                buyers: vec![RecentBuyer {
                    wallet: "w1".into(),
                    first_trade_time_ms: 0,
                    volume: 1.0,
                }],
            },
        );

        let metric = c.collect(&token, 4).await.metric;
        assert_eq!(metric.smart_wallets_active, 0);
    }

    #[tokio::test]
    async fn recent_buyers_counted_above_helius_gate() {
        let token = Token::new("abcdef", 0);
        let c = collector(
            FakeMarketData {
                pair: Some(PairSnapshot {
                    price: 1.0,
                    marketcap: 50_000.0,
                    liquidity: 5_000.0,
                    ..Default::default()
                }),
                price: None,
            },
            FakeChainRpc {
                accounts: vec![],
                buyers: vec![RecentBuyer {
                    wallet: "w1".into(),
                    first_trade_time_ms: 0,
                    volume: 1.0,
                }],
            },
        );

        let metric = c.collect(&token, 5).await.metric;
        assert_eq!(metric.smart_wallets_active, 1);
    }
}
