//! External collaborator interfaces: `MarketDataProvider` and `ChainRPC`.
//!
//! Both are pure-interface traits (§6) so the Collector can be tested
//! against deterministic fakes. The real implementations live in
//! [`market_data`] and [`chain_rpc`]; the latter shares a rotating
//! endpoint pool with a per-endpoint circuit breaker across both
//! `largest_accounts`/`asset_metadata`/`recent_buyers`/`wallet_txs` calls.

pub mod chain_rpc;
pub mod market_data;
pub mod rpc_pool;

use async_trait::async_trait;

use crate::errors::DetectorError;

#[derive(Debug, Clone, Default)]
pub struct PairSnapshot {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub price: f64,
    pub marketcap: f64,
    pub liquidity: f64,
    pub volume_5m: f64,
    pub volume_1h: f64,
    pub buys_5m: u64,
    pub sells_5m: u64,
    pub pair_created_at_ms: Option<i64>,
    pub has_twitter: bool,
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_pair(&self, address: &str) -> Result<Option<PairSnapshot>, DetectorError>;

    /// Price-only fallback for when `fetch_pair` returns nothing useful.
    async fn fetch_price(&self, address: &str) -> Result<Option<f64>, DetectorError>;
}

#[derive(Debug, Clone, Default)]
pub struct LargestAccount {
    pub amount: f64,
}

#[derive(Debug, Clone, Default)]
pub struct AssetMetadata {
    pub creators: Vec<String>,
    pub update_authority: Option<String>,
    pub mint_authority: Option<String>,
    pub freeze_authority: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecentBuyer {
    pub wallet: String,
    pub first_trade_time_ms: i64,
    pub volume: f64,
}

#[derive(Debug, Clone)]
pub struct WalletTx {
    pub sol_delta: f64,
    pub token_transfers: u64,
    pub time_ms: i64,
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Empty for bonding-curve mints — the caller is expected to default
    /// top10 to 100% in that case rather than treat an empty vec as 0%.
    async fn largest_accounts(&self, mint: &str) -> Result<Vec<LargestAccount>, DetectorError>;

    async fn asset_metadata(&self, mint: &str) -> Result<AssetMetadata, DetectorError>;

    async fn recent_buyers(&self, mint: &str, n: usize) -> Result<Vec<RecentBuyer>, DetectorError>;

    async fn wallet_txs(&self, wallet: &str, n: usize) -> Result<Vec<WalletTx>, DetectorError>;
}
