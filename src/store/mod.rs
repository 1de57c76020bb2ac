//! Persistent storage for tokens, observations, wallet/creator profiles and
//! emitted signals.
//!
//! The trait is intentionally narrow — every query the rest of the crate
//! needs, and nothing a dashboard or backfill script would also want. Two
//! implementations are provided: [`memory_store::MemoryStore`] (zero setup,
//! used by tests and by default) and [`sqlite_store::SqliteStore`] (behind
//! the `sqlite_store` feature).

pub mod memory_store;
#[cfg(feature = "sqlite_store")]
pub mod sqlite_store;

use async_trait::async_trait;
use std::collections::HashSet;

use crate::errors::DetectorError;
use crate::types::{CreatorProfile, Signal, Token, TokenMetric, WalletProfile};

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert the token if its mint is new, otherwise update the mutable
    /// fields (name/symbol/narrative arrive progressively). Returns the
    /// token's internal id either way.
    async fn upsert_token(&self, token: &Token) -> Result<i64, DetectorError>;

    async fn token_by_mint(&self, mint: &str) -> Result<Option<(i64, Token)>, DetectorError>;

    /// Append-only observation insert.
    async fn insert_metric(&self, metric: &TokenMetric) -> Result<(), DetectorError>;

    /// The latest observation per token, paired with the token record
    /// itself, for every token observed within `max_age_ms` of `now_ms`.
    async fn latest_metrics(
        &self,
        now_ms: i64,
        max_age_ms: i64,
    ) -> Result<Vec<(Token, TokenMetric)>, DetectorError>;

    /// A single token's observation history within `since_ms`, newest
    /// first — the rolling window the Feature Engine builds its price/
    /// liquidity/holder series from (§6 `recentMetrics`).
    async fn recent_metrics(
        &self,
        token_id: i64,
        since_ms: i64,
    ) -> Result<Vec<TokenMetric>, DetectorError>;

    async fn insert_signal(&self, signal: &Signal) -> Result<(), DetectorError>;

    /// Addresses that have already produced a signal since `since_ms`, used
    /// by the gate cascade's dedup stage.
    async fn recent_signal_addresses(&self, since_ms: i64) -> Result<HashSet<String>, DetectorError>;

    async fn upsert_wallet_profile(&self, profile: &WalletProfile) -> Result<(), DetectorError>;

    async fn wallet_profiles(&self) -> Result<Vec<WalletProfile>, DetectorError>;

    async fn upsert_creator_profile(&self, profile: &CreatorProfile) -> Result<(), DetectorError>;

    async fn creator_profile(&self, creator: &str) -> Result<Option<CreatorProfile>, DetectorError>;

    /// Every creator address that has launched at least one token, for the
    /// creator-monitor job's periodic sweep.
    async fn known_creators(&self) -> Result<Vec<String>, DetectorError>;

    /// Tokens launched by `creator`, used to re-evaluate rug ratio and
    /// average lifespan.
    async fn tokens_by_creator(&self, creator: &str) -> Result<Vec<Token>, DetectorError>;
}
