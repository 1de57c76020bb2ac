//! Zero-setup `Store` implementation backed by in-process maps.
//!
//! Used by default (no `sqlite_store` feature needed) and by every test in
//! this crate that needs a `Store` without standing up a database. Natural
//! keys (mint address, wallet address, creator address) are the only
//! identity; the upsert semantics mirror the SQL `ON CONFLICT DO UPDATE`
//! pattern the sqlite-backed store uses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::errors::DetectorError;
use crate::types::{CreatorProfile, Signal, Token, TokenMetric, WalletProfile};

use super::Store;

#[derive(Default)]
struct Inner {
    tokens_by_mint: HashMap<String, i64>,
    tokens_by_id: HashMap<i64, Token>,
    metrics: HashMap<i64, Vec<TokenMetric>>,
    signals: Vec<Signal>,
    wallets: HashMap<String, WalletProfile>,
    creators: HashMap<String, CreatorProfile>,
}

/// In-memory `Store`. Cheap to clone (it's just an `Arc`-free struct
/// wrapping a lock); construct one per test or one per process for the
/// default no-database deployment mode.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    next_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_token(&self, token: &Token) -> Result<i64, DetectorError> {
        let mut inner = self.inner.write();
        if let Some(&id) = inner.tokens_by_mint.get(&token.mint) {
            let existing = inner.tokens_by_id.get_mut(&id).expect("id indexes token");
            if token.name.is_known() {
                existing.name = token.name.clone();
            }
            if token.symbol.is_known() {
                existing.symbol = token.symbol.clone();
            }
            if token.narrative.is_known() {
                existing.narrative = token.narrative.clone();
            }
            if token.creator.is_known() {
                existing.creator = token.creator.clone();
            }
            if token.mint_authority.is_known() {
                existing.mint_authority = token.mint_authority.clone();
            }
            if token.freeze_authority.is_known() {
                existing.freeze_authority = token.freeze_authority.clone();
            }
            return Ok(id);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        inner.tokens_by_mint.insert(token.mint.clone(), id);
        inner.tokens_by_id.insert(id, token.clone());
        Ok(id)
    }

    async fn token_by_mint(&self, mint: &str) -> Result<Option<(i64, Token)>, DetectorError> {
        let inner = self.inner.read();
        Ok(inner
            .tokens_by_mint
            .get(mint)
            .and_then(|id| inner.tokens_by_id.get(id).map(|t| (*id, t.clone()))))
    }

    async fn insert_metric(&self, metric: &TokenMetric) -> Result<(), DetectorError> {
        let mut inner = self.inner.write();
        inner
            .metrics
            .entry(metric.token_id)
            .or_default()
            .push(metric.clone());
        Ok(())
    }

    async fn latest_metrics(
        &self,
        now_ms: i64,
        max_age_ms: i64,
    ) -> Result<Vec<(Token, TokenMetric)>, DetectorError> {
        let inner = self.inner.read();
        let mut out = Vec::new();
        for (token_id, series) in inner.metrics.iter() {
            let Some(latest) = series
                .iter()
                .filter(|m| now_ms - m.observed_at_ms <= max_age_ms)
                .max_by_key(|m| m.observed_at_ms)
            else {
                continue;
            };
            if let Some(token) = inner.tokens_by_id.get(token_id) {
                out.push((token.clone(), latest.clone()));
            }
        }
        Ok(out)
    }

    async fn recent_metrics(
        &self,
        token_id: i64,
        since_ms: i64,
    ) -> Result<Vec<TokenMetric>, DetectorError> {
        let inner = self.inner.read();
        let mut series: Vec<TokenMetric> = inner
            .metrics
            .get(&token_id)
            .map(|v| {
                v.iter()
                    .filter(|m| m.observed_at_ms >= since_ms)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        series.sort_by(|a, b| b.observed_at_ms.cmp(&a.observed_at_ms));
        Ok(series)
    }

    async fn insert_signal(&self, signal: &Signal) -> Result<(), DetectorError> {
        self.inner.write().signals.push(signal.clone());
        Ok(())
    }

    async fn recent_signal_addresses(
        &self,
        since_ms: i64,
    ) -> Result<std::collections::HashSet<String>, DetectorError> {
        let inner = self.inner.read();
        Ok(inner
            .signals
            .iter()
            .filter(|s| s.observed_at_ms >= since_ms)
            .map(|s| s.address.clone())
            .collect())
    }

    async fn upsert_wallet_profile(&self, profile: &WalletProfile) -> Result<(), DetectorError> {
        self.inner
            .write()
            .wallets
            .insert(profile.wallet.clone(), profile.clone());
        Ok(())
    }

    async fn wallet_profiles(&self) -> Result<Vec<WalletProfile>, DetectorError> {
        Ok(self.inner.read().wallets.values().cloned().collect())
    }

    async fn upsert_creator_profile(&self, profile: &CreatorProfile) -> Result<(), DetectorError> {
        self.inner
            .write()
            .creators
            .insert(profile.creator.clone(), profile.clone());
        Ok(())
    }

    async fn creator_profile(&self, creator: &str) -> Result<Option<CreatorProfile>, DetectorError> {
        Ok(self.inner.read().creators.get(creator).cloned())
    }

    async fn known_creators(&self) -> Result<Vec<String>, DetectorError> {
        Ok(self.inner.read().creators.keys().cloned().collect())
    }

    async fn tokens_by_creator(&self, creator: &str) -> Result<Vec<Token>, DetectorError> {
        let inner = self.inner.read();
        Ok(inner
            .tokens_by_id
            .values()
            .filter(|t| matches!(&t.creator, crate::types::Known::Known(c) if c == creator))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(mint: &str) -> Token {
        Token::new(mint, 0)
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_mint() {
        let store = MemoryStore::new();
        let id1 = store.upsert_token(&token("abc")).await.unwrap();
        let id2 = store.upsert_token(&token("abc")).await.unwrap();
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn upsert_preserves_unset_fields_on_second_call() {
        let store = MemoryStore::new();
        let mut t = token("abc");
        t.name = crate::types::Known::Known("Foo".to_string());
        let id = store.upsert_token(&t).await.unwrap();

        // second call supplies no name; existing name must survive.
        let bare = token("abc");
        store.upsert_token(&bare).await.unwrap();
        let (_, fetched) = store.token_by_mint("abc").await.unwrap().unwrap();
        match fetched.name {
            crate::types::Known::Known(name) => assert_eq!(name, "Foo"),
            crate::types::Known::Unknown => panic!("name should have survived the upsert"),
        }
        let _ = id;
    }

    #[tokio::test]
    async fn metrics_are_append_only_and_windowed() {
        let store = MemoryStore::new();
        let id = store.upsert_token(&token("abc")).await.unwrap();
        store
            .insert_metric(&TokenMetric::empty(id, 1_000))
            .await
            .unwrap();
        store
            .insert_metric(&TokenMetric::empty(id, 2_000))
            .await
            .unwrap();

        let latest = store.latest_metrics(2_000, 10_000).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].1.observed_at_ms, 2_000);
    }

    #[tokio::test]
    async fn recent_metrics_are_newest_first_and_window_bounded() {
        let store = MemoryStore::new();
        let id = store.upsert_token(&token("abc")).await.unwrap();
        store.insert_metric(&TokenMetric::empty(id, 1_000)).await.unwrap();
        store.insert_metric(&TokenMetric::empty(id, 2_000)).await.unwrap();
        store.insert_metric(&TokenMetric::empty(id, 3_000)).await.unwrap();

        let series = store.recent_metrics(id, 2_000).await.unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].observed_at_ms, 3_000);
        assert_eq!(series[1].observed_at_ms, 2_000);
    }

    #[tokio::test]
    async fn dedup_window_respects_since() {
        let store = MemoryStore::new();
        let id = store.upsert_token(&token("abc")).await.unwrap();
        let mut sig = sample_signal(id);
        sig.observed_at_ms = 5_000;
        store.insert_signal(&sig).await.unwrap();

        let recent = store.recent_signal_addresses(4_000).await.unwrap();
        assert!(recent.contains("abc"));
        let recent_after = store.recent_signal_addresses(6_000).await.unwrap();
        assert!(!recent_after.contains("abc"));
    }

    fn sample_signal(token_id: i64) -> Signal {
        Signal {
            token_id,
            address: "abc".to_string(),
            observed_at_ms: 0,
            instability_index: 5.0,
            entry_price: 1.0,
            liquidity: 4000.0,
            marketcap: 60_000.0,
            confidence: 0.6,
            kelly_size: 0.1,
            insider_probability: crate::types::Known::Known(0.1),
            creator_risk: crate::types::Known::Known(0.1),
            degen_score: 50.0,
            hard_stop: 0.85,
            take_profit_1: 1.40,
            trailing_trigger: 1.40,
            trailing_distance: 0.20,
            ai_summary: crate::types::Known::Unknown,
        }
    }
}
