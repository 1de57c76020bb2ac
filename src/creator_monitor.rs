//! Creator Monitor: periodic background sweep re-evaluating every known
//! creator's rug ratio and average token lifespan (§11.3).
//!
//! Grounded on `early_detector/creator_monitor.py`'s `creator_performance_job`:
//! a rug is `liquidity < 1000 OR marketcap < 5000 OR price == 0`; creators
//! with no currently-evaluable token are left untouched rather than zeroed
//! out. `total_tokens` is preserved from the existing profile on every
//! refresh — this job only ever touches `rug_ratio`/`avg_lifespan_hours`,
//! matching the source's `total_tokens_delta: 0` write.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::errors::DetectorError;
use crate::providers::{MarketDataProvider, PairSnapshot};
use crate::store::Store;
use crate::types::CreatorProfile;

const RUG_LIQUIDITY_FLOOR: f64 = 1000.0;
const RUG_MARKETCAP_FLOOR: f64 = 5000.0;
const HIGH_RISK_RUG_RATIO: f64 = 0.6;
const SOLID_CREATOR_MIN_TOKENS: usize = 2;

fn is_rugged(pair: &PairSnapshot) -> bool {
    pair.liquidity < RUG_LIQUIDITY_FLOOR || pair.marketcap < RUG_MARKETCAP_FLOOR || pair.price == 0.0
}

/// Evaluates one creator's current token snapshots. `samples` pairs each
/// token's age in hours with its freshly-fetched pair (`None` if the fetch
/// failed or the token has no tradeable pair). Returns `None` when nothing
/// was evaluable this round, leaving the creator's stored stats untouched.
pub fn evaluate_creator_tokens(samples: &[(f64, Option<PairSnapshot>)]) -> Option<(f64, f64)> {
    let mut rugged = 0usize;
    let mut evaluated = 0usize;
    let mut lifespans = Vec::with_capacity(samples.len());

    for (hours_since_creation, pair) in samples {
        let Some(pair) = pair else { continue };
        evaluated += 1;
        if is_rugged(pair) {
            rugged += 1;
            lifespans.push(0.0);
        } else {
            lifespans.push(*hours_since_creation);
        }
    }

    if evaluated == 0 {
        return None;
    }

    let rug_ratio = rugged as f64 / evaluated as f64;
    let avg_lifespan = if lifespans.is_empty() {
        0.0
    } else {
        lifespans.iter().sum::<f64>() / lifespans.len() as f64
    };
    Some((rug_ratio, avg_lifespan))
}

/// Runs one sweep over every known creator. Errors from a single creator's
/// fetches don't abort the sweep — pair fetch failures degrade that
/// creator's sample, not the job.
pub async fn run_once(
    store: &dyn Store,
    market_data: &dyn MarketDataProvider,
    clock: &dyn Clock,
) -> Result<(), DetectorError> {
    let creators = store.known_creators().await?;
    let now_ms = clock.now_ms();

    for creator in creators {
        let tokens = store.tokens_by_creator(&creator).await?;
        if tokens.is_empty() {
            continue;
        }

        let mut samples = Vec::with_capacity(tokens.len());
        for token in &tokens {
            let hours_since_creation = (now_ms - token.first_seen_ms) as f64 / 3_600_000.0;
            let pair = market_data.fetch_pair(&token.mint).await.unwrap_or(None);
            samples.push((hours_since_creation, pair));
        }

        let Some((rug_ratio, avg_lifespan_hours)) = evaluate_creator_tokens(&samples) else {
            continue;
        };

        let total_tokens = store
            .creator_profile(&creator)
            .await?
            .map(|p| p.total_tokens)
            .unwrap_or(tokens.len() as u64);

        store
            .upsert_creator_profile(&CreatorProfile {
                creator: creator.clone(),
                rug_ratio,
                avg_lifespan_hours,
                total_tokens,
            })
            .await?;

        if rug_ratio > HIGH_RISK_RUG_RATIO {
            warn!(creator = %creator, rug_ratio, "creator monitor: high rug ratio");
        } else if rug_ratio == 0.0 && tokens.len() >= SOLID_CREATOR_MIN_TOKENS {
            info!(creator = %creator, tokens = tokens.len(), "creator monitor: solid track record");
        }
    }

    Ok(())
}

/// Long-lived job: sleeps `cfg.creator_job_interval_sec` between sweeps.
/// A sweep failure is logged and the loop continues on its normal cadence.
pub async fn run(store: Arc<dyn Store>, market_data: Arc<dyn MarketDataProvider>, clock: Arc<dyn Clock>, cfg: Config) {
    loop {
        tokio::time::sleep(Duration::from_secs(cfg.creator_job_interval_sec)).await;
        if let Err(e) = run_once(store.as_ref(), market_data.as_ref(), clock.as_ref()).await {
            warn!(error = %e, "creator monitor sweep failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::errors::DetectorError as Err_;
    use crate::providers::MarketDataProvider;
    use crate::store::memory_store::MemoryStore;
    use crate::types::{Known, Token};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    fn pair(price: f64, marketcap: f64, liquidity: f64) -> PairSnapshot {
        PairSnapshot { price, marketcap, liquidity, ..Default::default() }
    }

    #[test]
    fn no_evaluable_samples_returns_none() {
        assert_eq!(evaluate_creator_tokens(&[(10.0, None)]), None);
    }

    #[test]
    fn rugged_token_contributes_zero_lifespan() {
        let samples = vec![(5.0, Some(pair(0.0, 0.0, 0.0)))];
        let (rug_ratio, avg_lifespan) = evaluate_creator_tokens(&samples).unwrap();
        assert_eq!(rug_ratio, 1.0);
        assert_eq!(avg_lifespan, 0.0);
    }

    #[test]
    fn healthy_token_uses_its_own_age() {
        let samples = vec![(12.0, Some(pair(1.0, 50_000.0, 5_000.0)))];
        let (rug_ratio, avg_lifespan) = evaluate_creator_tokens(&samples).unwrap();
        assert_eq!(rug_ratio, 0.0);
        assert_eq!(avg_lifespan, 12.0);
    }

    #[test]
    fn mixed_population_blends_ratio_and_lifespan() {
        let samples = vec![
            (24.0, Some(pair(1.0, 50_000.0, 5_000.0))),
            (1.0, Some(pair(0.0, 0.0, 0.0))),
        ];
        let (rug_ratio, avg_lifespan) = evaluate_creator_tokens(&samples).unwrap();
        assert!((rug_ratio - 0.5).abs() < 1e-9);
        assert!((avg_lifespan - 12.0).abs() < 1e-9);
    }

    struct FakeMarketData {
        pairs: Mutex<HashMap<String, PairSnapshot>>,
    }

    #[async_trait]
    impl MarketDataProvider for FakeMarketData {
        async fn fetch_pair(&self, address: &str) -> Result<Option<PairSnapshot>, Err_> {
            Ok(self.pairs.lock().await.get(address).cloned())
        }
        async fn fetch_price(&self, _address: &str) -> Result<Option<f64>, Err_> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn run_once_updates_rug_ratio_and_preserves_total_tokens() {
        let store = MemoryStore::new();
        let mut token = Token::new("abc", 0);
        token.creator = Known::Known("creator1".to_string());
        store.upsert_token(&token).await.unwrap();
        store
            .upsert_creator_profile(&CreatorProfile {
                creator: "creator1".to_string(),
                rug_ratio: 0.0,
                avg_lifespan_hours: 0.0,
                total_tokens: 7,
            })
            .await
            .unwrap();

        let mut pairs = HashMap::new();
        pairs.insert("abc".to_string(), pair(0.0, 0.0, 0.0));
        let market_data = FakeMarketData { pairs: Mutex::new(pairs) };
        let clock = FixedClock::new(3_600_000 * 10);

        run_once(&store, &market_data, &clock).await.unwrap();

        let profile = store.creator_profile("creator1").await.unwrap().unwrap();
        assert_eq!(profile.rug_ratio, 1.0);
        assert_eq!(profile.total_tokens, 7);
    }

    #[tokio::test]
    async fn run_once_skips_creators_with_no_tokens() {
        let store = MemoryStore::new();
        store
            .upsert_creator_profile(&CreatorProfile {
                creator: "ghost".to_string(),
                rug_ratio: 0.0,
                avg_lifespan_hours: 0.0,
                total_tokens: 0,
            })
            .await
            .unwrap();

        let market_data = FakeMarketData { pairs: Mutex::new(HashMap::new()) };
        let clock = FixedClock::new(0);

        run_once(&store, &market_data, &clock).await.unwrap();
        let profile = store.creator_profile("ghost").await.unwrap().unwrap();
        assert_eq!(profile.rug_ratio, 0.0);
    }
}
