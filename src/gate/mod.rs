//! Signal Gate Cascade (§4.6): `Scanned → Trigger → Safety → Dedup →
//! Confidence+Size → Quality → Persisted → Notified`. A rejection at any
//! stage is terminal for the token this cycle; it returns to `Scanned`
//! next cycle rather than carrying state forward.

pub mod candles;
pub mod confidence;
pub mod quality;
pub mod safety;
pub mod trigger;

use tracing::info;

use crate::config::Config;
use crate::store::Store;
use crate::types::{Known, Signal, Token};
use candles::Candle;

pub use confidence::{confidence_for_row, size_for_row};
pub use quality::quantitative_degen_score;
pub use safety::{evaluate_safety, SafetyRejection};
pub use trigger::{evaluate_trigger, TriggerRejection};

use crate::types::ScoredRow;

#[derive(Debug, Clone, PartialEq)]
pub enum GateRejection {
    Trigger(TriggerRejection),
    Safety(SafetyRejection),
    Dedup,
    SizeBelowFloor,
    Quality(quality::QualityRejection),
}

/// Runs the full cascade for one scored row and either returns the Signal
/// ready to persist, or the stage and reason it was rejected at.
#[allow(clippy::too_many_arguments)]
pub async fn evaluate_row(
    row: &ScoredRow,
    token: &Token,
    candles: &[Candle],
    threshold: f64,
    has_noise: bool,
    candle_score: f64,
    cfg: &Config,
    store: &dyn Store,
    now_ms: i64,
) -> Result<Signal, GateRejection> {
    let fv = &row.features;

    evaluate_trigger(row, threshold, candles, cfg).map_err(GateRejection::Trigger)?;
    evaluate_safety(fv, cfg).map_err(GateRejection::Safety)?;

    let since_ms = now_ms - cfg.dedup_window_min * 60_000;
    let recent = store
        .recent_signal_addresses(since_ms)
        .await
        .unwrap_or_default();
    if recent.contains(&fv.address) {
        info!(address = %fv.address, "gate: rejected, dedup window active");
        return Err(GateRejection::Dedup);
    }

    let posterior = confidence_for_row(fv, row.regime, row.instability, row.delta_instability, threshold, cfg);
    let size = size_for_row(fv, posterior, cfg).ok_or(GateRejection::SizeBelowFloor)?;

    let degen_score = quantitative_degen_score(fv, posterior, row.instability, has_noise, candle_score);

    quality::evaluate_quality(fv, degen_score, posterior).map_err(GateRejection::Quality)?;

    let hard_stop = fv.price * (1.0 - 0.15);
    let take_profit_1 = fv.price * (1.0 + 0.40);

    Ok(Signal {
        token_id: fv.token_id,
        address: fv.address.clone(),
        observed_at_ms: now_ms,
        instability_index: row.instability,
        entry_price: fv.price,
        liquidity: fv.liquidity,
        marketcap: fv.marketcap,
        confidence: posterior,
        kelly_size: size,
        insider_probability: fv.insider_psi,
        creator_risk: fv.creator_risk,
        degen_score,
        hard_stop,
        take_profit_1,
        trailing_trigger: take_profit_1,
        trailing_distance: 0.20,
        ai_summary: Known::Unknown,
    })
}

/// Logs a rejection at INFO with its stage and reason — gate rejections are
/// expected traffic, never errors (§7).
pub fn log_rejection(address: &str, rejection: &GateRejection) {
    match rejection {
        GateRejection::Trigger(r) => info!(address, stage = "trigger", reason = ?r, "gate: rejected"),
        GateRejection::Safety(r) => info!(address, stage = "safety", reason = ?r, "gate: rejected"),
        GateRejection::Dedup => info!(address, stage = "dedup", "gate: rejected"),
        GateRejection::SizeBelowFloor => info!(address, stage = "sizing", "gate: rejected, size below floor"),
        GateRejection::Quality(r) => info!(address, stage = "quality", reason = ?r, "gate: rejected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FixedClock};
    use crate::store::memory_store::MemoryStore;
    use crate::types::{FeatureVector, MarketRegimeLabel};

    fn healthy_row() -> ScoredRow {
        ScoredRow {
            features: FeatureVector {
                token_id: 1,
                address: "abcpump".to_string(),
                name: "Foo".to_string(),
                symbol: "FOO".to_string(),
                price: 1.0,
                liquidity: 4000.0,
                liquidity_is_virtual: false,
                marketcap: 60_000.0,
                top10_ratio: Known::Known(30.0),
                holders: Known::Known(200),
                holder_acc: 0.0,
                sa: 0.0,
                vol_shift: 1.0,
                sell_pressure: 0.2,
                liquidity_acceleration: 0.0,
                volume_hhi: 0.0,
                dip_recovery: 0.5,
                vol_intensity: 1.2,
                momentum_score: 0.5,
                trend_quality: 0.5,
                volume_quality: 0.5,
                relative_strength: Known::Unknown,
                swr: 0.3,
                buys_5m: 40,
                sells_5m: 8,
                age_minutes: 30.0,
                price_change_5m_ratio: 1.1,
                insider_psi: Known::Known(0.05),
                creator_risk: Known::Known(0.05),
                mint_authority_present: false,
                freeze_authority_present: false,
                is_bonding_curve: true,
            },
            instability: 7.0,
            delta_instability: 0.0,
            regime: MarketRegimeLabel::Stable,
        }
    }

    #[tokio::test]
    async fn cold_start_single_healthy_token_emits_signal() {
        let row = healthy_row();
        let token = Token::new("abcpump", 0);
        let cfg = Config::default();
        let store = MemoryStore::new();
        let clock = FixedClock::new(0);

        let signal = evaluate_row(&row, &token, &[], 4.0, false, 0.0, &cfg, &store, clock.now_ms())
            .await
            .expect("should emit");

        assert!(signal.confidence >= 0.55);
        assert!(signal.kelly_size >= 0.05);
        assert_eq!(signal.hard_stop, row.features.price * 0.85);
        assert_eq!(signal.take_profit_1, row.features.price * 1.40);
    }

    #[tokio::test]
    async fn dust_guard_rejects() {
        let mut row = healthy_row();
        row.features.marketcap = 1500.0;
        let token = Token::new("abcpump", 0);
        let cfg = Config::default();
        let store = MemoryStore::new();

        let result = evaluate_row(&row, &token, &[], 4.0, false, 0.0, &cfg, &store, 0).await;
        assert!(matches!(
            result,
            Err(GateRejection::Trigger(TriggerRejection::Dust))
        ));
    }

    #[tokio::test]
    async fn unknown_top10_above_microcap_rejects() {
        let mut row = healthy_row();
        row.features.top10_ratio = Known::Unknown;
        row.features.marketcap = 60_000.0;
        let token = Token::new("abcpump", 0);
        let cfg = Config::default();
        let store = MemoryStore::new();

        let result = evaluate_row(&row, &token, &[], 4.0, false, 0.0, &cfg, &store, 0).await;
        assert!(matches!(
            result,
            Err(GateRejection::Safety(SafetyRejection::Top10UnknownAboveMicrocap))
        ));
    }

    #[tokio::test]
    async fn fast_track_admits_micro_liquidity_high_momentum() {
        let mut row = healthy_row();
        row.instability = 4.1;
        row.features.vol_intensity = 7.0;
        row.features.buys_5m = 120;
        row.features.liquidity = 800.0;
        row.features.marketcap = 40_000.0;
        let token = Token::new("abcpump", 0);
        let cfg = Config::default();
        let store = MemoryStore::new();

        let signal = evaluate_row(&row, &token, &[], 4.0, false, 0.0, &cfg, &store, 0)
            .await
            .expect("fast track should emit");
        assert!(signal.kelly_size <= cfg.max_kelly_microcap + 1e-9);
    }

    #[tokio::test]
    async fn collapsing_instability_rejects() {
        let mut row = healthy_row();
        row.instability = 6.0;
        row.delta_instability = -18.0;
        let token = Token::new("abcpump", 0);
        let cfg = Config::default();
        let store = MemoryStore::new();

        let result = evaluate_row(&row, &token, &[], 4.0, false, 0.0, &cfg, &store, 0).await;
        assert!(matches!(
            result,
            Err(GateRejection::Trigger(TriggerRejection::CollapsingInstability))
        ));
    }

    #[tokio::test]
    async fn dedup_suppresses_second_signal_in_window() {
        let row = healthy_row();
        let token = Token::new("abcpump", 0);
        let cfg = Config::default();
        let store = MemoryStore::new();

        let first = evaluate_row(&row, &token, &[], 4.0, false, 0.0, &cfg, &store, 1_000)
            .await
            .expect("first should emit");
        store.insert_signal(&first).await.unwrap();

        let second = evaluate_row(&row, &token, &[], 4.0, false, 0.0, &cfg, &store, 2_000).await;
        assert!(matches!(second, Err(GateRejection::Dedup)));
    }
}
