//! Trigger stage of the Signal Gate Cascade (§4.6a).
//!
//! Grounded on `passes_trigger`/`passes_candle_analysis` in
//! `early_detector/signals.py`: the instability/threshold comparison, the
//! collapsing-token guard, the volatility-expansion guard, the momentum
//! fast-track, and the liquidity/marketcap floors, in that order.

use crate::config::Config;
use crate::gate::candles::{passes_candle_gate, Candle};
use crate::types::ScoredRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerRejection {
    BelowThreshold,
    CollapsingInstability,
    VolatilityExpansion,
    LowLiquidity,
    Dust,
    CandlePattern,
}

/// Evaluates the trigger stage for one scored row. `candles` may be empty —
/// the candle-pattern check and the fast-track/age exceptions handle that.
pub fn evaluate_trigger(
    row: &ScoredRow,
    threshold: f64,
    candles: &[Candle],
    cfg: &Config,
) -> Result<(), TriggerRejection> {
    let fv = &row.features;
    let ii = row.instability;
    let delta_ii = row.delta_instability;

    if ii < threshold {
        return Err(TriggerRejection::BelowThreshold);
    }

    if delta_ii < -2.5 && (ii < threshold * 2.0 || delta_ii < -15.0) {
        return Err(TriggerRejection::CollapsingInstability);
    }

    if fv.vol_shift >= 12.0 && ii < threshold * 1.8 {
        return Err(TriggerRejection::VolatilityExpansion);
    }

    // Momentum fast-track: extreme turnover and participation bypass the
    // remaining liquidity/candle checks entirely.
    if fv.vol_intensity > 5.0 && fv.buys_5m > 50 {
        return Ok(());
    }

    if fv.liquidity < cfg.liquidity_min {
        let exception = fv.vol_intensity > 3.0 && ii > threshold;
        if !exception {
            return Err(TriggerRejection::LowLiquidity);
        }
    }

    if fv.marketcap < cfg.mcap_min {
        return Err(TriggerRejection::Dust);
    }

    if passes_candle_gate(candles, fv.age_minutes, cfg) {
        Ok(())
    } else {
        Err(TriggerRejection::CandlePattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureVector, Known, MarketRegimeLabel};

    fn base_row() -> ScoredRow {
        ScoredRow {
            features: FeatureVector {
                token_id: 1,
                address: "abc".to_string(),
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
                swr: 0.0,
                buys_5m: 40,
                sells_5m: 8,
                age_minutes: 30.0,
                price_change_5m_ratio: 1.1,
                insider_psi: Known::Known(0.10),
                creator_risk: Known::Known(0.10),
                mint_authority_present: false,
                freeze_authority_present: false,
                is_bonding_curve: false,
            },
            instability: 5.0,
            delta_instability: 0.0,
            regime: MarketRegimeLabel::Stable,
        }
    }

    #[test]
    fn rejects_below_threshold() {
        let row = base_row();
        let cfg = Config::default();
        assert_eq!(
            evaluate_trigger(&row, 10.0, &[], &cfg),
            Err(TriggerRejection::BelowThreshold)
        );
    }

    #[test]
    fn rejects_collapsing_instability() {
        let mut row = base_row();
        row.instability = 6.0;
        row.delta_instability = -18.0;
        let cfg = Config::default();
        assert_eq!(
            evaluate_trigger(&row, 4.0, &[], &cfg),
            Err(TriggerRejection::CollapsingInstability)
        );
    }

    #[test]
    fn fast_track_bypasses_liquidity_and_candles() {
        let mut row = base_row();
        row.instability = 4.1;
        row.features.vol_intensity = 7.0;
        row.features.buys_5m = 120;
        row.features.liquidity = 800.0;
        let cfg = Config::default();
        assert_eq!(evaluate_trigger(&row, 4.0, &[], &cfg), Ok(()));
    }

    #[test]
    fn rejects_dust_marketcap() {
        let mut row = base_row();
        row.features.marketcap = 1500.0;
        let cfg = Config::default();
        assert_eq!(
            evaluate_trigger(&row, 4.0, &[], &cfg),
            Err(TriggerRejection::Dust)
        );
    }

    #[test]
    fn low_liquidity_exception_on_extreme_momentum() {
        let mut row = base_row();
        row.features.liquidity = 500.0;
        row.features.vol_intensity = 4.0;
        row.instability = 5.0;
        let cfg = Config::default();
        // Candle check will still run since fast-track didn't trigger
        // (buys_5m stayed at 40); with no candles and age 30m it rejects.
        assert_eq!(
            evaluate_trigger(&row, 4.0, &[], &cfg),
            Err(TriggerRejection::CandlePattern)
        );
    }
}
