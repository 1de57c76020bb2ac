//! Feature Engine: pure functions over a token's rolling history (§4.3,
//! §11.1). No I/O; every output is finite by construction.
//!
//! Grounded line-for-line on `features.py`: `holder_acceleration`,
//! `stealth_accumulation`, `volatility_shift`, `sell_pressure`,
//! `compute_liquidity_acceleration`, `compute_volume_hhi`,
//! `compute_dip_recovery`, `volume_intensity`, `compute_momentum_score`,
//! `compute_trend_quality`, `compute_volume_quality`,
//! `compute_relative_strength`.

use crate::types::{FeatureVector, Known, Token, TokenMetric};

const EPS: f64 = 1e-9;

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn std_dev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let variance = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64;
    variance.sqrt()
}

/// `(Δ₁ − Δ₂)/(H_t+1)`, clipped to `[-10, 10]` (§4.3).
pub fn holder_acceleration(h_t: i64, h_t10: i64, h_t20: i64) -> f64 {
    let v1 = (h_t - h_t10) as f64;
    let v2 = (h_t10 - h_t20) as f64;
    let raw = (v1 - v2) / (h_t as f64 + 1.0);
    raw.clamp(-10.0, 10.0)
}

/// `unique_buyers × (1 − sells/buys) × price_stability`, stability term
/// clamped to `[0, 1]`.
pub fn stealth_accumulation(
    unique_buyers: u64,
    sells_20m: u64,
    buys_20m: u64,
    price_series_20m: &[f64],
) -> f64 {
    let sell_ratio = sells_20m as f64 / (buys_20m as f64 + EPS);
    let mean_price = mean(price_series_20m);
    let stability = (1.0 - std_dev(price_series_20m) / (mean_price + EPS)).clamp(0.0, 1.0);
    unique_buyers as f64 * (1.0 - sell_ratio) * stability
}

/// `std(price_5m)/std(price_20m)`.
pub fn volatility_shift(price_20m: &[f64], price_5m: &[f64]) -> f64 {
    std_dev(price_5m) / (std_dev(price_20m) + EPS)
}

/// `sells_5m/(buys_5m+sells_5m+1)`.
pub fn sell_pressure(sells_5m: u64, buys_5m: u64) -> f64 {
    sells_5m as f64 / (buys_5m as f64 + sells_5m as f64 + 1.0)
}

/// Finite second difference of the liquidity series, normalised by the
/// current liquidity. `0.0` if fewer than 3 observations exist.
pub fn liquidity_acceleration(liq_series_newest_first: &[f64]) -> f64 {
    if liq_series_newest_first.len() < 3 {
        return 0.0;
    }
    let l_t = liq_series_newest_first[0];
    let l_t1 = liq_series_newest_first[1];
    let l_t2 = liq_series_newest_first[2];
    let accel = l_t - 2.0 * l_t1 + l_t2;
    accel / (l_t + EPS)
}

/// Herfindahl-Hirschman Index over per-buyer volume shares; `0.0` if no
/// buyer volumes are known.
pub fn volume_hhi(buyer_volumes: &[f64]) -> f64 {
    let total: f64 = buyer_volumes.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    buyer_volumes.iter().map(|v| (v / total).powi(2)).sum()
}

/// `(current − low)/(high − low)` over the price window; `0.5` if flat or
/// too short to have a range.
pub fn dip_recovery(price_series: &[f64]) -> f64 {
    if price_series.len() < 2 {
        return 0.5;
    }
    let high = price_series.iter().cloned().fold(f64::MIN, f64::max);
    let low = price_series.iter().cloned().fold(f64::MAX, f64::min);
    let range = high - low;
    if range <= 0.0 {
        return 0.5;
    }
    let current = *price_series.last().unwrap();
    (current - low) / range
}

/// Turnover velocity: `vol_5m/(liquidity+1)`.
pub fn volume_intensity(vol_5m: f64, liquidity: f64) -> f64 {
    vol_5m / (liquidity + 1.0)
}

/// Weighted blend of price drift, turnover, and price acceleration,
/// normalised to `[0, 1]`. Series must be ordered oldest-first.
pub fn momentum_score(price_series_oldest_first: &[f64], vol_5m: f64, liquidity: f64) -> f64 {
    if price_series_oldest_first.len() < 3 {
        return 0.5;
    }

    let recent = if price_series_oldest_first.len() >= 5 {
        &price_series_oldest_first[price_series_oldest_first.len() - 5..]
    } else {
        price_series_oldest_first
    };
    let price_momentum = if recent.len() >= 2 {
        let start = mean(&recent[..2]);
        let end = mean(&recent[recent.len() - 2..]);
        if start > 0.0 {
            (((end - start) / start).clamp(-0.5, 0.5)) + 0.5
        } else {
            0.5
        }
    } else {
        0.5
    };

    let volume_momentum = if liquidity > 0.0 {
        (vol_5m / liquidity / 2.0).clamp(0.0, 1.0)
    } else {
        0.5
    };

    let last3 = &price_series_oldest_first[price_series_oldest_first.len() - 3..];
    let diffs: Vec<f64> = last3.windows(2).map(|w| w[1] - w[0]).collect();
    let acceleration = if diffs.len() >= 2 {
        let accel_raw = diffs[diffs.len() - 1] - diffs[0];
        let price_range = last3.iter().cloned().fold(f64::MIN, f64::max)
            - last3.iter().cloned().fold(f64::MAX, f64::min);
        if price_range > 0.0 {
            ((accel_raw / price_range + 1.0) / 2.0).clamp(0.0, 1.0)
        } else {
            0.5
        }
    } else {
        0.5
    };

    (price_momentum * 0.4 + volume_momentum * 0.35 + acceleration * 0.25).clamp(0.0, 1.0)
}

/// Trend consistency (higher-highs/higher-lows), directional strength,
/// and move/volatility efficiency, blended into `[0, 1]`. Series must be
/// ordered oldest-first.
pub fn trend_quality(price_series_oldest_first: &[f64]) -> f64 {
    let n = price_series_oldest_first.len();
    if n < 5 {
        return 0.5;
    }

    let mut highs = Vec::new();
    let mut lows = Vec::new();
    for i in 1..n - 1 {
        let (prev, cur, next) = (
            price_series_oldest_first[i - 1],
            price_series_oldest_first[i],
            price_series_oldest_first[i + 1],
        );
        if cur > prev && cur > next {
            highs.push(cur);
        } else if cur < prev && cur < next {
            lows.push(cur);
        }
    }

    let hh_count = if highs.len() > 1 {
        (1..highs.len()).filter(|&i| highs[i] > highs[i - 1]).count()
    } else {
        0
    };
    let hl_count = if lows.len() > 1 {
        (1..lows.len()).filter(|&i| lows[i] > lows[i - 1]).count()
    } else {
        0
    };
    let total_swings = highs.len() + lows.len();
    let consistency = if total_swings > 0 {
        (hh_count + hl_count) as f64 / total_swings.max(1) as f64
    } else {
        0.5
    };

    let up_moves = (1..n).filter(|&i| price_series_oldest_first[i] > price_series_oldest_first[i - 1]).count();
    let trend_strength = up_moves as f64 / (n - 1) as f64;

    let total_move = (price_series_oldest_first[n - 1] - price_series_oldest_first[0]).abs();
    let volatility = std_dev(price_series_oldest_first);
    let efficiency = if total_move > 0.0 && volatility > 0.0 {
        (total_move / (volatility * n as f64 + EPS)).clamp(0.0, 1.0)
    } else {
        0.5
    };

    (consistency * 0.4 + trend_strength * 0.35 + efficiency * 0.25).clamp(0.0, 1.0)
}

/// Piecewise turnover score × buy/sell balance score × participation
/// score, blended into `[0, 1]`.
pub fn volume_quality(volume_5m: f64, liquidity: f64, buys_5m: u64, sells_5m: u64) -> f64 {
    let intensity_score = if liquidity > 0.0 {
        let turnover = volume_5m / liquidity;
        if turnover < 0.1 {
            turnover * 5.0
        } else if turnover < 1.0 {
            0.5 + (turnover - 0.1) * 0.5
        } else if turnover < 3.0 {
            0.9
        } else {
            (1.0 - (turnover - 3.0) * 0.1).max(0.5)
        }
    } else {
        0.3
    };

    let total_trades = buys_5m + sells_5m;
    let balance_score = if total_trades > 0 {
        let buy_ratio = buys_5m as f64 / total_trades as f64;
        if (0.55..=0.75).contains(&buy_ratio) {
            0.9
        } else if (0.45..=0.85).contains(&buy_ratio) {
            0.7
        } else if buy_ratio > 0.85 {
            0.5
        } else {
            0.4
        }
    } else {
        0.5
    };

    let participation_score = if total_trades > 0 {
        (total_trades as f64 / 50.0).clamp(0.3, 1.0)
    } else {
        0.3
    };

    (intensity_score * 0.35 + balance_score * 0.40 + participation_score * 0.25).clamp(0.0, 1.0)
}

/// §11.1: token return vs an optional benchmark series, normalised to
/// `[0, 1]`; neutral `0.5` with no benchmark or too-short a series.
/// Series must be ordered oldest-first.
pub fn relative_strength(
    price_series_oldest_first: &[f64],
    market_prices_oldest_first: Option<&[f64]>,
) -> f64 {
    if price_series_oldest_first.len() < 5 {
        return 0.5;
    }
    let token_start = price_series_oldest_first[0];
    if token_start <= 0.0 {
        return 0.5;
    }
    let token_end = *price_series_oldest_first.last().unwrap();
    let token_return = (token_end - token_start) / token_start;

    match market_prices_oldest_first {
        Some(market) if market.len() >= 5 && market[0] > 0.0 => {
            let market_return = (market[market.len() - 1] - market[0]) / market[0];
            ((token_return - market_return + 0.2) / 0.4).clamp(0.0, 1.0)
        }
        _ => ((token_return + 0.2) / 0.4).clamp(0.0, 1.0),
    }
}

/// Assemble a token's `FeatureVector` from its metric history. `history`
/// must be ordered newest-first (the order `Store::recent_metrics`
/// returns); `swr` comes from the Smart Wallet Engine; `buyer_volumes`
/// from the Collector's recent-buyers enrichment, if any. Every feature
/// is clamped/defaulted to a finite neutral value per-function, so the
/// result is always usable by the Scoring Engine regardless of how thin
/// the history is.
pub fn build_feature_vector(
    token_id: i64,
    address: &str,
    token: &Token,
    history_newest_first: &[TokenMetric],
    swr: f64,
    buyer_volumes: &[f64],
    relative_strength_benchmark: Option<&[f64]>,
    now_ms: i64,
) -> FeatureVector {
    let latest = history_newest_first
        .first()
        .cloned()
        .unwrap_or_else(|| TokenMetric::empty(token_id, now_ms));

    let oldest_first: Vec<&TokenMetric> = history_newest_first.iter().rev().collect();
    let price_series_oldest_first: Vec<f64> = oldest_first.iter().map(|m| m.price).collect();
    let liquidity_series_newest_first: Vec<f64> =
        history_newest_first.iter().map(|m| m.liquidity).collect();

    // 5-minute / 20-minute sub-windows approximated by the tail/whole of
    // the retained history — the Store only hands back what's inside the
    // requested window, so a 20-minute-window query already bounds this.
    let five_min_count = history_newest_first
        .iter()
        .take_while(|m| latest.observed_at_ms - m.observed_at_ms <= 5 * 60_000)
        .count()
        .max(1);
    let price_series_5m: Vec<f64> = price_series_oldest_first
        [price_series_oldest_first.len().saturating_sub(five_min_count)..]
        .to_vec();

    let holders_at = |idx: usize| -> i64 {
        match history_newest_first.get(idx).map(|m| m.holders) {
            Some(Known::Known(h)) => h as i64,
            _ => 0,
        }
    };
    let h_t = holders_at(0);
    let h_t10 = if history_newest_first.len() > 10 { holders_at(10) } else { h_t };
    let h_t20 = if history_newest_first.len() > 20 { holders_at(20) } else { h_t10 };

    let age_minutes = (now_ms - token.first_seen_ms) as f64 / 60_000.0;
    let price_change_5m_ratio = if let Some(&oldest_5m) = price_series_5m.first() {
        if oldest_5m > 0.0 {
            latest.price / oldest_5m
        } else {
            1.0
        }
    } else {
        1.0
    };

    FeatureVector {
        token_id,
        address: address.to_string(),
        name: token.name.clone().value_or_string(),
        symbol: token.symbol.clone().value_or_string(),
        price: latest.price,
        liquidity: latest.liquidity,
        liquidity_is_virtual: latest.liquidity_is_virtual,
        marketcap: latest.marketcap,
        top10_ratio: latest.top10_ratio,
        holders: latest.holders,

        holder_acc: holder_acceleration(h_t, h_t10, h_t20),
        sa: stealth_accumulation(
            if buyer_volumes.is_empty() { latest.buys_5m } else { buyer_volumes.len() as u64 },
            latest.sells_5m,
            latest.buys_5m,
            &price_series_oldest_first,
        ),
        vol_shift: volatility_shift(&price_series_oldest_first, &price_series_5m),
        sell_pressure: sell_pressure(latest.sells_5m, latest.buys_5m),
        liquidity_acceleration: liquidity_acceleration(&liquidity_series_newest_first),
        volume_hhi: volume_hhi(buyer_volumes),
        dip_recovery: dip_recovery(&price_series_5m),
        vol_intensity: volume_intensity(latest.volume_5m, latest.liquidity),
        momentum_score: momentum_score(&price_series_oldest_first, latest.volume_5m, latest.liquidity),
        trend_quality: trend_quality(&price_series_oldest_first),
        volume_quality: volume_quality(latest.volume_5m, latest.liquidity, latest.buys_5m, latest.sells_5m),
        relative_strength: relative_strength_benchmark
            .map(|bench| Known::Known(relative_strength(&price_series_oldest_first, Some(bench))))
            .unwrap_or(Known::Unknown),

        swr,
        buys_5m: latest.buys_5m,
        sells_5m: latest.sells_5m,
        age_minutes,
        price_change_5m_ratio,

        insider_psi: latest.insider_psi,
        creator_risk: latest.creator_risk,
        mint_authority_present: token.mint_authority.is_known(),
        freeze_authority_present: token.freeze_authority.is_known(),
        is_bonding_curve: token.is_bonding_curve,
    }
}

trait KnownStringExt {
    fn value_or_string(self) -> String;
}

impl KnownStringExt for Known<String> {
    fn value_or_string(self) -> String {
        match self {
            Known::Known(s) => s,
            Known::Unknown => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holder_acceleration_clips_to_range() {
        assert_eq!(holder_acceleration(1000, 0, 0), 10.0);
        assert_eq!(holder_acceleration(0, 1000, 0), -10.0);
    }

    #[test]
    fn stealth_accumulation_rewards_few_sells_and_stable_price() {
        let sa = stealth_accumulation(50, 2, 40, &[1.0, 1.0, 1.0, 1.0]);
        assert!(sa > 0.0);
    }

    #[test]
    fn volatility_shift_is_one_for_identical_windows() {
        let series = vec![1.0, 1.1, 0.9, 1.0];
        let vs = volatility_shift(&series, &series);
        assert!((vs - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sell_pressure_bounds() {
        assert!((sell_pressure(0, 0) - 0.0).abs() < 1e-9);
        assert!(sell_pressure(10, 0) < 1.0);
    }

    #[test]
    fn liquidity_acceleration_needs_three_points() {
        assert_eq!(liquidity_acceleration(&[1.0, 2.0]), 0.0);
        assert!(liquidity_acceleration(&[100.0, 90.0, 80.0]) > 0.0);
    }

    #[test]
    fn volume_hhi_is_zero_with_no_data() {
        assert_eq!(volume_hhi(&[]), 0.0);
        assert_eq!(volume_hhi(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn volume_hhi_is_one_for_single_buyer() {
        assert_eq!(volume_hhi(&[100.0]), 1.0);
    }

    #[test]
    fn dip_recovery_flat_series_is_neutral() {
        assert_eq!(dip_recovery(&[1.0, 1.0, 1.0]), 0.5);
    }

    #[test]
    fn dip_recovery_at_high_is_one() {
        assert_eq!(dip_recovery(&[1.0, 0.5, 2.0]), 1.0);
    }

    #[test]
    fn momentum_score_short_series_is_neutral() {
        assert_eq!(momentum_score(&[1.0, 1.0], 10.0, 100.0), 0.5);
    }

    #[test]
    fn momentum_score_is_finite_for_uptrend() {
        let series = vec![1.0, 1.1, 1.2, 1.3, 1.5];
        let score = momentum_score(&series, 50.0, 100.0);
        assert!(score.is_finite());
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn trend_quality_short_series_is_neutral() {
        assert_eq!(trend_quality(&[1.0, 2.0, 3.0]), 0.5);
    }

    #[test]
    fn volume_quality_rewards_balanced_participation() {
        let q = volume_quality(500.0, 1000.0, 30, 15);
        assert!(q > 0.5);
    }

    #[test]
    fn relative_strength_no_benchmark_uses_absolute_return() {
        let series = vec![1.0, 1.0, 1.0, 1.0, 1.2];
        let rs = relative_strength(&series, None);
        assert!(rs > 0.5);
    }

    #[test]
    fn relative_strength_short_series_is_neutral() {
        assert_eq!(relative_strength(&[1.0, 1.0], None), 0.5);
    }

    #[test]
    fn build_feature_vector_handles_empty_history() {
        let token = Token::new("abc", 0);
        let fv = build_feature_vector(1, "abc", &token, &[], 0.1, &[], None, 1_000);
        assert_eq!(fv.price, 0.0);
        assert!(fv.holder_acc.is_finite());
    }
}
