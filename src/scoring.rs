//! Scoring Engine: cross-sectional z-scores and the Instability Index
//! (§4.5). Stateless and pure over a single cycle's batch of
//! `FeatureVector`s; the only per-token carried state (`last_instability`)
//! is passed in explicitly by the Scheduler.
//!
//! Grounded on `scoring.py` line-for-line: `zscore`, `zscore_robust`,
//! `detect_regime`, `compute_instability`, `get_signal_threshold`.

use std::collections::HashMap;

use crate::config::Config;
use crate::types::{FeatureVector, MarketRegime, MarketRegimeLabel, ScoredRow};

const EPS: f64 = 1e-9;
const MAD_SCALE: f64 = 1.4826;
const VELOCITY_BOOST_THRESHOLD: f64 = 0.5;
const DATA_PRESENCE_EPSILON: f64 = 0.0001;
const MIN_THRESHOLD: f64 = 4.0;
const DEGEN_VOLUME_FLOOR: f64 = 500_000.0;
const DEGEN_VOLUME_HISTORY_MULTIPLIER: f64 = 2.0;
const DEGEN_VOL_Z_THRESHOLD: f64 = 1.5;

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn std_dev(xs: &[f64], m: f64) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    (xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Standard z-score against the batch mean/std.
pub fn zscore(series: &[f64]) -> Vec<f64> {
    let m = mean(series);
    let sd = std_dev(series, m);
    series.iter().map(|x| (x - m) / (sd + EPS)).collect()
}

/// Median/MAD robust z-score (scale 1.4826). Falls back to plain std if
/// MAD≈0; falls back to an all-zero series if both are ≈0 (§ Invariants).
pub fn zscore_robust(series: &[f64]) -> Vec<f64> {
    if series.is_empty() {
        return Vec::new();
    }
    let mut sorted = series.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let med = median(&sorted);

    let mut abs_dev: Vec<f64> = series.iter().map(|x| (x - med).abs()).collect();
    abs_dev.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mad = median(&abs_dev);

    if mad < 1e-7 {
        let m = mean(series);
        let sd = std_dev(series, m);
        if sd < EPS {
            return vec![0.0; series.len()];
        }
        return series.iter().map(|x| (x - med) / (sd + EPS)).collect();
    }

    series.iter().map(|x| (x - med) / (MAD_SCALE * mad + EPS)).collect()
}

/// DEGEN if total batch `volume_5m` exceeds 2× its historical average,
/// or (absent history) the batch's robust z-score of volume exceeds 1.5
/// or total volume exceeds $500k. STABLE otherwise.
pub fn detect_regime(volumes_5m: &[f64], avg_vol_history: f64) -> MarketRegimeLabel {
    if volumes_5m.is_empty() {
        return MarketRegimeLabel::Stable;
    }

    let total_vol: f64 = volumes_5m.iter().sum();
    if avg_vol_history > 0.0 && total_vol > avg_vol_history * DEGEN_VOLUME_HISTORY_MULTIPLIER {
        return MarketRegimeLabel::Degen;
    }

    let vol_z = mean(&zscore_robust(volumes_5m));
    if vol_z > DEGEN_VOL_Z_THRESHOLD || total_vol > DEGEN_VOLUME_FLOOR {
        return MarketRegimeLabel::Degen;
    }

    MarketRegimeLabel::Stable
}

struct Weights {
    sa: f64,
    holder: f64,
    vs: f64,
    swr: f64,
    vi: f64,
    sell: f64,
}

fn regime_weights(cfg: &Config, regime: MarketRegimeLabel) -> Weights {
    let mut w = Weights {
        sa: cfg.weight_sa,
        holder: cfg.weight_holder,
        vs: cfg.weight_vs,
        swr: cfg.weight_swr,
        vi: cfg.weight_vi,
        sell: cfg.weight_sell,
    };
    if regime == MarketRegimeLabel::Degen {
        w.swr *= 1.5;
        w.vi *= 1.8;
        w.sa *= 1.2;
        w.holder *= 0.8;
    }
    w
}

/// Cross-sectional Instability Index for a whole cycle batch. `last_instability`
/// supplies each token's prior-cycle value (by token id) to compute
/// `delta_instability`; tokens absent from it get `delta = 0`.
pub fn compute_instability(
    batch: &[FeatureVector],
    cfg: &Config,
    avg_vol_history: f64,
    last_instability: &HashMap<i64, f64>,
    now_ms: i64,
) -> (Vec<ScoredRow>, MarketRegime) {
    if batch.is_empty() {
        return (
            Vec::new(),
            MarketRegime { label: MarketRegimeLabel::Stable, batch_total_volume: 0.0, observed_at_ms: now_ms },
        );
    }

    let volumes_5m: Vec<f64> = batch.iter().map(|f| f.vol_intensity * (f.liquidity + 1.0)).collect();
    let batch_total_volume_5m: f64 = volumes_5m.iter().sum();
    let regime_label = detect_regime(&volumes_5m, avg_vol_history);
    let w = regime_weights(cfg, regime_label);

    let sa: Vec<f64> = batch.iter().map(|f| f.sa).collect();
    let holder: Vec<f64> = batch.iter().map(|f| f.holder_acc).collect();
    let vs: Vec<f64> = batch.iter().map(|f| f.vol_shift).collect();
    let swr: Vec<f64> = batch.iter().map(|f| f.swr).collect();
    let vi: Vec<f64> = batch.iter().map(|f| f.vol_intensity).collect();
    let sell: Vec<f64> = batch.iter().map(|f| f.sell_pressure).collect();

    let z_sa = zscore_robust(&sa);
    let z_holder = zscore_robust(&holder);
    let z_vs = zscore_robust(&vs);
    let z_swr = zscore_robust(&swr);
    let z_vi = zscore_robust(&vi);
    let z_sell = zscore_robust(&sell);

    let mut rows = Vec::with_capacity(batch.len());
    for (i, fv) in batch.iter().enumerate() {
        let mut instability = w.sa * z_sa[i] + w.holder * z_holder[i] + w.vs * z_vs[i]
            + w.swr * z_swr[i]
            + w.vi * z_vi[i]
            - w.sell * z_sell[i];

        if fv.vol_intensity > VELOCITY_BOOST_THRESHOLD {
            instability += fv.vol_intensity.ln_1p() * (w.vi * 1.5);
        }

        if fv.sa > 0.0 || fv.holder_acc > 0.0 || fv.vol_intensity > 0.0 {
            instability += DATA_PRESENCE_EPSILON;
        }

        let previous = last_instability.get(&fv.token_id).copied();
        let delta_instability = previous.map(|p| instability - p).unwrap_or(0.0);

        rows.push(ScoredRow {
            features: fv.clone(),
            instability,
            delta_instability,
            regime: regime_label,
        });
    }

    (
        rows,
        MarketRegime { label: regime_label, batch_total_volume: batch_total_volume_5m, observed_at_ms: now_ms },
    )
}

/// `max(percentile(series, p·100), absoluteFloor)`; batches smaller than
/// `minBatch` use the floor directly (too few points for a meaningful
/// percentile).
pub fn signal_threshold(instability: &[f64], cfg: &Config) -> f64 {
    if instability.is_empty() {
        return 99.0;
    }
    if instability.len() < cfg.min_batch_size {
        return MIN_THRESHOLD;
    }

    let mut sorted = instability.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let threshold = percentile(&sorted, cfg.signal_percentile);
    threshold.max(MIN_THRESHOLD)
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = p * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
}
