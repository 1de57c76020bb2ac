//! Bayesian confidence and fractional-Kelly sizing (§4.6d, §4.6e).
//!
//! Grounded on `AlphaEngine.calculate_bayesian_confidence`/
//! `calculate_kelly_size` in `optimization.py`, and on the likelihood-ratio
//! cascade assembled in `early_detector/signals.py`'s `process_signals`.

use crate::config::Config;
use crate::types::{FeatureVector, Known, MarketRegimeLabel};

/// Updates a prior via odds multiplication by a list of likelihood ratios,
/// then clips the posterior to `[0.01, 0.99]`.
pub fn bayesian_confidence(prior: f64, likelihoods: &[f64]) -> f64 {
    if likelihoods.is_empty() {
        return prior;
    }
    let odds = prior / (1.0 - prior + 1e-9);
    let final_odds = likelihoods.iter().fold(odds, |acc, lr| acc * lr);
    let posterior = final_odds / (1.0 + final_odds);
    posterior.clamp(0.01, 0.99)
}

/// Assembles the likelihood ratios named by §4.6d and returns the resulting
/// posterior.
pub fn confidence_for_row(
    fv: &FeatureVector,
    regime: MarketRegimeLabel,
    instability: f64,
    delta_instability: f64,
    threshold: f64,
    cfg: &Config,
) -> f64 {
    let mut likelihoods = Vec::with_capacity(8);

    if regime == MarketRegimeLabel::Degen {
        likelihoods.push(1.1);
    }

    match fv.creator_risk {
        Known::Known(risk) if risk < 0.15 => likelihoods.push(1.3),
        Known::Known(risk) if risk > 0.5 => likelihoods.push(0.6),
        Known::Known(_) => {}
        Known::Unknown => likelihoods.push(0.85),
    }

    match fv.insider_psi {
        Known::Known(psi) if psi < 0.10 => likelihoods.push(1.3),
        Known::Known(psi) if psi > 0.5 => likelihoods.push(0.6),
        Known::Known(_) => {}
        Known::Unknown => likelihoods.push(0.85),
    }

    if threshold > 0.0 && instability > 0.0 && (instability / threshold) > 1.5 {
        likelihoods.push(1.25);
    }

    if delta_instability > 20.0 {
        likelihoods.push(1.2);
    } else if delta_instability < -10.0 {
        likelihoods.push(0.8);
    }

    if fv.swr > 0.0 {
        likelihoods.push(1.5);
    }

    if fv.liquidity_is_virtual {
        likelihoods.push(0.80);
    }

    if let Known::Known(top10_pct) = fv.top10_ratio {
        if top10_pct > 80.0 {
            likelihoods.push(0.70);
        } else if top10_pct > 60.0 {
            likelihoods.push(0.85);
        }
    }

    bayesian_confidence(cfg.bayes_prior, &likelihoods)
}

/// Fractional Kelly sizing: `k·(p·w − q·l)/l`, clipped to `[0, 1]`. Returns
/// 0 when the expectancy is non-positive.
pub fn kelly_size(win_prob: f64, avg_win: f64, avg_loss: f64, fraction: f64) -> f64 {
    if avg_loss <= 0.0 {
        return 0.0;
    }
    let q = 1.0 - win_prob;
    let expectancy = win_prob * avg_win - q * avg_loss;
    if expectancy <= 0.0 {
        return 0.0;
    }
    (expectancy / avg_loss * fraction).clamp(0.0, 1.0)
}

/// Full §4.6e sizing: base Kelly, micro-cap cap, moderate-insider-risk
/// halving. Returns `None` when the resulting size is at or below the
/// dust-size floor (0.01).
pub fn size_for_row(fv: &FeatureVector, posterior: f64, cfg: &Config) -> Option<f64> {
    let mut size = kelly_size(posterior, cfg.kelly_avg_win, cfg.kelly_avg_loss, cfg.kelly_fraction);

    if fv.marketcap < cfg.microcap_threshold {
        size = size.min(cfg.max_kelly_microcap);
    }

    if let Known::Known(psi) = fv.insider_psi {
        if (0.4..=0.60).contains(&psi) {
            size *= 0.5;
        }
    }

    if size <= 0.01 {
        None
    } else {
        Some(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_likelihoods_returns_prior() {
        assert_eq!(bayesian_confidence(0.35, &[]), 0.35);
    }

    #[test]
    fn positive_likelihoods_increase_posterior() {
        let posterior = bayesian_confidence(0.35, &[1.3, 1.3, 1.25]);
        assert!(posterior > 0.35);
    }

    #[test]
    fn posterior_is_clipped() {
        let posterior = bayesian_confidence(0.35, &[100.0, 100.0, 100.0]);
        assert!(posterior <= 0.99);
    }

    #[test]
    fn kelly_size_zero_when_expectancy_non_positive() {
        assert_eq!(kelly_size(0.1, 0.40, 0.15, 0.25), 0.0);
    }

    #[test]
    fn kelly_size_matches_reference_formula() {
        // p=0.6, w=0.4, l=0.15, k=0.25 → E=0.6*0.4-0.4*0.15=0.18; kelly=0.18/0.15=1.2; *0.25=0.30
        let size = kelly_size(0.6, 0.40, 0.15, 0.25);
        assert!((size - 0.30).abs() < 1e-9);
    }

    #[test]
    fn microcap_caps_size() {
        let mut cfg = Config::default();
        cfg.max_kelly_microcap = 0.05;
        let fv_microcap = |marketcap: f64, psi: Known<f64>| FeatureVector {
            token_id: 1,
            address: "abc".to_string(),
            name: "Foo".to_string(),
            symbol: "FOO".to_string(),
            price: 1.0,
            liquidity: 4000.0,
            liquidity_is_virtual: false,
            marketcap,
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
            insider_psi: psi,
            creator_risk: Known::Known(0.10),
            mint_authority_present: false,
            freeze_authority_present: false,
            is_bonding_curve: false,
        };

        let fv = fv_microcap(10_000.0, Known::Known(0.10));
        let size = size_for_row(&fv, 0.9, &cfg).expect("size above floor");
        assert!(size <= 0.05);
    }

    #[test]
    fn moderate_insider_risk_halves_size() {
        let cfg = Config::default();
        let fv = FeatureVector {
            token_id: 1,
            address: "abc".to_string(),
            name: "Foo".to_string(),
            symbol: "FOO".to_string(),
            price: 1.0,
            liquidity: 4000.0,
            liquidity_is_virtual: false,
            marketcap: 200_000.0,
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
            insider_psi: Known::Known(0.5),
            creator_risk: Known::Known(0.10),
            mint_authority_present: false,
            freeze_authority_present: false,
            is_bonding_curve: false,
        };
        let halved = size_for_row(&fv, 0.6, &cfg);
        let mut fv_clean = fv.clone();
        fv_clean.insider_psi = Known::Known(0.1);
        let baseline = size_for_row(&fv_clean, 0.6, &cfg);
        assert!(halved.unwrap() < baseline.unwrap());
    }

    #[test]
    fn dust_size_is_filtered() {
        let cfg = Config::default();
        assert_eq!(size_for_row_with_posterior_and_win_loss(0.28, &cfg), None);
    }

    fn size_for_row_with_posterior_and_win_loss(posterior: f64, cfg: &Config) -> Option<f64> {
        let fv = FeatureVector {
            token_id: 1,
            address: "abc".to_string(),
            name: "Foo".to_string(),
            symbol: "FOO".to_string(),
            price: 1.0,
            liquidity: 4000.0,
            liquidity_is_virtual: false,
            marketcap: 200_000.0,
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
        };
        size_for_row(&fv, posterior, cfg)
    }
}
