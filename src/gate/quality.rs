//! Quality gate (§4.6f) and the quantitative fallback degen score (§11.2).
//!
//! Grounded on `passes_quality_gate` and `calculate_quantitative_degen_score`
//! in `early_detector/signals.py`.

use crate::types::{FeatureVector, Known};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityRejection {
    McapTooLow,
    LiquidityTooLow,
    TooNewAndLowScore,
    LowConvictionNoSwr,
}

pub fn evaluate_quality(fv: &FeatureVector, degen_score: f64, posterior: f64) -> Result<(), QualityRejection> {
    if fv.marketcap < 2000.0 {
        return Err(QualityRejection::McapTooLow);
    }

    let min_liq = if fv.liquidity_is_virtual { 300.0 } else { 200.0 };
    if fv.liquidity < min_liq {
        return Err(QualityRejection::LiquidityTooLow);
    }

    if fv.age_minutes < 15.0 && degen_score < 40.0 {
        return Err(QualityRejection::TooNewAndLowScore);
    }

    let psi = fv.insider_psi.value_or(0.0);
    if fv.swr == 0.0 && psi < 0.2 && posterior < 0.50 {
        return Err(QualityRejection::LowConvictionNoSwr);
    }

    Ok(())
}

/// Additive/subtractive 0-100 heuristic, independent of any external AI
/// summary, computed for every row that reaches the quality stage.
pub fn quantitative_degen_score(
    fv: &FeatureVector,
    confidence: f64,
    instability: f64,
    has_noise: bool,
    candle_score: f64,
) -> f64 {
    let mut score = confidence * 100.0;

    if instability > 0.0 {
        score += (instability * 0.5).min(50.0);
    }

    if fv.liquidity_is_virtual {
        score -= 15.0;
    } else if fv.liquidity > 5000.0 {
        score += 10.0;
    } else if fv.liquidity > 1500.0 {
        score += 5.0;
    } else if fv.liquidity > 500.0 {
        score -= 5.0;
    } else {
        score -= 10.0;
    }

    // vol_intensity is vol_5m/(liquidity+1), already a turnover ratio.
    let velocity_pct = fv.vol_intensity * 100.0;
    if velocity_pct > 50.0 {
        score += 15.0;
    } else if velocity_pct > 20.0 {
        score += 10.0;
    } else if velocity_pct > 5.0 {
        score += 5.0;
    }

    if fv.marketcap < 5000.0 {
        score -= 15.0;
    } else if fv.marketcap < 50_000.0 {
        score += 5.0;
    } else if fv.marketcap < 200_000.0 {
        score += 5.0;
    } else if fv.marketcap > 1_000_000.0 {
        score -= 5.0;
    }

    match fv.insider_psi {
        Known::Known(psi) => {
            if psi < 0.2 && velocity_pct > 5.0 {
                score += 10.0;
            } else if psi > 0.5 {
                score -= 15.0;
            }
        }
        Known::Unknown => score -= 5.0,
    }

    match fv.creator_risk {
        Known::Known(risk) => {
            if risk < 0.2 {
                score += 5.0;
            } else if risk > 0.5 {
                score -= 10.0;
            }
        }
        Known::Unknown => score -= 5.0,
    }

    if fv.swr > 0.0 {
        score += (fv.swr * 40.0).min(25.0);
    }

    if has_noise {
        score -= 20.0;
    }

    if let Known::Known(top10_pct) = fv.top10_ratio {
        if top10_pct > 90.0 {
            score -= 20.0;
        } else if top10_pct > 70.0 {
            score -= 10.0;
        }
    }

    if candle_score > 0.5 {
        score += 10.0;
    } else if candle_score > 0.3 {
        score += 5.0;
    }

    score.clamp(0.0, 100.0)
}
