//! Safety-filter stage of the Signal Gate Cascade (§4.6b).
//!
//! Grounded on `passes_safety_filters` in `early_detector/signals.py`:
//! fail-closed on on-chain authorities and supply concentration, but
//! permissive for missing top10 evidence on micro-caps.

use crate::config::Config;
use crate::types::{FeatureVector, Known};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyRejection {
    MintAuthorityPresent,
    FreezeAuthorityPresent,
    Top10Concentrated,
    Top10UnknownAboveMicrocap,
    TooFewHolders,
    InsiderRiskHigh,
    CreatorRiskHigh,
    PriceSpike,
}

pub fn evaluate_safety(fv: &FeatureVector, cfg: &Config) -> Result<(), SafetyRejection> {
    if fv.mint_authority_present {
        return Err(SafetyRejection::MintAuthorityPresent);
    }
    if fv.freeze_authority_present {
        return Err(SafetyRejection::FreezeAuthorityPresent);
    }

    match fv.top10_ratio {
        Known::Unknown => {
            if fv.marketcap > cfg.microcap_threshold {
                return Err(SafetyRejection::Top10UnknownAboveMicrocap);
            }
        }
        Known::Known(top10_pct) => {
            if !fv.is_bonding_curve {
                let threshold_pct = cfg.top10_max_ratio * 100.0;
                if top10_pct > threshold_pct {
                    return Err(SafetyRejection::Top10Concentrated);
                }
            }
        }
    }

    let holders = fv.holders.value_or(0);
    if holders < cfg.holders_min && fv.marketcap > 30_000.0 {
        return Err(SafetyRejection::TooFewHolders);
    }

    if let Known::Known(psi) = fv.insider_psi {
        if psi > 0.60 {
            return Err(SafetyRejection::InsiderRiskHigh);
        }
    }

    if let Known::Known(creator_risk) = fv.creator_risk {
        if creator_risk > 0.55 {
            return Err(SafetyRejection::CreatorRiskHigh);
        }
    }

    if fv.price_change_5m_ratio >= 5.0 {
        return Err(SafetyRejection::PriceSpike);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_fv() -> FeatureVector {
        FeatureVector {
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
        }
    }

    #[test]
    fn passes_clean_token() {
        let cfg = Config::default();
        assert_eq!(evaluate_safety(&base_fv(), &cfg), Ok(()));
    }

    #[test]
    fn rejects_mint_authority() {
        let mut fv = base_fv();
        fv.mint_authority_present = true;
        let cfg = Config::default();
        assert_eq!(
            evaluate_safety(&fv, &cfg),
            Err(SafetyRejection::MintAuthorityPresent)
        );
    }

    #[test]
    fn rejects_unknown_top10_above_microcap() {
        let mut fv = base_fv();
        fv.top10_ratio = Known::Unknown;
        fv.marketcap = 60_000.0;
        let cfg = Config::default();
        assert_eq!(
            evaluate_safety(&fv, &cfg),
            Err(SafetyRejection::Top10UnknownAboveMicrocap)
        );
    }

    #[test]
    fn allows_unknown_top10_under_microcap() {
        let mut fv = base_fv();
        fv.top10_ratio = Known::Unknown;
        fv.marketcap = 10_000.0;
        let cfg = Config::default();
        assert_eq!(evaluate_safety(&fv, &cfg), Ok(()));
    }

    #[test]
    fn bonding_curve_tokens_skip_top10_check() {
        let mut fv = base_fv();
        fv.top10_ratio = Known::Known(100.0);
        fv.is_bonding_curve = true;
        let cfg = Config::default();
        assert_eq!(evaluate_safety(&fv, &cfg), Ok(()));
    }

    #[test]
    fn rejects_high_insider_psi_only_when_verified() {
        let mut fv = base_fv();
        fv.insider_psi = Known::Known(0.70);
        let cfg = Config::default();
        assert_eq!(
            evaluate_safety(&fv, &cfg),
            Err(SafetyRejection::InsiderRiskHigh)
        );

        fv.insider_psi = Known::Unknown;
        assert_eq!(evaluate_safety(&fv, &cfg), Ok(()));
    }

    #[test]
    fn rejects_price_spike() {
        let mut fv = base_fv();
        fv.price_change_5m_ratio = 6.0;
        let cfg = Config::default();
        assert_eq!(evaluate_safety(&fv, &cfg), Err(SafetyRejection::PriceSpike));
    }
}
