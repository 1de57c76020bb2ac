//! Core domain records.
//!
//! Fields that the reference implementation represented as `*_verified`
//! booleans alongside sentinel-zero values are represented here as
//! [`Known<T>`] — there is no "0.0 that might mean missing" anywhere in
//! this module.

use serde::{Deserialize, Serialize};

/// A value that is either known (and verified from an upstream source) or
/// genuinely unknown. Downstream gates must treat `Unknown` as its own
/// branch, never coerce it to a default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Known<T> {
    Known(T),
    Unknown,
}

impl<T: Copy> Known<T> {
    pub fn value_or(self, default: T) -> T {
        match self {
            Known::Known(v) => v,
            Known::Unknown => default,
        }
    }
}

impl<T> Known<T> {
    pub fn is_known(&self) -> bool {
        matches!(self, Known::Known(_))
    }

    pub fn as_ref(&self) -> Known<&T> {
        match self {
            Known::Known(v) => Known::Known(v),
            Known::Unknown => Known::Unknown,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Known<U> {
        match self {
            Known::Known(v) => Known::Known(f(v)),
            Known::Unknown => Known::Unknown,
        }
    }
}

impl<T> Default for Known<T> {
    fn default() -> Self {
        Known::Unknown
    }
}

impl<T> From<Option<T>> for Known<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Known::Known(v),
            None => Known::Unknown,
        }
    }
}

/// Three-way behavioural cluster assigned by the Smart Wallet Engine, plus
/// the two bookkeeping labels the Ingestor/Collector set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletCluster {
    Retail,
    Sniper,
    Insider,
    New,
    HighVolumeNoise,
    Unknown,
}

impl WalletCluster {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletCluster::Retail => "retail",
            WalletCluster::Sniper => "sniper",
            WalletCluster::Insider => "insider",
            WalletCluster::New => "new",
            WalletCluster::HighVolumeNoise => "high_volume_noise",
            WalletCluster::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketRegimeLabel {
    Stable,
    Degen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRegime {
    pub label: MarketRegimeLabel,
    pub batch_total_volume: f64,
    pub observed_at_ms: i64,
}

/// Identity is the mint address; `is_bonding_curve` is derived once at
/// construction time from the "pump" suffix convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub mint: String,
    pub name: Known<String>,
    pub symbol: Known<String>,
    pub first_seen_ms: i64,
    pub narrative: Known<String>,
    pub creator: Known<String>,
    pub mint_authority: Known<String>,
    pub freeze_authority: Known<String>,
    pub is_bonding_curve: bool,
}

impl Token {
    pub fn new(mint: impl Into<String>, first_seen_ms: i64) -> Self {
        let mint = mint.into();
        let is_bonding_curve = mint.ends_with("pump");
        Self {
            mint,
            name: Known::Unknown,
            symbol: Known::Unknown,
            first_seen_ms,
            narrative: Known::Unknown,
            creator: Known::Unknown,
            mint_authority: Known::Unknown,
            freeze_authority: Known::Unknown,
            is_bonding_curve,
        }
    }
}

/// Append-only observation of a token's market state at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMetric {
    pub token_id: i64,
    pub observed_at_ms: i64,
    pub price: f64,
    pub marketcap: f64,
    pub liquidity: f64,
    pub liquidity_is_virtual: bool,
    pub holders: Known<u64>,
    pub volume_5m: f64,
    pub volume_1h: f64,
    pub buys_5m: u64,
    pub sells_5m: u64,
    pub top10_ratio: Known<f64>,
    pub smart_wallets_active: u64,
    pub instability_index: Known<f64>,
    pub insider_psi: Known<f64>,
    pub creator_risk: Known<f64>,
    pub bonding_complete: bool,
}

impl TokenMetric {
    /// A minimal metric with every optional field `Unknown` and every
    /// numeric field zeroed — the Collector's fallback when every upstream
    /// call fails, never a silent partial truth.
    pub fn empty(token_id: i64, observed_at_ms: i64) -> Self {
        Self {
            token_id,
            observed_at_ms,
            price: 0.0,
            marketcap: 0.0,
            liquidity: 0.0,
            liquidity_is_virtual: false,
            holders: Known::Unknown,
            volume_5m: 0.0,
            volume_1h: 0.0,
            buys_5m: 0,
            sells_5m: 0,
            top10_ratio: Known::Unknown,
            smart_wallets_active: 0,
            instability_index: Known::Unknown,
            insider_psi: Known::Unknown,
            creator_risk: Known::Unknown,
            bonding_complete: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletProfile {
    pub wallet: String,
    pub avg_roi: f64,
    pub total_trades: u64,
    pub win_rate: f64,
    pub cluster: WalletCluster,
    pub last_active_ms: i64,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorProfile {
    pub creator: String,
    pub rug_ratio: f64,
    pub avg_lifespan_hours: f64,
    pub total_tokens: u64,
}

/// A feature vector produced by the Feature Engine for a single token in
/// a single cycle. Every field is finite by construction (P3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub token_id: i64,
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub price: f64,
    pub liquidity: f64,
    pub liquidity_is_virtual: bool,
    pub marketcap: f64,
    pub top10_ratio: Known<f64>,
    pub holders: Known<u64>,

    pub holder_acc: f64,
    pub sa: f64,
    pub vol_shift: f64,
    pub sell_pressure: f64,
    pub liquidity_acceleration: f64,
    pub volume_hhi: f64,
    pub dip_recovery: f64,
    pub vol_intensity: f64,
    pub momentum_score: f64,
    pub trend_quality: f64,
    pub volume_quality: f64,
    pub relative_strength: Known<f64>,

    pub swr: f64,
    pub buys_5m: u64,
    pub sells_5m: u64,
    pub age_minutes: f64,
    pub price_change_5m_ratio: f64,

    pub insider_psi: Known<f64>,
    pub creator_risk: Known<f64>,
    pub mint_authority_present: bool,
    pub freeze_authority_present: bool,
    pub is_bonding_curve: bool,
}

/// A scored row after the cross-sectional Scoring Engine has run over the
/// whole cycle batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRow {
    pub features: FeatureVector,
    pub instability: f64,
    pub delta_instability: f64,
    pub regime: MarketRegimeLabel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub token_id: i64,
    pub address: String,
    pub observed_at_ms: i64,
    pub instability_index: f64,
    pub entry_price: f64,
    pub liquidity: f64,
    pub marketcap: f64,
    pub confidence: f64,
    pub kelly_size: f64,
    pub insider_probability: Known<f64>,
    pub creator_risk: Known<f64>,
    pub degen_score: f64,
    pub hard_stop: f64,
    pub take_profit_1: f64,
    pub trailing_trigger: f64,
    pub trailing_distance: f64,
    pub ai_summary: Known<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_value_or_defaults() {
        let known: Known<f64> = Known::Known(0.42);
        let unknown: Known<f64> = Known::Unknown;
        assert_eq!(known.value_or(0.0), 0.42);
        assert_eq!(unknown.value_or(0.0), 0.0);
    }

    #[test]
    fn known_from_option_round_trips() {
        let k: Known<u64> = Some(7).into();
        assert!(k.is_known());
        let u: Known<u64> = None.into();
        assert!(!u.is_known());
    }

    #[test]
    fn bonding_curve_detected_from_mint_suffix() {
        let t = Token::new("abc123pump", 0);
        assert!(t.is_bonding_curve);
        let t2 = Token::new("abc123xyz", 0);
        assert!(!t2.is_bonding_curve);
    }
}
