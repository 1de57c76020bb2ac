//! Smart Wallet Engine: per-wallet profiling, k-means(k=3) behavioural
//! clustering, rotation ratio (SWR), coordinated-entry detection, and the
//! sigmoid insider-probability model (§4.4).
//!
//! Grounded on `smart_wallets.py`: `compute_wallet_stats`,
//! `detect_smart_wallets`, `cluster_wallets`, `compute_swr`,
//! `detect_coordinated_entry`, `compute_p_insider`, `compute_insider_score`.

use std::collections::HashSet;

use crate::config::Config;
use crate::providers::WalletTx;
use crate::types::{WalletCluster, WalletProfile};

const EPS: f64 = 1e-9;

/// A "trade" per §4.4 is a signed SOL delta accompanied by a non-SOL
/// counterparty token transfer in the same transaction; transfers with
/// no token leg are noise (fee sweeps, rent reclaims) and excluded.
pub fn compute_wallet_stats(wallet: &str, txs: &[WalletTx], last_active_ms: i64) -> WalletProfile {
    let trades: Vec<&WalletTx> = txs.iter().filter(|t| t.token_transfers > 0).collect();

    if trades.is_empty() {
        return WalletProfile {
            wallet: wallet.to_string(),
            avg_roi: 1.0,
            total_trades: 0,
            win_rate: 0.0,
            cluster: WalletCluster::New,
            last_active_ms,
            verified: false,
        };
    }

    let net_sol: f64 = trades.iter().map(|t| t.sol_delta).sum();
    let negative_flows: f64 = trades
        .iter()
        .filter(|t| t.sol_delta < 0.0)
        .map(|t| t.sol_delta.abs())
        .sum();
    let avg_roi = 1.0 + net_sol / (negative_flows + EPS);

    let wins = trades.iter().filter(|t| t.sol_delta > 0.0).count();
    let win_rate = wins as f64 / trades.len() as f64;

    WalletProfile {
        wallet: wallet.to_string(),
        avg_roi,
        total_trades: trades.len() as u64,
        win_rate,
        cluster: WalletCluster::Unknown,
        last_active_ms,
        verified: false,
    }
}

/// `avg_roi > ROIₘᵢₙ ∧ total_trades ≥ Tₘᵢₙ ∧ win_rate > WRₘᵢₙ` (§4.4).
pub fn is_smart_wallet(profile: &WalletProfile, cfg: &Config) -> bool {
    profile.avg_roi > cfg.sw_min_roi
        && profile.total_trades >= cfg.sw_min_trades
        && profile.win_rate > cfg.sw_min_win_rate
}

/// k-means over `(avg_roi, total_trades, win_rate)` with k=3, labelled
/// post-hoc by ascending avg_roi centroid: {retail, sniper, insider}.
/// Fewer than 3 wallets leaves every cluster `Unknown` (no population to
/// cluster against), matching the source's short-circuit.
///
/// Initial centroids are chosen deterministically (wallets sorted by
/// avg_roi, centroids seeded at the 1/6, 1/2, 5/6 quantile positions)
/// rather than via randomized restarts — `sklearn`'s `random_state=42,
/// n_init=10` behaviour isn't reproducible outside that library, and a
/// fixed seed would be misleading given this crate has no RNG dependency.
pub fn cluster_wallets(mut profiles: Vec<WalletProfile>) -> Vec<WalletProfile> {
    if profiles.len() < 3 {
        for p in &mut profiles {
            p.cluster = WalletCluster::Unknown;
        }
        return profiles;
    }

    let points: Vec<[f64; 3]> = profiles
        .iter()
        .map(|p| [p.avg_roi, p.total_trades as f64, p.win_rate])
        .collect();

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| points[a][0].partial_cmp(&points[b][0]).unwrap());
    let seed_at = |frac: f64| order[((order.len() - 1) as f64 * frac).round() as usize];
    let mut centroids: [[f64; 3]; 3] = [
        points[seed_at(1.0 / 6.0)],
        points[seed_at(0.5)],
        points[seed_at(5.0 / 6.0)],
    ];

    let mut assignment = vec![0usize; points.len()];
    for _ in 0..50 {
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let mut best = 0;
            let mut best_dist = f64::MAX;
            for (k, c) in centroids.iter().enumerate() {
                let d = sq_dist(p, c);
                if d < best_dist {
                    best_dist = d;
                    best = k;
                }
            }
            if assignment[i] != best {
                assignment[i] = best;
                changed = true;
            }
        }

        let mut sums = [[0.0; 3]; 3];
        let mut counts = [0usize; 3];
        for (i, p) in points.iter().enumerate() {
            let k = assignment[i];
            for d in 0..3 {
                sums[k][d] += p[d];
            }
            counts[k] += 1;
        }
        for k in 0..3 {
            if counts[k] > 0 {
                for d in 0..3 {
                    centroids[k][d] = sums[k][d] / counts[k] as f64;
                }
            }
        }

        if !changed {
            break;
        }
    }

    let mut centroid_order: Vec<usize> = (0..3).collect();
    centroid_order.sort_by(|&a, &b| centroids[a][0].partial_cmp(&centroids[b][0]).unwrap());
    let mut label_of = [WalletCluster::Unknown; 3];
    label_of[centroid_order[0]] = WalletCluster::Retail;
    label_of[centroid_order[1]] = WalletCluster::Sniper;
    label_of[centroid_order[2]] = WalletCluster::Insider;

    for (i, profile) in profiles.iter_mut().enumerate() {
        profile.cluster = label_of[assignment[i]];
    }
    profiles
}

fn sq_dist(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

const NOISE_MIN_TRADES: u64 = 50;
const NOISE_MAX_ROI: f64 = 1.2;
const NOISE_MAX_WIN_RATE: f64 = 0.15;

/// High-frequency, low-conviction churn: many trades, near break-even ROI,
/// poor win rate. Grounded on `scripts/verify_scoring_v5.py`'s `NOISE_BOT`
/// fixture (`avg_roi: 1.0, win_rate: 0.1, cluster_label: "high_volume_noise"`).
/// Applied as an override on top of [`cluster_wallets`]'s k-means labels
/// rather than folded into the clustering itself, since noise wallets are a
/// threshold rule, not a behavioural cluster the centroid search would find.
pub fn flag_high_volume_noise(mut profiles: Vec<WalletProfile>) -> Vec<WalletProfile> {
    for p in &mut profiles {
        if p.total_trades >= NOISE_MIN_TRADES && p.avg_roi <= NOISE_MAX_ROI && p.win_rate <= NOISE_MAX_WIN_RATE {
            p.cluster = WalletCluster::HighVolumeNoise;
        }
    }
    profiles
}

/// Plain SWR: `|active ∩ smart| / (global_active_smart + ε)`.
pub fn compute_swr(active_wallets: &[String], smart_wallets: &HashSet<String>, global_active_smart: u64) -> f64 {
    let active_smart = active_wallets.iter().filter(|w| smart_wallets.contains(*w)).count();
    active_smart as f64 / (global_active_smart as f64 + EPS)
}

/// Weighted SWR: contributions are `log1p(max(0, roi−1)) × (win_rate +
/// 0.1)`, summed over the token's active smart wallets and divided by
/// the same metric computed over the global smart set.
pub fn compute_weighted_swr(
    active_smart_profiles: &[&WalletProfile],
    global_weighted_smart: f64,
) -> f64 {
    let token_weighted: f64 = active_smart_profiles
        .iter()
        .map(|p| (p.avg_roi - 1.0).max(0.0).ln_1p() * (p.win_rate + 0.1))
        .sum();
    token_weighted / (global_weighted_smart + EPS)
}

/// Contribution of a single smart wallet to the global weighted-smart
/// denominator tracked by the Scheduler across the active set.
pub fn wallet_weight(profile: &WalletProfile) -> f64 {
    (profile.avg_roi - 1.0).max(0.0).ln_1p() * (profile.win_rate + 0.1)
}

/// Sort buy events by timestamp and flag any wallet whose buy lies within
/// `window_sec` of another wallet's buy (Louvain-lite, §4.4).
pub fn detect_coordinated_entry(buys: &[(String, i64)], window_sec: i64) -> HashSet<String> {
    if buys.len() < 2 {
        return HashSet::new();
    }
    let mut sorted: Vec<&(String, i64)> = buys.iter().collect();
    sorted.sort_by_key(|b| b.1);
    let window_ms = window_sec * 1000;

    let mut coordinated = HashSet::new();
    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            if (sorted[j].1 - sorted[i].1).abs() <= window_ms {
                coordinated.insert(sorted[i].0.clone());
                coordinated.insert(sorted[j].0.clone());
            } else {
                break;
            }
        }
    }
    coordinated
}

const W_EARLY: f64 = 3.0;
const W_FUNDING: f64 = 4.0;
const W_BUY_RATIO: f64 = 2.5;
const W_HOLDER_DELTA: f64 = 2.0;
const BIAS: f64 = 3.5;

/// Sigmoid insider probability: `1/(1+exp(-z))`,
/// `z = w₁·early + w₂·funding + w₃·buy_ratio_120s + w₄·holder_delta − bias`.
pub fn compute_p_insider(early_score: f64, funding_overlap: f64, buy_ratio_120s: f64, holder_delta: f64) -> f64 {
    let z = W_EARLY * early_score + W_FUNDING * funding_overlap + W_BUY_RATIO * buy_ratio_120s
        + W_HOLDER_DELTA * holder_delta
        - BIAS;
    1.0 / (1.0 + (-z).exp())
}

fn early_score(first_trade_ms: i64, pair_created_at_ms: Option<i64>) -> f64 {
    let Some(created_ms) = pair_created_at_ms else {
        return 0.0;
    };
    let seconds_since_launch = (first_trade_ms - created_ms) as f64 / 1000.0;
    if (0.0..=60.0).contains(&seconds_since_launch) {
        1.0
    } else if seconds_since_launch <= 300.0 {
        0.6
    } else if seconds_since_launch <= 600.0 {
        0.3
    } else {
        0.0
    }
}

/// Coordination is treated as a strong proxy for shared funding (no
/// on-chain funding trace is implemented); funding overlap is 0.5 when
/// coordinated, 0 otherwise.
pub fn compute_insider_score(
    first_trade_ms: i64,
    pair_created_at_ms: Option<i64>,
    is_coordinated: bool,
    buy_ratio_120s: f64,
    holder_delta: f64,
) -> f64 {
    let early = early_score(first_trade_ms, pair_created_at_ms);
    let funding_overlap = if is_coordinated { 0.5 } else { 0.0 };
    compute_p_insider(early, funding_overlap, buy_ratio_120s, holder_delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(sol_delta: f64, token_transfers: u64) -> WalletTx {
        WalletTx { sol_delta, token_transfers, time_ms: 0 }
    }

    #[test]
    fn wallet_stats_ignore_non_token_transfers() {
        let profile = compute_wallet_stats("w1", &[tx(5.0, 0), tx(1.0, 1)], 0);
        assert_eq!(profile.total_trades, 1);
    }

    #[test]
    fn wallet_stats_no_trades_defaults_to_new() {
        let profile = compute_wallet_stats("w1", &[], 0);
        assert_eq!(profile.cluster, WalletCluster::New);
        assert_eq!(profile.total_trades, 0);
    }

    #[test]
    fn wallet_stats_profitable_trades_yield_roi_above_one() {
        let txs = vec![tx(-1.0, 1), tx(2.0, 1)];
        let profile = compute_wallet_stats("w1", &txs, 0);
        assert!(profile.avg_roi > 1.0);
        assert_eq!(profile.win_rate, 0.5);
    }

    #[test]
    fn is_smart_wallet_requires_all_three_thresholds() {
        let cfg = Config::default();
        let good = WalletProfile {
            wallet: "w".into(),
            avg_roi: 2.0,
            total_trades: 10,
            win_rate: 0.5,
            cluster: WalletCluster::Unknown,
            last_active_ms: 0,
            verified: false,
        };
        assert!(is_smart_wallet(&good, &cfg));

        let mut too_few_trades = good.clone();
        too_few_trades.total_trades = 0;
        assert!(!is_smart_wallet(&too_few_trades, &cfg));
    }

    fn profile(roi: f64, trades: u64, wr: f64) -> WalletProfile {
        WalletProfile {
            wallet: format!("w{roi}{trades}"),
            avg_roi: roi,
            total_trades: trades,
            win_rate: wr,
            cluster: WalletCluster::Unknown,
            last_active_ms: 0,
            verified: false,
        }
    }

    #[test]
    fn cluster_wallets_leaves_unknown_below_k() {
        let profiles = vec![profile(1.0, 1, 0.1), profile(2.0, 2, 0.2)];
        let clustered = cluster_wallets(profiles);
        assert!(clustered.iter().all(|p| p.cluster == WalletCluster::Unknown));
    }

    #[test]
    fn cluster_wallets_orders_labels_by_ascending_roi() {
        let profiles = vec![
            profile(1.0, 500, 0.1),
            profile(1.0, 480, 0.12),
            profile(1.1, 520, 0.11),
            profile(2.0, 20, 0.5),
            profile(2.1, 18, 0.55),
            profile(2.2, 22, 0.52),
            profile(8.0, 3, 0.9),
            profile(7.5, 4, 0.85),
            profile(9.0, 2, 0.95),
        ];
        let clustered = cluster_wallets(profiles);
        let by_roi = |roi: i64| {
            clustered
                .iter()
                .find(|p| p.avg_roi.round() as i64 == roi)
                .unwrap()
                .cluster
        };
        assert_eq!(by_roi(1), WalletCluster::Retail);
        assert_eq!(by_roi(8), WalletCluster::Insider);
    }

    #[test]
    fn compute_swr_zero_when_no_overlap() {
        let active = vec!["a".to_string(), "b".to_string()];
        let smart: HashSet<String> = HashSet::new();
        assert_eq!(compute_swr(&active, &smart, 10), 0.0);
    }

    #[test]
    fn compute_swr_counts_overlap() {
        let active = vec!["a".to_string(), "b".to_string()];
        let smart: HashSet<String> = ["a".to_string()].into_iter().collect();
        let swr = compute_swr(&active, &smart, 4);
        assert!((swr - 0.25).abs() < 1e-6);
    }

    #[test]
    fn detect_coordinated_entry_flags_close_buys() {
        let buys = vec![
            ("a".to_string(), 1_000),
            ("b".to_string(), 1_005_000),
            ("c".to_string(), 1_200_000),
        ];
        let coordinated = detect_coordinated_entry(&buys, 15);
        assert!(coordinated.contains("a"));
        assert!(coordinated.contains("b"));
        assert!(!coordinated.contains("c"));
    }

    #[test]
    fn detect_coordinated_entry_needs_two_trades() {
        let buys = vec![("a".to_string(), 0)];
        assert!(detect_coordinated_entry(&buys, 15).is_empty());
    }

    #[test]
    fn p_insider_increases_with_early_score() {
        let low = compute_p_insider(0.0, 0.0, 0.0, 0.0);
        let high = compute_p_insider(1.0, 0.5, 0.5, 0.5);
        assert!(high > low);
    }

    #[test]
    fn insider_score_uses_coordination_as_funding_proxy() {
        let uncoordinated = compute_insider_score(30, Some(0), false, 0.0, 0.0);
        let coordinated = compute_insider_score(30, Some(0), true, 0.0, 0.0);
        assert!(coordinated > uncoordinated);
    }

    #[test]
    fn flags_high_frequency_low_conviction_wallet_as_noise() {
        let profiles = vec![profile(1.0, 60, 0.1)];
        let flagged = flag_high_volume_noise(profiles);
        assert_eq!(flagged[0].cluster, WalletCluster::HighVolumeNoise);
    }

    #[test]
    fn leaves_profitable_wallet_unflagged() {
        let profiles = vec![profile(2.0, 60, 0.5)];
        let flagged = flag_high_volume_noise(profiles);
        assert_eq!(flagged[0].cluster, WalletCluster::Unknown);
    }
}
