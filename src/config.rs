use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // ── Endpoints & credentials ──────────────────────────────────────────
    #[serde(default = "default_market_data_url")]
    pub market_data_url: String,
    #[serde(default = "default_price_fallback_url")]
    pub price_fallback_url: String,
    #[serde(default)]
    pub rpc_endpoints: Vec<String>,
    #[serde(default)]
    pub helius_endpoints: Vec<String>,
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    #[serde(default)]
    pub store_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub metrics_pushgateway_url: Option<String>,
    #[serde(default = "default_metrics_job_name")]
    pub metrics_job_name: String,
    #[serde(default = "default_metrics_instance")]
    pub metrics_instance: String,
    #[serde(default = "default_metrics_push_interval_sec")]
    pub metrics_push_interval_sec: u64,

    // ── Timing ────────────────────────────────────────────────────────────
    #[serde(default = "default_scan_interval_sec")]
    pub scan_interval_sec: u64,
    #[serde(default = "default_wallet_refresh_cycles")]
    pub wallet_refresh_cycles: u64,
    #[serde(default = "default_cycle_deadline_ms")]
    pub cycle_deadline_ms: u64,
    #[serde(default = "default_creator_job_interval_sec")]
    pub creator_job_interval_sec: u64,

    // ── Scoring ───────────────────────────────────────────────────────────
    #[serde(default = "default_signal_percentile")]
    pub signal_percentile: f64,
    #[serde(default = "default_min_threshold")]
    pub min_threshold: f64,
    #[serde(default = "default_min_batch_size")]
    pub min_batch_size: usize,
    #[serde(default = "default_weight_sa")]
    pub weight_sa: f64,
    #[serde(default = "default_weight_holder")]
    pub weight_holder: f64,
    #[serde(default = "default_weight_vs")]
    pub weight_vs: f64,
    #[serde(default = "default_weight_swr")]
    pub weight_swr: f64,
    #[serde(default = "default_weight_vi")]
    pub weight_vi: f64,
    #[serde(default = "default_weight_sell")]
    pub weight_sell: f64,

    // ── Trigger / safety / quality thresholds ───────────────────────────
    #[serde(default = "default_liquidity_min")]
    pub liquidity_min: f64,
    #[serde(default = "default_mcap_min")]
    pub mcap_min: f64,
    #[serde(default = "default_mcap_max")]
    pub mcap_max: f64,
    #[serde(default = "default_top10_max_ratio")]
    pub top10_max_ratio: f64,
    #[serde(default = "default_holders_min")]
    pub holders_min: u64,
    #[serde(default = "default_microcap_threshold")]
    pub microcap_threshold: f64,

    // ── Smart wallets ─────────────────────────────────────────────────────
    #[serde(default = "default_sw_min_roi")]
    pub sw_min_roi: f64,
    #[serde(default = "default_sw_min_trades")]
    pub sw_min_trades: u64,
    #[serde(default = "default_sw_min_win_rate")]
    pub sw_min_win_rate: f64,
    #[serde(default = "default_coord_window_sec")]
    pub coord_window_sec: i64,

    // ── Position sizing ───────────────────────────────────────────────────
    #[serde(default = "default_bayes_prior")]
    pub bayes_prior: f64,
    #[serde(default = "default_kelly_avg_win")]
    pub kelly_avg_win: f64,
    #[serde(default = "default_kelly_avg_loss")]
    pub kelly_avg_loss: f64,
    #[serde(default = "default_kelly_fraction")]
    pub kelly_fraction: f64,
    #[serde(default = "default_max_kelly_microcap")]
    pub max_kelly_microcap: f64,

    // ── Virtual liquidity (bonding-curve tokens) ─────────────────────────
    #[serde(default = "default_virtual_liquidity_ratio")]
    pub virtual_liquidity_ratio: f64,
    #[serde(default = "default_virtual_liquidity_cap")]
    pub virtual_liquidity_cap: f64,

    // ── Candle gate ───────────────────────────────────────────────────────
    #[serde(default = "default_candle_gate_fail_open")]
    pub candle_gate_fail_open: bool,
    #[serde(default = "default_candle_pass_score")]
    pub candle_pass_score: f64,

    // ── Dedup & RPC circuit breaker ───────────────────────────────────────
    #[serde(default = "default_dedup_window_min")]
    pub dedup_window_min: i64,
    #[serde(default = "default_rpc_cooldown_sec")]
    pub rpc_cooldown_sec: u64,
    #[serde(default = "default_helius_cooldown_sec")]
    pub helius_cooldown_sec: u64,

    // ── Work queue / ingestor ─────────────────────────────────────────────
    #[serde(default = "default_requeue_cooldown_sec")]
    pub requeue_cooldown_sec: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_subscription_drift_check_sec")]
    pub subscription_drift_check_sec: u64,
    #[serde(default = "default_ws_ping_interval_sec")]
    pub ws_ping_interval_sec: u64,
    #[serde(default = "default_ws_ping_timeout_sec")]
    pub ws_ping_timeout_sec: u64,
    #[serde(default = "default_ws_reconnect_backoff_ms")]
    pub ws_reconnect_backoff_ms: u64,
    #[serde(default = "default_ws_reconnect_backoff_max_ms")]
    pub ws_reconnect_backoff_max_ms: u64,

    // ── Collector concurrency ─────────────────────────────────────────────
    #[serde(default = "default_collector_max_parallel")]
    pub collector_max_parallel: usize,
    #[serde(default = "default_collector_timeout_sec")]
    pub collector_timeout_sec: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            market_data_url: default_market_data_url(),
            price_fallback_url: default_price_fallback_url(),
            rpc_endpoints: Vec::new(),
            helius_endpoints: Vec::new(),
            stream_url: default_stream_url(),
            store_url: None,
            api_key: None,
            webhook_url: None,
            metrics_pushgateway_url: None,
            metrics_job_name: default_metrics_job_name(),
            metrics_instance: default_metrics_instance(),
            metrics_push_interval_sec: default_metrics_push_interval_sec(),

            scan_interval_sec: default_scan_interval_sec(),
            wallet_refresh_cycles: default_wallet_refresh_cycles(),
            cycle_deadline_ms: default_cycle_deadline_ms(),
            creator_job_interval_sec: default_creator_job_interval_sec(),

            signal_percentile: default_signal_percentile(),
            min_threshold: default_min_threshold(),
            min_batch_size: default_min_batch_size(),
            weight_sa: default_weight_sa(),
            weight_holder: default_weight_holder(),
            weight_vs: default_weight_vs(),
            weight_swr: default_weight_swr(),
            weight_vi: default_weight_vi(),
            weight_sell: default_weight_sell(),

            liquidity_min: default_liquidity_min(),
            mcap_min: default_mcap_min(),
            mcap_max: default_mcap_max(),
            top10_max_ratio: default_top10_max_ratio(),
            holders_min: default_holders_min(),
            microcap_threshold: default_microcap_threshold(),

            sw_min_roi: default_sw_min_roi(),
            sw_min_trades: default_sw_min_trades(),
            sw_min_win_rate: default_sw_min_win_rate(),
            coord_window_sec: default_coord_window_sec(),

            bayes_prior: default_bayes_prior(),
            kelly_avg_win: default_kelly_avg_win(),
            kelly_avg_loss: default_kelly_avg_loss(),
            kelly_fraction: default_kelly_fraction(),
            max_kelly_microcap: default_max_kelly_microcap(),

            virtual_liquidity_ratio: default_virtual_liquidity_ratio(),
            virtual_liquidity_cap: default_virtual_liquidity_cap(),

            candle_gate_fail_open: default_candle_gate_fail_open(),
            candle_pass_score: default_candle_pass_score(),

            dedup_window_min: default_dedup_window_min(),
            rpc_cooldown_sec: default_rpc_cooldown_sec(),
            helius_cooldown_sec: default_helius_cooldown_sec(),

            requeue_cooldown_sec: default_requeue_cooldown_sec(),
            queue_capacity: default_queue_capacity(),
            subscription_drift_check_sec: default_subscription_drift_check_sec(),
            ws_ping_interval_sec: default_ws_ping_interval_sec(),
            ws_ping_timeout_sec: default_ws_ping_timeout_sec(),
            ws_reconnect_backoff_ms: default_ws_reconnect_backoff_ms(),
            ws_reconnect_backoff_max_ms: default_ws_reconnect_backoff_max_ms(),

            collector_max_parallel: default_collector_max_parallel(),
            collector_timeout_sec: default_collector_timeout_sec(),
        }
    }
}

fn default_market_data_url() -> String {
    "https://api.dexscreener.com/latest".to_string()
}
fn default_price_fallback_url() -> String {
    "https://price.jup.ag/v6".to_string()
}
fn default_stream_url() -> String {
    "wss://pumpportal.fun/api/data".to_string()
}
fn default_metrics_job_name() -> String {
    "early_signal_detector".to_string()
}
fn default_metrics_instance() -> String {
    "default".to_string()
}
fn default_metrics_push_interval_sec() -> u64 {
    30
}

fn default_scan_interval_sec() -> u64 {
    15
}
fn default_wallet_refresh_cycles() -> u64 {
    10
}
fn default_cycle_deadline_ms() -> u64 {
    12_000
}
fn default_creator_job_interval_sec() -> u64 {
    21_600
}

fn default_signal_percentile() -> f64 {
    0.70
}
fn default_min_threshold() -> f64 {
    4.0
}
fn default_min_batch_size() -> usize {
    3
}
fn default_weight_sa() -> f64 {
    2.0
}
fn default_weight_holder() -> f64 {
    1.5
}
fn default_weight_vs() -> f64 {
    1.5
}
fn default_weight_swr() -> f64 {
    2.0
}
fn default_weight_vi() -> f64 {
    2.0
}
fn default_weight_sell() -> f64 {
    2.0
}

fn default_liquidity_min() -> f64 {
    1500.0
}
fn default_mcap_min() -> f64 {
    2000.0
}
fn default_mcap_max() -> f64 {
    10_000_000.0
}
fn default_top10_max_ratio() -> f64 {
    0.50
}
fn default_holders_min() -> u64 {
    50
}
fn default_microcap_threshold() -> f64 {
    50_000.0
}

fn default_sw_min_roi() -> f64 {
    1.3
}
fn default_sw_min_trades() -> u64 {
    2
}
fn default_sw_min_win_rate() -> f64 {
    0.35
}
fn default_coord_window_sec() -> i64 {
    15
}

fn default_bayes_prior() -> f64 {
    0.35
}
fn default_kelly_avg_win() -> f64 {
    0.40
}
fn default_kelly_avg_loss() -> f64 {
    0.15
}
fn default_kelly_fraction() -> f64 {
    0.25
}
fn default_max_kelly_microcap() -> f64 {
    // No numeric default survives in the retained reference material for
    // this constant; 5% is a conservative position-size ceiling chosen for
    // this implementation (see DESIGN.md open-question decisions).
    0.05
}

fn default_virtual_liquidity_ratio() -> f64 {
    0.20
}
fn default_virtual_liquidity_cap() -> f64 {
    2000.0
}

fn default_candle_gate_fail_open() -> bool {
    true
}
fn default_candle_pass_score() -> f64 {
    0.4
}

fn default_dedup_window_min() -> i64 {
    60
}
fn default_rpc_cooldown_sec() -> u64 {
    60
}
fn default_helius_cooldown_sec() -> u64 {
    300
}

fn default_requeue_cooldown_sec() -> u64 {
    10
}
fn default_queue_capacity() -> usize {
    2048
}
fn default_subscription_drift_check_sec() -> u64 {
    300
}
fn default_ws_ping_interval_sec() -> u64 {
    30
}
fn default_ws_ping_timeout_sec() -> u64 {
    10
}
fn default_ws_reconnect_backoff_ms() -> u64 {
    5_000
}
fn default_ws_reconnect_backoff_max_ms() -> u64 {
    120_000
}

fn default_collector_max_parallel() -> usize {
    25
}
fn default_collector_timeout_sec() -> u64 {
    10
}

impl Config {
    /// Load configuration from "config.toml" if present, otherwise return
    /// defaults. Every field in the Configuration table also accepts an
    /// environment-variable override (highest priority).
    pub fn load() -> Self {
        Self::load_from("config.toml")
    }

    /// Same as [`Config::load`] but reads from an explicit path, letting
    /// the `--config` CLI flag point at an alternate file.
    pub fn load_from(path: &str) -> Self {
        let mut cfg = match fs::read_to_string(path) {
            Ok(s) => toml::from_str::<Config>(&s).unwrap_or_default(),
            Err(_) => Config::default(),
        };

        cfg.apply_env_overrides();
        cfg.validate().expect("Invalid configuration");
        cfg
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SCAN_INTERVAL") {
            if let Ok(n) = v.parse() {
                self.scan_interval_sec = n;
            }
        }
        if let Ok(v) = std::env::var("SIGNAL_PERCENTILE") {
            if let Ok(n) = v.parse() {
                self.signal_percentile = n;
            }
        }
        if let Ok(v) = std::env::var("LIQUIDITY_MIN") {
            if let Ok(n) = v.parse() {
                self.liquidity_min = n;
            }
        }
        if let Ok(v) = std::env::var("MCAP_MAX") {
            if let Ok(n) = v.parse() {
                self.mcap_max = n;
            }
        }
        if let Ok(v) = std::env::var("TOP10_MAX_RATIO") {
            if let Ok(n) = v.parse() {
                self.top10_max_ratio = n;
            }
        }
        if let Ok(v) = std::env::var("HOLDERS_MIN") {
            if let Ok(n) = v.parse() {
                self.holders_min = n;
            }
        }
        if let Ok(v) = std::env::var("SW_MIN_ROI") {
            if let Ok(n) = v.parse() {
                self.sw_min_roi = n;
            }
        }
        if let Ok(v) = std::env::var("SW_MIN_TRADES") {
            if let Ok(n) = v.parse() {
                self.sw_min_trades = n;
            }
        }
        if let Ok(v) = std::env::var("SW_MIN_WIN_RATE") {
            if let Ok(n) = v.parse() {
                self.sw_min_win_rate = n;
            }
        }
        if let Ok(v) = std::env::var("DEDUP_WINDOW_MIN") {
            if let Ok(n) = v.parse() {
                self.dedup_window_min = n;
            }
        }
        if let Ok(v) = std::env::var("MAX_KELLY_MICROCAP") {
            if let Ok(n) = v.parse() {
                self.max_kelly_microcap = n;
            }
        }
        if let Ok(v) = std::env::var("RPC_COOLDOWN_SEC") {
            if let Ok(n) = v.parse() {
                self.rpc_cooldown_sec = n;
            }
        }
        if let Ok(v) = std::env::var("STORE_URL") {
            self.store_url = Some(v);
        }
        if let Ok(v) = std::env::var("WEBHOOK_URL") {
            self.webhook_url = Some(v);
        }
    }

    /// Validate configuration consistency and constraints.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.signal_percentile) {
            return Err("signal_percentile must be in [0, 1]".to_string());
        }
        if self.min_batch_size == 0 {
            return Err("min_batch_size must be greater than 0".to_string());
        }
        if self.scan_interval_sec == 0 {
            return Err("scan_interval_sec must be greater than 0".to_string());
        }
        if self.wallet_refresh_cycles == 0 {
            return Err("wallet_refresh_cycles must be greater than 0".to_string());
        }
        if self.dedup_window_min <= 0 {
            return Err("dedup_window_min must be greater than 0".to_string());
        }
        if self.rpc_cooldown_sec == 0 {
            return Err("rpc_cooldown_sec must be greater than 0".to_string());
        }
        if self.ws_reconnect_backoff_ms > self.ws_reconnect_backoff_max_ms {
            return Err(
                "ws_reconnect_backoff_ms cannot be greater than ws_reconnect_backoff_max_ms"
                    .to_string(),
            );
        }
        if self.kelly_fraction <= 0.0 || self.kelly_fraction > 1.0 {
            return Err("kelly_fraction must be in (0, 1]".to_string());
        }
        if !(0.0..1.0).contains(&self.max_kelly_microcap) {
            return Err("max_kelly_microcap must be in [0, 1)".to_string());
        }
        if self.collector_max_parallel == 0 {
            return Err("collector_max_parallel must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_percentile() {
        let mut cfg = Config::default();
        cfg.signal_percentile = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_inverted_backoff_bounds() {
        let mut cfg = Config::default();
        cfg.ws_reconnect_backoff_ms = 50_000;
        cfg.ws_reconnect_backoff_max_ms = 10_000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_min_batch_size() {
        let mut cfg = Config::default();
        cfg.min_batch_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn toml_round_trip_parses_partial_overrides() {
        let toml_src = r#"
            scan_interval_sec = 30
            signal_percentile = 0.8
        "#;
        let cfg: Config = toml::from_str(toml_src).expect("parses");
        assert_eq!(cfg.scan_interval_sec, 30);
        assert_eq!(cfg.signal_percentile, 0.8);
        // untouched fields keep their serde defaults
        assert_eq!(cfg.liquidity_min, default_liquidity_min());
    }
}
