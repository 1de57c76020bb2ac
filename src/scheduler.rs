//! Scheduler: the cycle loop that ties every other module together (§4.8).
//!
//! Drains the Ingestor's `WorkQueue`, fans the cycle's tokens out to the
//! Collector under a bounded semaphore (the concurrency idiom generalised
//! from the teacher's HTTP poller in `sniffer/http_source.rs`), builds
//! feature vectors, runs the cross-sectional Scoring Engine, and pushes
//! every row through the Signal Gate Cascade. Every `wallet_refresh_cycles`
//! cycles it also re-profiles known wallets and republishes a
//! `SubscriptionSnapshot` for the Ingestor to pick up on its next drift
//! check (§9's copy-on-publish decision).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, Semaphore};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::collector::{Collector, CollectedSnapshot};
use crate::config::Config;
use crate::errors::DetectorError;
use crate::features::build_feature_vector;
use crate::gate::{self, candles::{analyze_candles, Candle}};
use crate::ingestor::{SubscriptionSnapshot, WorkQueue};
use crate::notifier::Notifier;
use crate::providers::{AssetMetadata, ChainRpc, MarketDataProvider};
use crate::scoring::{compute_instability, signal_threshold};
use crate::smart_wallets::{cluster_wallets, compute_wallet_stats, flag_high_volume_noise, is_smart_wallet};
use crate::store::Store;
use crate::types::{Known, Token, TokenMetric, WalletCluster};

const HISTORY_WINDOW_MS: i64 = 20 * 60_000;
const TRACKED_TOKEN_WINDOW_MS: i64 = 24 * 60 * 60_000;
const NOISE_ACTIVITY_WINDOW_MS: i64 = 60 * 60_000;
const AVG_VOL_HISTORY_ALPHA: f64 = 0.2;

pub struct Scheduler {
    store: Arc<dyn Store>,
    chain_rpc: Arc<dyn ChainRpc>,
    collector: Arc<Collector>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    queue: Arc<Mutex<WorkQueue>>,
    snapshot_tx: watch::Sender<SubscriptionSnapshot>,
    cfg: Config,
    last_instability: Mutex<HashMap<i64, f64>>,
    avg_vol_history: Mutex<f64>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market_data: Arc<dyn MarketDataProvider>,
        chain_rpc: Arc<dyn ChainRpc>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        queue: Arc<Mutex<WorkQueue>>,
        snapshot_tx: watch::Sender<SubscriptionSnapshot>,
        cfg: Config,
    ) -> Self {
        let collector = Arc::new(Collector::new(market_data, chain_rpc.clone(), clock.clone(), &cfg));
        Self {
            store,
            chain_rpc,
            collector,
            clock,
            notifier,
            queue,
            snapshot_tx,
            cfg,
            last_instability: Mutex::new(HashMap::new()),
            avg_vol_history: Mutex::new(0.0),
        }
    }

    /// The long-lived loop: one cycle every `scan_interval_sec`, with a
    /// wallet-profile refresh every `wallet_refresh_cycles` cycles. A cycle
    /// that overruns `cycle_deadline_ms` is abandoned, not retried inline —
    /// its unfinished tokens stay queued for the next cycle via the normal
    /// requeue-cooldown path.
    pub async fn run(&self) {
        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            let deadline = Duration::from_millis(self.cfg.cycle_deadline_ms);
            match tokio::time::timeout(deadline, self.run_cycle()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "scheduler: cycle failed"),
                Err(_) => warn!(deadline_ms = self.cfg.cycle_deadline_ms, "scheduler: cycle exceeded deadline"),
            }

            if cycle % self.cfg.wallet_refresh_cycles == 0 {
                if let Err(e) = self.refresh_wallets_and_publish().await {
                    warn!(error = %e, "scheduler: wallet refresh failed");
                }
            }

            tokio::time::sleep(Duration::from_secs(self.cfg.scan_interval_sec)).await;
        }
    }

    /// Drain the queue, collect, score, gate, and persist. Returns
    /// immediately with no work done if the queue was empty.
    pub async fn run_cycle(&self) -> Result<(), DetectorError> {
        let now_ms = self.clock.now_ms();
        let addresses = {
            let mut queue = self.queue.lock().await;
            queue.drain(self.cfg.queue_capacity)
        };
        if addresses.is_empty() {
            return Ok(());
        }

        let mut tokens: Vec<(i64, Token)> = Vec::with_capacity(addresses.len());
        for mint in &addresses {
            let entry = match self.store.token_by_mint(mint).await? {
                Some(existing) => existing,
                None => {
                    let token = Token::new(mint.clone(), now_ms);
                    let id = self.store.upsert_token(&token).await?;
                    (id, token)
                }
            };
            tokens.push(entry);
        }

        let snapshots = self.collect_all(&tokens).await;
        for (token_id, token) in &tokens {
            let Some(snapshot) = snapshots.get(token_id) else { continue };
            self.store.insert_metric(&snapshot.metric).await?;
            self.apply_asset_metadata(token, &snapshot.asset_metadata).await?;
        }

        let has_noise = self.has_noise_this_cycle().await?;
        let global_active_smart: u64 = snapshots.values().map(|s| s.metric.smart_wallets_active).sum();

        let mut features_batch = Vec::with_capacity(tokens.len());
        let mut candles_by_token: HashMap<i64, Vec<Candle>> = HashMap::with_capacity(tokens.len());
        for (token_id, token) in &tokens {
            let history = self.store.recent_metrics(*token_id, now_ms - HISTORY_WINDOW_MS).await?;
            let active_smart = history.first().map(|m| m.smart_wallets_active).unwrap_or(0);
            let swr = active_smart as f64 / (global_active_smart as f64 + 1e-9);

            let fv = build_feature_vector(*token_id, &token.mint, token, &history, swr, &[], None, now_ms);
            candles_by_token.insert(*token_id, synthesize_candles(&history));
            features_batch.push(fv);
        }

        let (rows, regime) = {
            let mut last_instability = self.last_instability.lock().await;
            let mut avg_vol_history = self.avg_vol_history.lock().await;
            let (rows, regime) =
                compute_instability(&features_batch, &self.cfg, *avg_vol_history, &last_instability, now_ms);
            *avg_vol_history =
                *avg_vol_history * (1.0 - AVG_VOL_HISTORY_ALPHA) + regime.batch_total_volume * AVG_VOL_HISTORY_ALPHA;
            for row in &rows {
                last_instability.insert(row.features.token_id, row.instability);
            }
            (rows, regime)
        };
        info!(regime = ?regime.label, tokens = rows.len(), "scheduler: cycle scored");

        let instabilities: Vec<f64> = rows.iter().map(|r| r.instability).collect();
        let threshold = signal_threshold(&instabilities, &self.cfg);
        let token_by_id: HashMap<i64, &Token> = tokens.iter().map(|(id, t)| (*id, t)).collect();

        for row in &rows {
            let Some(&token) = token_by_id.get(&row.features.token_id) else { continue };
            let candles = candles_by_token.get(&row.features.token_id).cloned().unwrap_or_default();
            let candle_score = if candles.len() >= 3 { analyze_candles(&candles).score } else { 0.0 };

            let outcome = gate::evaluate_row(
                row,
                token,
                &candles,
                threshold,
                has_noise,
                candle_score,
                &self.cfg,
                self.store.as_ref(),
                now_ms,
            )
            .await;

            match outcome {
                Ok(signal) => {
                    if let Err(e) = self.store.insert_signal(&signal).await {
                        warn!(error = %e, address = %signal.address, "scheduler: failed to persist signal");
                        continue;
                    }
                    info!(address = %signal.address, confidence = signal.confidence, kelly_size = signal.kelly_size, "scheduler: signal persisted");
                    let notifier = self.notifier.clone();
                    tokio::spawn(async move { notifier.send_signal_alert(&signal).await });
                }
                Err(rejection) => gate::log_rejection(&row.features.address, &rejection),
            }
        }

        Ok(())
    }

    /// Fan the cycle's tokens out to the Collector under a semaphore capped
    /// at `collector_max_parallel`, each call bounded by `collector_timeout_sec`.
    async fn collect_all(&self, tokens: &[(i64, Token)]) -> HashMap<i64, CollectedSnapshot> {
        let sem = Arc::new(Semaphore::new(self.cfg.collector_max_parallel.max(1)));
        let per_call_timeout = Duration::from_secs(self.cfg.collector_timeout_sec);

        let mut tasks = Vec::with_capacity(tokens.len());
        for (token_id, token) in tokens.iter().cloned() {
            let collector = self.collector.clone();
            let sem = sem.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                let snapshot = match tokio::time::timeout(per_call_timeout, collector.collect(&token, token_id)).await {
                    Ok(snapshot) => snapshot,
                    Err(_) => {
                        warn!(mint = %token.mint, "scheduler: collector call timed out this cycle");
                        CollectedSnapshot {
                            metric: TokenMetric::empty(token_id, 0),
                            asset_metadata: AssetMetadata::default(),
                        }
                    }
                };
                (token_id, snapshot)
            }));
        }

        let mut out = HashMap::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok((token_id, snapshot)) => {
                    out.insert(token_id, snapshot);
                }
                Err(e) => warn!(error = %e, "scheduler: collector task panicked"),
            }
        }
        out
    }

    /// Backfills authority/creator fields the Ingestor's create-event
    /// payload didn't carry, once the Collector's asset-metadata call
    /// resolves them. Fields already known are never overwritten.
    async fn apply_asset_metadata(&self, token: &Token, meta: &AssetMetadata) -> Result<(), DetectorError> {
        if token.mint_authority.is_known() && token.freeze_authority.is_known() && token.creator.is_known() {
            return Ok(());
        }

        let mut updated = token.clone();
        if !updated.mint_authority.is_known() {
            updated.mint_authority = meta.mint_authority.clone().into();
        }
        if !updated.freeze_authority.is_known() {
            updated.freeze_authority = meta.freeze_authority.clone().into();
        }
        if !updated.creator.is_known() {
            if let Some(creator) = meta.creators.first() {
                updated.creator = Known::Known(creator.clone());
            }
        }
        self.store.upsert_token(&updated).await?;
        Ok(())
    }

    /// Whether any wallet currently flagged high-volume-noise has traded
    /// within the last hour — a cycle-wide penalty rather than a per-token
    /// one, since the Collector only retains a buyer count, not identity
    /// (§11.2's `has_noise_bots` input, approximated at this layer).
    async fn has_noise_this_cycle(&self) -> Result<bool, DetectorError> {
        let now_ms = self.clock.now_ms();
        let profiles = self.store.wallet_profiles().await?;
        let flagged = flag_high_volume_noise(profiles);
        Ok(flagged
            .iter()
            .any(|p| p.cluster == WalletCluster::HighVolumeNoise && now_ms - p.last_active_ms <= NOISE_ACTIVITY_WINDOW_MS))
    }

    /// Re-profiles every wallet the store already knows about, reclusters
    /// them, and republishes the smart-wallet/tracked-token subscription
    /// set for the Ingestor to pick up on its next drift check.
    async fn refresh_wallets_and_publish(&self) -> Result<(), DetectorError> {
        let now_ms = self.clock.now_ms();
        let existing = self.store.wallet_profiles().await?;

        let mut refreshed = Vec::with_capacity(existing.len());
        for profile in &existing {
            let txs = self.chain_rpc.wallet_txs(&profile.wallet, 50).await.unwrap_or_default();
            refreshed.push(compute_wallet_stats(&profile.wallet, &txs, now_ms));
        }

        let clustered = flag_high_volume_noise(cluster_wallets(refreshed));
        for profile in &clustered {
            self.store.upsert_wallet_profile(profile).await?;
        }

        let smart_wallets: Vec<String> = clustered
            .iter()
            .filter(|p| is_smart_wallet(p, &self.cfg))
            .map(|p| p.wallet.clone())
            .collect();

        let tracked = self.store.latest_metrics(now_ms, TRACKED_TOKEN_WINDOW_MS).await?;
        let tracked_tokens: Vec<String> = tracked.into_iter().map(|(t, _)| t.mint).collect();

        info!(smart_wallets = smart_wallets.len(), tracked_tokens = tracked_tokens.len(), "scheduler: wallet refresh complete");
        let _ = self.snapshot_tx.send(SubscriptionSnapshot { smart_wallets, tracked_tokens });
        Ok(())
    }
}

/// Single-period candles from consecutive metric observations: each
/// observation's price becomes a close, the previous observation's price
/// its open, and its `volume_5m` the candle volume. The only OHLC source
/// available without a dedicated candle provider (none is wired — §4.7).
fn synthesize_candles(history_newest_first: &[TokenMetric]) -> Vec<Candle> {
    let oldest_first: Vec<&TokenMetric> = history_newest_first.iter().rev().collect();
    let mut candles = Vec::with_capacity(oldest_first.len());
    let mut prev_close = oldest_first.first().map(|m| m.price).unwrap_or(0.0);
    for m in oldest_first {
        let open = prev_close;
        let close = m.price;
        candles.push(Candle {
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: m.volume_5m,
        });
        prev_close = close;
    }
    candles
}
