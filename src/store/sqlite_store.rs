//! SQLite-backed `Store`, enabled by the `sqlite_store` feature.
//!
//! Schema mirrors the Postgres tables the reference implementation wrote
//! (`tokens`, `token_metrics_timeseries`, `signals`, `wallet_performance`,
//! `creator_performance`), adapted to SQLite's `INSERT ... ON CONFLICT DO
//! UPDATE` dialect. Runtime-checked queries (`sqlx::query`) are used rather
//! than the compile-time `query!` macros since this crate has no
//! `DATABASE_URL` available at build time.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashSet;

use crate::errors::{DetectorError, ErrorContext};
use crate::types::{CreatorProfile, Known, Signal, Token, TokenMetric, WalletProfile};

use super::Store;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Self, DetectorError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(url)
            .await
            .map_err(|e| anyhow::Error::from(e).store_context("connecting to sqlite store"))?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), DetectorError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mint TEXT NOT NULL UNIQUE,
                name TEXT,
                symbol TEXT,
                narrative TEXT,
                creator TEXT,
                mint_authority TEXT,
                freeze_authority TEXT,
                first_seen_ms INTEGER NOT NULL,
                is_bonding_curve INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS token_metrics (
                token_id INTEGER NOT NULL,
                observed_at_ms INTEGER NOT NULL,
                price REAL NOT NULL,
                marketcap REAL NOT NULL,
                liquidity REAL NOT NULL,
                liquidity_is_virtual INTEGER NOT NULL,
                holders INTEGER,
                volume_5m REAL NOT NULL,
                volume_1h REAL NOT NULL,
                buys_5m INTEGER NOT NULL,
                sells_5m INTEGER NOT NULL,
                top10_ratio REAL,
                smart_wallets_active INTEGER NOT NULL,
                instability_index REAL,
                insider_psi REAL,
                creator_risk REAL,
                bonding_complete INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_metrics_token_time
                ON token_metrics (token_id, observed_at_ms DESC);

            CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token_id INTEGER NOT NULL,
                address TEXT NOT NULL,
                observed_at_ms INTEGER NOT NULL,
                instability_index REAL NOT NULL,
                entry_price REAL NOT NULL,
                liquidity REAL NOT NULL,
                marketcap REAL NOT NULL,
                confidence REAL NOT NULL,
                kelly_size REAL NOT NULL,
                insider_probability REAL,
                creator_risk REAL,
                degen_score REAL NOT NULL,
                hard_stop REAL NOT NULL,
                take_profit_1 REAL NOT NULL,
                trailing_trigger REAL NOT NULL,
                trailing_distance REAL NOT NULL,
                ai_summary TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_signals_address_time
                ON signals (address, observed_at_ms DESC);

            CREATE TABLE IF NOT EXISTS wallet_performance (
                wallet TEXT PRIMARY KEY,
                avg_roi REAL NOT NULL,
                total_trades INTEGER NOT NULL,
                win_rate REAL NOT NULL,
                cluster_label TEXT NOT NULL,
                last_active_ms INTEGER NOT NULL,
                verified INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS creator_performance (
                creator TEXT PRIMARY KEY,
                rug_ratio REAL NOT NULL,
                avg_lifespan_hours REAL NOT NULL,
                total_tokens INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::Error::from(e).store_context("running migrations"))?;
        Ok(())
    }
}

fn opt_str(k: &Known<String>) -> Option<String> {
    match k {
        Known::Known(v) => Some(v.clone()),
        Known::Unknown => None,
    }
}

fn opt_f64(k: &Known<f64>) -> Option<f64> {
    match k {
        Known::Known(v) => Some(*v),
        Known::Unknown => None,
    }
}

fn opt_u64(k: &Known<u64>) -> Option<i64> {
    match k {
        Known::Known(v) => Some(*v as i64),
        Known::Unknown => None,
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_token(&self, token: &Token) -> Result<i64, DetectorError> {
        let row = sqlx::query(
            r#"
            INSERT INTO tokens (mint, name, symbol, narrative, creator, mint_authority,
                                 freeze_authority, first_seen_ms, is_bonding_curve)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (mint) DO UPDATE SET
                name = COALESCE(excluded.name, tokens.name),
                symbol = COALESCE(excluded.symbol, tokens.symbol),
                narrative = COALESCE(excluded.narrative, tokens.narrative),
                creator = COALESCE(excluded.creator, tokens.creator),
                mint_authority = COALESCE(excluded.mint_authority, tokens.mint_authority),
                freeze_authority = COALESCE(excluded.freeze_authority, tokens.freeze_authority)
            RETURNING id
            "#,
        )
        .bind(&token.mint)
        .bind(opt_str(&token.name))
        .bind(opt_str(&token.symbol))
        .bind(opt_str(&token.narrative))
        .bind(opt_str(&token.creator))
        .bind(opt_str(&token.mint_authority))
        .bind(opt_str(&token.freeze_authority))
        .bind(token.first_seen_ms)
        .bind(token.is_bonding_curve as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow::Error::from(e).store_context("upserting token"))?;

        Ok(row.get::<i64, _>("id"))
    }

    async fn token_by_mint(&self, mint: &str) -> Result<Option<(i64, Token)>, DetectorError> {
        let row = sqlx::query("SELECT * FROM tokens WHERE mint = ?1")
            .bind(mint)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow::Error::from(e).store_context("fetching token by mint"))?;

        Ok(row.map(|r| {
            let token = Token {
                mint: r.get("mint"),
                name: r.get::<Option<String>, _>("name").into(),
                symbol: r.get::<Option<String>, _>("symbol").into(),
                first_seen_ms: r.get("first_seen_ms"),
                narrative: r.get::<Option<String>, _>("narrative").into(),
                creator: r.get::<Option<String>, _>("creator").into(),
                mint_authority: r.get::<Option<String>, _>("mint_authority").into(),
                freeze_authority: r.get::<Option<String>, _>("freeze_authority").into(),
                is_bonding_curve: r.get::<i64, _>("is_bonding_curve") != 0,
            };
            (r.get("id"), token)
        }))
    }

    async fn insert_metric(&self, metric: &TokenMetric) -> Result<(), DetectorError> {
        sqlx::query(
            r#"
            INSERT INTO token_metrics
                (token_id, observed_at_ms, price, marketcap, liquidity, liquidity_is_virtual,
                 holders, volume_5m, volume_1h, buys_5m, sells_5m, top10_ratio,
                 smart_wallets_active, instability_index, insider_psi, creator_risk, bonding_complete)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(metric.token_id)
        .bind(metric.observed_at_ms)
        .bind(metric.price)
        .bind(metric.marketcap)
        .bind(metric.liquidity)
        .bind(metric.liquidity_is_virtual as i64)
        .bind(opt_u64(&metric.holders))
        .bind(metric.volume_5m)
        .bind(metric.volume_1h)
        .bind(metric.buys_5m as i64)
        .bind(metric.sells_5m as i64)
        .bind(opt_f64(&metric.top10_ratio))
        .bind(metric.smart_wallets_active as i64)
        .bind(opt_f64(&metric.instability_index))
        .bind(opt_f64(&metric.insider_psi))
        .bind(opt_f64(&metric.creator_risk))
        .bind(metric.bonding_complete as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::Error::from(e).store_context("inserting metric"))?;
        Ok(())
    }

    async fn latest_metrics(
        &self,
        now_ms: i64,
        max_age_ms: i64,
    ) -> Result<Vec<(Token, TokenMetric)>, DetectorError> {
        let cutoff = now_ms - max_age_ms;
        let rows = sqlx::query(
            r#"
            SELECT t.*, m.observed_at_ms, m.price, m.marketcap, m.liquidity,
                   m.liquidity_is_virtual, m.holders, m.volume_5m, m.volume_1h,
                   m.buys_5m, m.sells_5m, m.top10_ratio, m.smart_wallets_active,
                   m.instability_index, m.insider_psi, m.creator_risk, m.bonding_complete
            FROM token_metrics m
            JOIN tokens t ON t.id = m.token_id
            WHERE m.observed_at_ms >= ?1
              AND m.observed_at_ms = (
                  SELECT MAX(m2.observed_at_ms) FROM token_metrics m2
                  WHERE m2.token_id = m.token_id AND m2.observed_at_ms >= ?1
              )
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow::Error::from(e).store_context("fetching latest metrics"))?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let token = Token {
                    mint: r.get("mint"),
                    name: r.get::<Option<String>, _>("name").into(),
                    symbol: r.get::<Option<String>, _>("symbol").into(),
                    first_seen_ms: r.get("first_seen_ms"),
                    narrative: r.get::<Option<String>, _>("narrative").into(),
                    creator: r.get::<Option<String>, _>("creator").into(),
                    mint_authority: r.get::<Option<String>, _>("mint_authority").into(),
                    freeze_authority: r.get::<Option<String>, _>("freeze_authority").into(),
                    is_bonding_curve: r.get::<i64, _>("is_bonding_curve") != 0,
                };
                let metric = TokenMetric {
                    token_id: r.get("id"),
                    observed_at_ms: r.get("observed_at_ms"),
                    price: r.get("price"),
                    marketcap: r.get("marketcap"),
                    liquidity: r.get("liquidity"),
                    liquidity_is_virtual: r.get::<i64, _>("liquidity_is_virtual") != 0,
                    holders: r.get::<Option<i64>, _>("holders").map(|v| v as u64).into(),
                    volume_5m: r.get("volume_5m"),
                    volume_1h: r.get("volume_1h"),
                    buys_5m: r.get::<i64, _>("buys_5m") as u64,
                    sells_5m: r.get::<i64, _>("sells_5m") as u64,
                    top10_ratio: r.get::<Option<f64>, _>("top10_ratio").into(),
                    smart_wallets_active: r.get::<i64, _>("smart_wallets_active") as u64,
                    instability_index: r.get::<Option<f64>, _>("instability_index").into(),
                    insider_psi: r.get::<Option<f64>, _>("insider_psi").into(),
                    creator_risk: r.get::<Option<f64>, _>("creator_risk").into(),
                    bonding_complete: r.get::<i64, _>("bonding_complete") != 0,
                };
                (token, metric)
            })
            .collect())
    }

    async fn recent_metrics(
        &self,
        token_id: i64,
        since_ms: i64,
    ) -> Result<Vec<TokenMetric>, DetectorError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM token_metrics
            WHERE token_id = ?1 AND observed_at_ms >= ?2
            ORDER BY observed_at_ms DESC
            "#,
        )
        .bind(token_id)
        .bind(since_ms)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow::Error::from(e).store_context("fetching recent metrics"))?;

        Ok(rows
            .into_iter()
            .map(|r| TokenMetric {
                token_id: r.get("token_id"),
                observed_at_ms: r.get("observed_at_ms"),
                price: r.get("price"),
                marketcap: r.get("marketcap"),
                liquidity: r.get("liquidity"),
                liquidity_is_virtual: r.get::<i64, _>("liquidity_is_virtual") != 0,
                holders: r.get::<Option<i64>, _>("holders").map(|v| v as u64).into(),
                volume_5m: r.get("volume_5m"),
                volume_1h: r.get("volume_1h"),
                buys_5m: r.get::<i64, _>("buys_5m") as u64,
                sells_5m: r.get::<i64, _>("sells_5m") as u64,
                top10_ratio: r.get::<Option<f64>, _>("top10_ratio").into(),
                smart_wallets_active: r.get::<i64, _>("smart_wallets_active") as u64,
                instability_index: r.get::<Option<f64>, _>("instability_index").into(),
                insider_psi: r.get::<Option<f64>, _>("insider_psi").into(),
                creator_risk: r.get::<Option<f64>, _>("creator_risk").into(),
                bonding_complete: r.get::<i64, _>("bonding_complete") != 0,
            })
            .collect())
    }

    async fn insert_signal(&self, signal: &Signal) -> Result<(), DetectorError> {
        sqlx::query(
            r#"
            INSERT INTO signals
                (token_id, address, observed_at_ms, instability_index, entry_price, liquidity,
                 marketcap, confidence, kelly_size, insider_probability, creator_risk,
                 degen_score, hard_stop, take_profit_1, trailing_trigger, trailing_distance, ai_summary)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(signal.token_id)
        .bind(&signal.address)
        .bind(signal.observed_at_ms)
        .bind(signal.instability_index)
        .bind(signal.entry_price)
        .bind(signal.liquidity)
        .bind(signal.marketcap)
        .bind(signal.confidence)
        .bind(signal.kelly_size)
        .bind(opt_f64(&signal.insider_probability))
        .bind(opt_f64(&signal.creator_risk))
        .bind(signal.degen_score)
        .bind(signal.hard_stop)
        .bind(signal.take_profit_1)
        .bind(signal.trailing_trigger)
        .bind(signal.trailing_distance)
        .bind(opt_str(&signal.ai_summary))
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::Error::from(e).store_context("inserting signal"))?;
        Ok(())
    }

    async fn recent_signal_addresses(&self, since_ms: i64) -> Result<HashSet<String>, DetectorError> {
        let rows = sqlx::query("SELECT DISTINCT address FROM signals WHERE observed_at_ms >= ?1")
            .bind(since_ms)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow::Error::from(e).store_context("fetching recent signal addresses"))?;
        Ok(rows.into_iter().map(|r| r.get("address")).collect())
    }

    async fn upsert_wallet_profile(&self, profile: &WalletProfile) -> Result<(), DetectorError> {
        sqlx::query(
            r#"
            INSERT INTO wallet_performance (wallet, avg_roi, total_trades, win_rate, cluster_label, last_active_ms, verified)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (wallet) DO UPDATE SET
                avg_roi = excluded.avg_roi,
                total_trades = excluded.total_trades,
                win_rate = excluded.win_rate,
                cluster_label = excluded.cluster_label,
                last_active_ms = excluded.last_active_ms,
                verified = excluded.verified
            "#,
        )
        .bind(&profile.wallet)
        .bind(profile.avg_roi)
        .bind(profile.total_trades as i64)
        .bind(profile.win_rate)
        .bind(profile.cluster.as_str())
        .bind(profile.last_active_ms)
        .bind(profile.verified as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::Error::from(e).store_context("upserting wallet profile"))?;
        Ok(())
    }

    async fn wallet_profiles(&self) -> Result<Vec<WalletProfile>, DetectorError> {
        let rows = sqlx::query("SELECT * FROM wallet_performance")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow::Error::from(e).store_context("fetching wallet profiles"))?;
        Ok(rows
            .into_iter()
            .map(|r| WalletProfile {
                wallet: r.get("wallet"),
                avg_roi: r.get("avg_roi"),
                total_trades: r.get::<i64, _>("total_trades") as u64,
                win_rate: r.get("win_rate"),
                cluster: cluster_from_str(&r.get::<String, _>("cluster_label")),
                last_active_ms: r.get("last_active_ms"),
                verified: r.get::<i64, _>("verified") != 0,
            })
            .collect())
    }

    async fn upsert_creator_profile(&self, profile: &CreatorProfile) -> Result<(), DetectorError> {
        sqlx::query(
            r#"
            INSERT INTO creator_performance (creator, rug_ratio, avg_lifespan_hours, total_tokens)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (creator) DO UPDATE SET
                rug_ratio = excluded.rug_ratio,
                avg_lifespan_hours = excluded.avg_lifespan_hours,
                total_tokens = excluded.total_tokens
            "#,
        )
        .bind(&profile.creator)
        .bind(profile.rug_ratio)
        .bind(profile.avg_lifespan_hours)
        .bind(profile.total_tokens as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::Error::from(e).store_context("upserting creator profile"))?;
        Ok(())
    }

    async fn creator_profile(&self, creator: &str) -> Result<Option<CreatorProfile>, DetectorError> {
        let row = sqlx::query("SELECT * FROM creator_performance WHERE creator = ?1")
            .bind(creator)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow::Error::from(e).store_context("fetching creator profile"))?;
        Ok(row.map(|r| CreatorProfile {
            creator: r.get("creator"),
            rug_ratio: r.get("rug_ratio"),
            avg_lifespan_hours: r.get("avg_lifespan_hours"),
            total_tokens: r.get::<i64, _>("total_tokens") as u64,
        }))
    }

    async fn known_creators(&self) -> Result<Vec<String>, DetectorError> {
        let rows = sqlx::query("SELECT creator FROM creator_performance")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow::Error::from(e).store_context("fetching known creators"))?;
        Ok(rows.into_iter().map(|r| r.get("creator")).collect())
    }

    async fn tokens_by_creator(&self, creator: &str) -> Result<Vec<Token>, DetectorError> {
        let rows = sqlx::query("SELECT * FROM tokens WHERE creator = ?1")
            .bind(creator)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow::Error::from(e).store_context("fetching tokens by creator"))?;
        Ok(rows
            .into_iter()
            .map(|r| Token {
                mint: r.get("mint"),
                name: r.get::<Option<String>, _>("name").into(),
                symbol: r.get::<Option<String>, _>("symbol").into(),
                first_seen_ms: r.get("first_seen_ms"),
                narrative: r.get::<Option<String>, _>("narrative").into(),
                creator: r.get::<Option<String>, _>("creator").into(),
                mint_authority: r.get::<Option<String>, _>("mint_authority").into(),
                freeze_authority: r.get::<Option<String>, _>("freeze_authority").into(),
                is_bonding_curve: r.get::<i64, _>("is_bonding_curve") != 0,
            })
            .collect())
    }
}

fn cluster_from_str(s: &str) -> crate::types::WalletCluster {
    use crate::types::WalletCluster::*;
    match s {
        "retail" => Retail,
        "sniper" => Sniper,
        "insider" => Insider,
        "new" => New,
        "high_volume_noise" => HighVolumeNoise,
        _ => Unknown,
    }
}
