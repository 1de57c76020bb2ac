//! Stream ingestor runner: owns the long-lived push connection, converts
//! `StreamEvent`s into `Store`/`WorkQueue` actions, and keeps
//! subscriptions in sync with the smart-wallet and tracked-token sets as
//! they drift (§4.1).
//!
//! Reconnect uses exponential backoff with jitter (base 5s, cap 120s),
//! grounded on `pumpportal.py`'s `retry_delay = min(retry_delay*1.5, 120)
//! + jitter` loop and the teacher's `wss_source.rs` backoff-doubling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::errors::DetectorError;
use crate::metrics::metrics;
use crate::store::Store;
use crate::types::{CreatorProfile, Token};

use super::source::{
    parse_event, subscribe_account_trade_msg, subscribe_migration_msg, subscribe_new_token_msg,
    subscribe_token_trade_msg, StreamEvent, StreamTransport,
};
use super::work_queue::WorkQueue;

/// Copy-on-publish snapshot of the sets the Ingestor subscribes to.
/// Published by the Scheduler after each wallet-profile refresh (§9's
/// third open-question decision): a versioned value rather than a shared
/// mutable object, so the Ingestor never observes a half-updated set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionSnapshot {
    pub smart_wallets: Vec<String>,
    pub tracked_tokens: Vec<String>,
}

pub struct IngestorRunner {
    transport: Arc<dyn StreamTransport>,
    store: Arc<dyn Store>,
    cfg: Config,
    clock: Arc<dyn Clock>,
    queue: Arc<Mutex<WorkQueue>>,
    snapshot_rx: watch::Receiver<SubscriptionSnapshot>,
    pub dropped_parse_failures: AtomicU64,
}

impl IngestorRunner {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        store: Arc<dyn Store>,
        cfg: Config,
        clock: Arc<dyn Clock>,
        queue: Arc<Mutex<WorkQueue>>,
        snapshot_rx: watch::Receiver<SubscriptionSnapshot>,
    ) -> Self {
        Self {
            transport,
            store,
            cfg,
            clock,
            queue,
            snapshot_rx,
            dropped_parse_failures: AtomicU64::new(0),
        }
    }

    pub async fn run(&self) {
        let mut backoff_ms = self.cfg.ws_reconnect_backoff_ms;
        let max_backoff_ms = self.cfg.ws_reconnect_backoff_max_ms;

        loop {
            match self.transport.connect(&self.cfg.stream_url).await {
                Ok(mut conn) => {
                    info!("stream ingestor connected");
                    backoff_ms = self.cfg.ws_reconnect_backoff_ms;

                    let initial = self.snapshot_rx.borrow().clone();
                    self.subscribe_all(conn.as_mut(), &initial).await;
                    let mut last_subscribed = initial;

                    let mut drift_interval =
                        tokio::time::interval(Duration::from_secs(self.cfg.subscription_drift_check_sec));

                    loop {
                        tokio::select! {
                            msg = conn.recv() => {
                                match msg {
                                    Ok(Some(raw)) => self.handle_raw(&raw).await,
                                    Ok(None) => {
                                        warn!("stream ingestor connection closed, reconnecting");
                                        break;
                                    }
                                    Err(e) => {
                                        warn!(error=%e, "stream ingestor recv error, reconnecting");
                                        break;
                                    }
                                }
                            }
                            _ = drift_interval.tick() => {
                                let current = self.snapshot_rx.borrow().clone();
                                if current != last_subscribed {
                                    debug!("subscription drift detected, re-subscribing");
                                    self.subscribe_all(conn.as_mut(), &current).await;
                                    last_subscribed = current;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(error=%e, "stream ingestor connect failed");
                }
            }

            let jitter_ms = (self.clock.now_ms() % 1000) as u64;
            tokio::time::sleep(Duration::from_millis(backoff_ms + jitter_ms)).await;
            backoff_ms = (backoff_ms.saturating_mul(2)).min(max_backoff_ms);
        }
    }

    async fn subscribe_all(
        &self,
        conn: &mut dyn super::source::StreamConnection,
        snapshot: &SubscriptionSnapshot,
    ) {
        let _ = conn.send_json(&subscribe_new_token_msg()).await;
        let _ = conn.send_json(&subscribe_migration_msg()).await;
        if !snapshot.smart_wallets.is_empty() {
            let _ = conn
                .send_json(&subscribe_account_trade_msg(&snapshot.smart_wallets))
                .await;
        }
        if !snapshot.tracked_tokens.is_empty() {
            let _ = conn
                .send_json(&subscribe_token_trade_msg(&snapshot.tracked_tokens))
                .await;
        }
    }

    async fn handle_raw(&self, raw: &str) {
        let Some(event) = parse_event(raw) else {
            self.dropped_parse_failures.fetch_add(1, Ordering::Relaxed);
            metrics().increment_counter("ingestor_parse_failures_total");
            return;
        };

        match event {
            StreamEvent::Create { mint, name, symbol, creator } => {
                let mut token = Token::new(&mint, self.clock.now_ms());
                token.name = name.into();
                token.symbol = symbol.into();
                token.creator = creator.clone().into();
                if let Err(e) = self.store.upsert_token(&token).await {
                    warn!(error=%e, mint=%mint, "failed to upsert token on create event");
                }
                if let Some(creator) = creator {
                    self.increment_creator_tokens(&creator).await;
                }
                self.enqueue(mint).await;
            }
            StreamEvent::Trade { mint, trader: _ } => {
                self.enqueue(mint).await;
            }
            StreamEvent::Migration { mint, trader: _ } => {
                self.enqueue(mint).await;
            }
        }
    }

    async fn increment_creator_tokens(&self, creator: &str) {
        let existing = self.store.creator_profile(creator).await.ok().flatten();
        let profile = match existing {
            Some(mut p) => {
                p.total_tokens += 1;
                p
            }
            None => CreatorProfile {
                creator: creator.to_string(),
                rug_ratio: 0.0,
                avg_lifespan_hours: 0.0,
                total_tokens: 1,
            },
        };
        if let Err(e) = self.store.upsert_creator_profile(&profile).await {
            warn!(error=%e, creator=%creator, "failed to update creator profile");
        }
    }

    async fn enqueue(&self, mint: String) {
        let mut queue = self.queue.lock().await;
        queue.enqueue(mint, self.clock.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::memory_store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::VecDeque;
    use tokio::sync::Mutex as TokioMutex;

    struct FakeConnection {
        inbound: TokioMutex<VecDeque<String>>,
        sent: Arc<TokioMutex<Vec<Value>>>,
    }

    #[async_trait]
    impl super::super::source::StreamConnection for FakeConnection {
        async fn send_json(&mut self, msg: &Value) -> Result<(), DetectorError> {
            self.sent.lock().await.push(msg.clone());
            Ok(())
        }

        async fn recv(&mut self) -> Result<Option<String>, DetectorError> {
            Ok(self.inbound.lock().await.pop_front())
        }
    }

    struct FakeTransport {
        frames: Vec<String>,
        sent: Arc<TokioMutex<Vec<Value>>>,
    }

    #[async_trait]
    impl StreamTransport for FakeTransport {
        async fn connect(
            &self,
            _url: &str,
        ) -> Result<Box<dyn super::super::source::StreamConnection>, DetectorError> {
            Ok(Box::new(FakeConnection {
                inbound: TokioMutex::new(self.frames.clone().into()),
                sent: self.sent.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn create_event_upserts_token_and_enqueues() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(Mutex::new(WorkQueue::new(100, 10_000)));
        let (_tx, rx) = watch::channel(SubscriptionSnapshot::default());
        let clock = Arc::new(FixedClock::new(0));

        let runner = IngestorRunner::new(
            Arc::new(FakeTransport { frames: vec![], sent: Arc::new(TokioMutex::new(vec![])) }),
            store.clone(),
            Config::default(),
            clock,
            queue.clone(),
            rx,
        );

        runner
            .handle_raw(r#"{"txType":"create","mint":"abcpump","traderPublicKey":"creator1","name":"Foo","symbol":"FOO"}"#)
            .await;

        let (_, token) = store.token_by_mint("abcpump").await.unwrap().unwrap();
        assert!(token.is_bonding_curve);
        assert_eq!(queue.lock().await.len(), 1);

        let creator_profile = store.creator_profile("creator1").await.unwrap().unwrap();
        assert_eq!(creator_profile.total_tokens, 1);
    }

    #[tokio::test]
    async fn malformed_message_is_dropped_and_counted() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(Mutex::new(WorkQueue::new(100, 10_000)));
        let (_tx, rx) = watch::channel(SubscriptionSnapshot::default());
        let clock = Arc::new(FixedClock::new(0));

        let runner = IngestorRunner::new(
            Arc::new(FakeTransport { frames: vec![], sent: Arc::new(TokioMutex::new(vec![])) }),
            store,
            Config::default(),
            clock,
            queue,
            rx,
        );

        runner.handle_raw("not json at all").await;
        assert_eq!(runner.dropped_parse_failures.load(Ordering::Relaxed), 1);
    }
}
