//! Rotating RPC endpoint pool with a per-endpoint circuit breaker.
//!
//! Selection is round-robin, skipping endpoints whose cooldown has not
//! elapsed. If every endpoint is disabled the pool resets all cooldowns
//! and hands out the first endpoint anyway (§2.3, mirroring
//! `helius_client.py`'s `_get_next_available_rpc` reset-on-exhaustion
//! behaviour) rather than stalling the caller indefinitely.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::clock::Clock;

struct EndpointState {
    url: String,
    disabled_until_ms: i64,
}

/// Shared endpoint pool; clone-free, pass by `Arc`.
pub struct RpcPool {
    endpoints: RwLock<Vec<EndpointState>>,
    cursor: AtomicUsize,
    default_cooldown_ms: i64,
}

impl RpcPool {
    pub fn new(urls: Vec<String>, default_cooldown_ms: i64) -> Self {
        Self {
            endpoints: RwLock::new(
                urls.into_iter()
                    .map(|url| EndpointState {
                        url,
                        disabled_until_ms: 0,
                    })
                    .collect(),
            ),
            cursor: AtomicUsize::new(0),
            default_cooldown_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }

    /// Round-robin selection skipping endpoints under cooldown. Resets
    /// every cooldown and returns the first endpoint if the whole pool is
    /// currently disabled, rather than returning `None` and starving the
    /// caller.
    pub fn next_endpoint(&self, clock: &dyn Clock) -> Option<String> {
        let now = clock.now_ms();
        let endpoints = self.endpoints.read();
        if endpoints.is_empty() {
            return None;
        }

        let len = endpoints.len();
        for _ in 0..len {
            let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
            let ep = &endpoints[idx];
            if ep.disabled_until_ms <= now {
                return Some(ep.url.clone());
            }
        }

        drop(endpoints);
        self.reset_all_cooldowns();
        self.endpoints.read().first().map(|e| e.url.clone())
    }

    /// Disable an endpoint for `cooldown_ms` (defaults to the pool's
    /// configured default when `None`), called on HTTP 429 / timeout.
    pub fn disable(&self, url: &str, clock: &dyn Clock, cooldown_ms: Option<i64>) {
        let until = clock.now_ms() + cooldown_ms.unwrap_or(self.default_cooldown_ms);
        let mut endpoints = self.endpoints.write();
        if let Some(ep) = endpoints.iter_mut().find(|e| e.url == url) {
            ep.disabled_until_ms = until;
        }
    }

    fn reset_all_cooldowns(&self) {
        let mut endpoints = self.endpoints.write();
        for ep in endpoints.iter_mut() {
            ep.disabled_until_ms = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    #[test]
    fn rotates_round_robin() {
        let pool = RpcPool::new(vec!["a".into(), "b".into()], 60_000);
        let clock = FixedClock::new(0);
        let first = pool.next_endpoint(&clock).unwrap();
        let second = pool.next_endpoint(&clock).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn disabled_endpoint_is_skipped_until_cooldown_elapses() {
        let pool = RpcPool::new(vec!["a".into(), "b".into()], 60_000);
        let clock = FixedClock::new(0);
        pool.disable("a", &clock, None);

        for _ in 0..4 {
            assert_eq!(pool.next_endpoint(&clock).unwrap(), "b");
        }

        clock.advance_ms(60_001);
        // After cooldown elapses "a" becomes selectable again.
        let mut saw_a = false;
        for _ in 0..4 {
            if pool.next_endpoint(&clock).unwrap() == "a" {
                saw_a = true;
            }
        }
        assert!(saw_a);
    }

    #[test]
    fn resets_when_pool_fully_disabled() {
        let pool = RpcPool::new(vec!["a".into()], 60_000);
        let clock = FixedClock::new(0);
        pool.disable("a", &clock, None);
        // Fully disabled pool still returns an endpoint rather than None.
        assert_eq!(pool.next_endpoint(&clock).as_deref(), Some("a"));
    }

    #[test]
    fn helius_class_endpoint_gets_longer_cooldown() {
        let pool = RpcPool::new(vec!["helius".into(), "other".into()], 60_000);
        let clock = FixedClock::new(0);
        pool.disable("helius", &clock, Some(300_000));
        clock.advance_ms(120_000);
        for _ in 0..4 {
            assert_eq!(pool.next_endpoint(&clock).unwrap(), "other");
        }
    }
}
