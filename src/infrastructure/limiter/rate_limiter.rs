use std::{
    sync::{Arc, Weak},
    time::{Duration, Instant},
};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::sleep;

const EVICTION_INTERVAL: Duration = Duration::from_secs(30);

type ClientMap = DashMap<String, Arc<Mutex<ClientLimiter>>>;

/// Token bucket with fractional tokens so refill stays precise at low rates.
#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            self.last_refill = now;
        }
    }

    fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);
        // epsilon guards against fp drift
        if self.tokens + 1e-12 >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn seconds_until_token(&self) -> u64 {
        let missing = (1.0 - self.tokens).max(0.0);
        if self.refill_per_sec <= 0.0 {
            return 60;
        }
        ((missing / self.refill_per_sec).ceil() as u64).max(1)
    }
}

/// Weighted two-window counter used once the bucket runs dry.
#[derive(Debug)]
struct SlidingWindow {
    window_size: Duration,
    limit: u64,
    current_window_start: Instant,
    current_count: u64,
    prev_count: u64,
}

impl SlidingWindow {
    fn new(window_size: Duration, limit: u64) -> Self {
        Self {
            window_size,
            limit,
            current_window_start: Instant::now(),
            current_count: 0,
            prev_count: 0,
        }
    }

    fn allow(&mut self, now: Instant) -> bool {
        let mut elapsed = now.duration_since(self.current_window_start);
        if elapsed >= self.window_size {
            self.prev_count = if elapsed >= self.window_size * 2 { 0 } else { self.current_count };
            self.current_count = 0;
            self.current_window_start = now;
            elapsed = Duration::ZERO;
        }

        let weight = elapsed.as_secs_f64() / self.window_size.as_secs_f64();
        let effective = (self.prev_count as f64) * (1.0 - weight) + (self.current_count as f64);

        if effective < self.limit as f64 {
            self.current_count += 1;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct ClientLimiter {
    bucket: TokenBucket,
    window: SlidingWindow,
    last_seen: Instant,
}

impl ClientLimiter {
    fn check(&mut self) -> RateDecision {
        let now = Instant::now();
        self.last_seen = now;

        if self.bucket.try_consume(now) {
            return RateDecision::Allowed { remaining: self.bucket.tokens.floor() as u64 };
        }
        if self.window.allow(now) {
            return RateDecision::Allowed { remaining: 0 };
        }
        RateDecision::Limited { retry_after_secs: self.bucket.seconds_until_token() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u64 },
    Limited { retry_after_secs: u64 },
}

/// Per-client limiter for upload endpoints: a token bucket absorbs bursts and
/// a sliding window caps the sustained rate. Idle clients are evicted.
#[derive(Clone)]
pub struct RateHybridLimiterStore {
    map: Arc<ClientMap>,
    capacity: f64,
    refill_per_sec: f64,
    window_size: Duration,
    window_limit: u64,
    idle_ttl: Duration,
}

impl RateHybridLimiterStore {
    pub fn new(
        capacity: f64,
        refill_per_sec: f64,
        window_size: Duration,
        window_limit: u64,
        idle_ttl: Duration,
    ) -> Self {
        let store = Self {
            map: Arc::new(DashMap::new()),
            capacity,
            refill_per_sec,
            window_size,
            window_limit,
            idle_ttl,
        };

        // The sweeper holds the map weakly and exits once the last store
        // clone is dropped.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let map: Weak<ClientMap> = Arc::downgrade(&store.map);
            let idle_ttl = store.idle_ttl;
            handle.spawn(async move {
                loop {
                    sleep(EVICTION_INTERVAL).await;
                    let Some(map) = map.upgrade() else { break };
                    let evicted = evict_idle_in(&map, idle_ttl);
                    if evicted > 0 {
                        tracing::debug!(evicted, "evicted idle rate limiter entries");
                    }
                }
            });
        }

        store
    }

    fn limiter_for(&self, key: &str) -> Arc<Mutex<ClientLimiter>> {
        if let Some(existing) = self.map.get(key) {
            return existing.clone();
        }
        self.map
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ClientLimiter {
                    bucket: TokenBucket::new(self.capacity, self.refill_per_sec),
                    window: SlidingWindow::new(self.window_size, self.window_limit),
                    last_seen: Instant::now(),
                }))
            })
            .clone()
    }

    pub fn check(&self, key: &str) -> RateDecision {
        let limiter = self.limiter_for(key);
        let mut guard = limiter.lock();
        guard.check()
    }

    /// Drops clients not seen within the idle TTL; returns how many were removed.
    pub fn evict_idle(&self) -> usize {
        evict_idle_in(&self.map, self.idle_ttl)
    }

    pub fn tracked_clients(&self) -> usize {
        self.map.len()
    }
}

fn evict_idle_in(map: &ClientMap, idle_ttl: Duration) -> usize {
    let now = Instant::now();
    let before = map.len();
    map.retain(|_, limiter| now.duration_since(limiter.lock().last_seen) <= idle_ttl);
    before.saturating_sub(map.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_window_then_limited() {
        let store = RateHybridLimiterStore::new(2.0, 0.0, Duration::from_secs(60), 1, Duration::from_secs(600));

        assert!(matches!(store.check("10.0.0.1"), RateDecision::Allowed { .. }));
        assert!(matches!(store.check("10.0.0.1"), RateDecision::Allowed { .. }));
        assert_eq!(store.check("10.0.0.1"), RateDecision::Allowed { remaining: 0 });
        assert!(matches!(store.check("10.0.0.1"), RateDecision::Limited { .. }));
    }

    #[test]
    fn clients_are_isolated() {
        let store = RateHybridLimiterStore::new(1.0, 0.0, Duration::from_secs(60), 0, Duration::from_secs(600));

        assert!(matches!(store.check("a"), RateDecision::Allowed { .. }));
        assert!(matches!(store.check("a"), RateDecision::Limited { .. }));
        assert!(matches!(store.check("b"), RateDecision::Allowed { .. }));
        assert_eq!(store.tracked_clients(), 2);
    }

    #[test]
    fn idle_clients_are_evicted() {
        let store = RateHybridLimiterStore::new(5.0, 1.0, Duration::from_secs(60), 5, Duration::ZERO);
        store.check("stale");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.evict_idle(), 1);
        assert_eq!(store.tracked_clients(), 0);
    }

    #[actix_rt::test]
    async fn sweeper_does_not_keep_the_store_alive() {
        let store = RateHybridLimiterStore::new(5.0, 1.0, Duration::from_secs(60), 5, Duration::from_secs(600));
        let shared = store.clone();
        assert_eq!(Arc::strong_count(&store.map), 2);

        let map = Arc::downgrade(&store.map);
        drop(store);
        drop(shared);
        assert!(map.upgrade().is_none());
    }
}
