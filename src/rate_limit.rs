use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{sync::Mutex, time};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub limit: u32,
    pub remaining: u32,
    pub reset_seconds: u64,
    pub window_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub headers: RateLimitHeaders,
}

/// Sliding-window limiter: each client may make `max` requests in any
/// trailing `window`. Only admitted requests are recorded.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max: u32,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max: u32) -> Self {
        Self {
            window: window.max(Duration::from_secs(1)),
            max: max.max(1),
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub async fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now()).await
    }

    pub async fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut guard = self.hits.lock().await;
        let hits = guard.entry(key.to_string()).or_default();
        self.evict_expired(hits, now);

        let allowed = (hits.len() as u32) < self.max;
        if allowed {
            hits.push_back(now);
        }

        let remaining = self.max.saturating_sub(hits.len() as u32);
        let reset_seconds = hits
            .front()
            .map(|oldest| {
                let left = self.window.saturating_sub(now.duration_since(*oldest));
                left.as_secs_f64().ceil() as u64
            })
            .unwrap_or(0);

        RateLimitDecision {
            allowed,
            headers: RateLimitHeaders {
                limit: self.max,
                remaining,
                reset_seconds,
                window_seconds: self.window.as_secs(),
            },
        }
    }

    /// Drops clients whose window holds no hits. Returns how many were removed.
    pub async fn sweep_at(&self, now: Instant) -> usize {
        let mut guard = self.hits.lock().await;
        let before = guard.len();
        guard.retain(|_, hits| {
            self.evict_expired(hits, now);
            !hits.is_empty()
        });
        before - guard.len()
    }

    pub async fn tracked_clients(&self) -> usize {
        self.hits.lock().await.len()
    }

    fn evict_expired(&self, hits: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = hits.front() {
            if now.duration_since(*oldest) >= self.window {
                hits.pop_front();
            } else {
                break;
            }
        }
    }
}

pub fn spawn_sweeper(limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = limiter.sweep_at(Instant::now()).await;
            if removed > 0 {
                let tracked = limiter.tracked_clients().await;
                debug!(removed, tracked, "Rate limiter dropped idle clients");
            }
        }
    });
}
