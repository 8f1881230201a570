//! Fixed-window per-client rate limiting.
//!
//! The primitive is an atomic increment-and-fetch with a 60 s expiry set on
//! the first hit of each window. Redis provides the distributed counter;
//! without Redis an in-process map keeps single-instance deployments safe.

use crate::RedisStorage;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::warn;

const WINDOW: Duration = Duration::from_secs(60);

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the current window resets.
    pub reset_secs: u64,
}

struct LocalWindow {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    redis: Option<RedisStorage>,
    local: DashMap<String, LocalWindow>,
}

impl RateLimiter {
    pub fn new(redis: Option<RedisStorage>) -> Self {
        Self {
            redis,
            local: DashMap::new(),
        }
    }

    /// Check (and consume) one request for `endpoint` from `client_ip`.
    pub async fn check(&self, endpoint: &str, client_ip: &str, limit: u32) -> RateDecision {
        let key = format!("ratelimit:{endpoint}:{client_ip}");

        if let Some(redis) = &self.redis {
            match redis.incr_with_window(&key, WINDOW).await {
                Ok(count) => {
                    let reset = redis.ttl_secs(&key).await.unwrap_or(WINDOW.as_secs() as i64);
                    return decision(count as u32, limit, reset.max(0) as u64);
                }
                Err(err) => {
                    // Redis down: fall through to the local window rather
                    // than failing open with no accounting at all.
                    warn!(%err, "rate limiter falling back to local window");
                }
            }
        }

        self.check_local(&key, limit)
    }

    fn check_local(&self, key: &str, limit: u32) -> RateDecision {
        let now = Instant::now();
        let mut entry = self.local.entry(key.to_string()).or_insert(LocalWindow {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= WINDOW {
            entry.started = now;
            entry.count = 0;
        }
        entry.count += 1;
        let elapsed = now.duration_since(entry.started);
        let reset = WINDOW.saturating_sub(elapsed).as_secs();
        decision(entry.count, limit, reset)
    }
}

fn decision(count: u32, limit: u32, reset_secs: u64) -> RateDecision {
    RateDecision {
        allowed: count <= limit,
        limit,
        remaining: limit.saturating_sub(count),
        reset_secs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_up_to_the_limit() {
        let limiter = RateLimiter::new(None);
        for i in 0..5 {
            let d = limiter.check("main", "1.2.3.4", 5).await;
            assert!(d.allowed, "request {i}");
            assert_eq!(d.remaining, 4 - i);
        }
        let d = limiter.check("main", "1.2.3.4", 5).await;
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
    }

    #[tokio::test]
    async fn clients_are_independent() {
        let limiter = RateLimiter::new(None);
        let _ = limiter.check("main", "1.1.1.1", 1).await;
        let d = limiter.check("main", "2.2.2.2", 1).await;
        assert!(d.allowed);
    }

    #[tokio::test]
    async fn endpoints_are_independent() {
        let limiter = RateLimiter::new(None);
        let _ = limiter.check("main", "1.1.1.1", 1).await;
        let d = limiter.check("extract", "1.1.1.1", 1).await;
        assert!(d.allowed);
    }

    #[test]
    fn decision_math() {
        let d = decision(3, 10, 42);
        assert!(d.allowed);
        assert_eq!(d.remaining, 7);
        assert_eq!(d.reset_secs, 42);
        assert!(!decision(11, 10, 0).allowed);
    }
}
