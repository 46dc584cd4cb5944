//! Per-key leaky-bucket rate limiting (spec.md §5 "Rate limits ... per-agent
//! sending rate and per-observer session send rate"). Exceeding the limit
//! returns `RATE_LIMIT_EXCEEDED` rather than queueing.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct Bucket {
    level: f64,
    last_drain: Instant,
}

/// A shared leaky bucket per key (agent name, session id, ...). Capacity
/// and drain rate are fixed at construction; callers check in with
/// [`RateLimiter::check`] before doing the rate-limited work.
pub struct RateLimiter {
    capacity: f64,
    drain_per_sec: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    /// A limiter allowing `capacity` immediate hits, refilling at
    /// `drain_per_sec` tokens per second.
    pub fn new(capacity: f64, drain_per_sec: f64) -> Self {
        RateLimiter {
            capacity,
            drain_per_sec,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// `true` if `key` has capacity for one more unit of work right now,
    /// consuming it if so. `false` means the caller must return
    /// `RATE_LIMIT_EXCEEDED` instead of proceeding.
    pub fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock();
        let now = Instant::now();
        let bucket = buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            level: 0.0,
            last_drain: now,
        });

        let elapsed = now.duration_since(bucket.last_drain).as_secs_f64();
        bucket.level = (bucket.level - elapsed * self.drain_per_sec).max(0.0);
        bucket.last_drain = now;

        if bucket.level >= self.capacity {
            false
        } else {
            bucket.level += 1.0;
            true
        }
    }

    /// Drop any bucket idle for longer than `idle_for`, bounding memory use
    /// across long-lived runs with many short-lived observer sessions.
    pub fn sweep_idle(&self, idle_for: Duration) {
        let now = Instant::now();
        self.buckets.lock().retain(|_, bucket| now.duration_since(bucket.last_drain) < idle_for);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_capacity_then_rejects() {
        let limiter = RateLimiter::new(2.0, 0.0);
        assert!(limiter.check("watcher"));
        assert!(limiter.check("watcher"));
        assert!(!limiter.check("watcher"));
    }

    #[test]
    fn distinct_keys_have_independent_buckets() {
        let limiter = RateLimiter::new(1.0, 0.0);
        assert!(limiter.check("session-a"));
        assert!(limiter.check("session-b"));
        assert!(!limiter.check("session-a"));
    }

    #[test]
    fn sweep_idle_drops_stale_buckets() {
        let limiter = RateLimiter::new(1.0, 0.0);
        limiter.check("stale");
        limiter.sweep_idle(Duration::from_secs(0));
        assert!(limiter.check("stale"));
    }
}
