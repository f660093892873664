use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::{RATE_LIMIT_MAX_REQUESTS, RATE_LIMIT_WINDOW_SECS};

/// Sliding-window rate limiter keyed by client IP.
///
/// Not thread-safe on its own; the server wraps it in `Arc<Mutex<_>>` and
/// holds the lock only for the duration of one check.
pub struct RateLimiter {
    /// Request timestamps per client key, pruned on every check.
    requests: HashMap<String, Vec<Instant>>,
    limit: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        RateLimiter {
            requests: HashMap::new(),
            limit,
            window,
        }
    }

    /// Records the request and returns whether it is within the limit.
    /// Timestamps older than the window are dropped first.
    pub fn allow(&mut self, key: &str) -> bool {
        let now = Instant::now();

        let hits = self.requests.entry(key.to_string()).or_default();
        hits.retain(|&timestamp| now.duration_since(timestamp) < self.window);

        if hits.len() < self.limit {
            hits.push(now);
            true
        } else {
            false
        }
    }
}

impl Default for RateLimiter {
    /// The API-facing configuration: 30 requests per 60 seconds.
    fn default() -> Self {
        Self::new(
            RATE_LIMIT_MAX_REQUESTS,
            Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn allows_up_to_the_limit() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(1));
        for _ in 0..5 {
            assert!(limiter.allow("10.0.0.1"));
        }
        assert!(!limiter.allow("10.0.0.1"));
    }

    #[test]
    fn keys_are_independent() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(1));
        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.2"));
        assert!(!limiter.allow("10.0.0.1"));
    }

    #[test]
    fn window_slides() {
        let mut limiter = RateLimiter::new(2, Duration::from_millis(50));
        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));

        thread::sleep(Duration::from_millis(60));

        assert!(limiter.allow("10.0.0.1"));
    }

    #[test]
    fn default_matches_api_limits() {
        let mut limiter = RateLimiter::default();
        for _ in 0..RATE_LIMIT_MAX_REQUESTS {
            assert!(limiter.allow("10.0.0.1"));
        }
        assert!(!limiter.allow("10.0.0.1"));
    }
}
