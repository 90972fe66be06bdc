// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Outbound per-destination-host rate limiting, applied before a
//! webhook delivery attempt dials out. A sliding window keyed by
//! destination host, protecting the server from a runaway webhook
//! target rather than tracking a remote service's own rate-limit
//! headers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// A sliding window of request instants for a single destination host.
struct Bucket {
    window: Vec<Instant>,
}

impl Bucket {
    fn new() -> Self {
        Self { window: Vec::new() }
    }

    fn try_acquire(&mut self, now: Instant, window: Duration, max_requests: usize) -> bool {
        self.window.retain(|instant| now.duration_since(*instant) < window);
        if self.window.len() >= max_requests {
            return false;
        }
        self.window.push(now);
        true
    }
}

/// Limits outbound webhook deliveries to `max_requests` per `window` per
/// destination host, independent of the inbound REST rate limiter.
pub struct OutboundRateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    window: Duration,
    max_requests: usize,
}

impl OutboundRateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            window,
            max_requests,
        }
    }

    /// Returns whether a request to `host` may proceed right now.
    pub async fn try_acquire(&self, host: &str) -> bool {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(host.to_string()).or_insert_with(Bucket::new);
        bucket.try_acquire(Instant::now(), self.window, self.max_requests)
    }
}

impl Default for OutboundRateLimiter {
    fn default() -> Self {
        Self::new(30, Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_the_limit_then_blocks() {
        let limiter = OutboundRateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.try_acquire("example.com").await);
        assert!(limiter.try_acquire("example.com").await);
        assert!(!limiter.try_acquire("example.com").await);
    }

    #[tokio::test]
    async fn hosts_are_independent() {
        let limiter = OutboundRateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire("a.example").await);
        assert!(limiter.try_acquire("b.example").await);
        assert!(!limiter.try_acquire("a.example").await);
    }
}
