// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Inbound REST rate limiting: a sliding window per (client IP, route
//! bucket), independent of [`crate::http_client::ratelimit`]'s outbound
//! per-destination-host limiter. A routing layer calls [`classify_route`]
//! to pick a bucket, then [`InboundRateLimiter::check`] to decide whether
//! to let the request through, and [`RateLimitDecision`] carries
//! everything needed to set `X-RateLimit-Limit`/`X-RateLimit-Remaining`
//! or return 429 with `Retry-After`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::RateLimitConfig;
use crate::errors::AmityError;

/// The named buckets a route falls into, each with its own window and
/// cap, tighter than the global default where the route is abuse-prone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteBucket {
    Global,
    AuthLogin,
    AuthRegister,
    AuthTotp,
    FilesUpload,
    Search,
    ChannelMessages,
}

/// Maps a request path to the bucket it's rate-limited under. Falls
/// back to [`RouteBucket::Global`] for anything unrecognized.
pub fn classify_route(path: &str) -> RouteBucket {
    let path = path.trim_start_matches('/');
    let path = path.strip_prefix("api/v1/").or_else(|| path.strip_prefix("api/")).unwrap_or(path);

    if path.starts_with("auth/login") {
        RouteBucket::AuthLogin
    } else if path.starts_with("auth/register") {
        RouteBucket::AuthRegister
    } else if path.starts_with("auth/totp") {
        RouteBucket::AuthTotp
    } else if path.starts_with("files/upload") {
        RouteBucket::FilesUpload
    } else if path.starts_with("search") {
        RouteBucket::Search
    } else if path.starts_with("channels/") && path.ends_with("/messages") {
        RouteBucket::ChannelMessages
    } else {
        RouteBucket::Global
    }
}

impl RouteBucket {
    fn limit_and_window(self, config: &RateLimitConfig) -> (u32, Duration) {
        match self {
            RouteBucket::Global => (config.global_per_minute, Duration::from_secs(60)),
            RouteBucket::AuthLogin => (config.auth_login_per_minute, Duration::from_secs(60)),
            RouteBucket::AuthRegister => (config.auth_register_per_minute, Duration::from_secs(60)),
            RouteBucket::AuthTotp => (config.auth_totp_per_5_minutes, Duration::from_secs(300)),
            RouteBucket::FilesUpload => (config.files_upload_per_minute, Duration::from_secs(60)),
            RouteBucket::Search => (config.search_per_minute, Duration::from_secs(60)),
            RouteBucket::ChannelMessages => (config.channel_messages_per_minute, Duration::from_secs(60)),
        }
    }
}

/// Outcome of a [`InboundRateLimiter::check`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limit: u32,
    pub remaining: u32,
    pub retry_after: Option<Duration>,
}

impl RateLimitDecision {
    pub fn allowed(&self) -> bool {
        self.retry_after.is_none()
    }

    /// Converts a rejected decision into the error the REST envelope
    /// reports. Panics if called on an allowed decision; callers should
    /// check `allowed()` first.
    pub fn into_error(self) -> AmityError {
        let retry_after_secs = self.retry_after.expect("into_error called on an allowed decision").as_secs().max(1);
        AmityError::RateLimited { retry_after_secs }
    }
}

struct Bucket {
    window: Vec<Instant>,
}

impl Bucket {
    fn new() -> Self {
        Self { window: Vec::new() }
    }

    fn check(&mut self, now: Instant, window: Duration, max_requests: u32) -> RateLimitDecision {
        self.window.retain(|instant| now.duration_since(*instant) < window);
        let used = self.window.len() as u32;
        if used >= max_requests {
            let oldest = self.window.first().copied().unwrap_or(now);
            let retry_after = window.saturating_sub(now.duration_since(oldest));
            return RateLimitDecision { limit: max_requests, remaining: 0, retry_after: Some(retry_after) };
        }
        self.window.push(now);
        RateLimitDecision { limit: max_requests, remaining: max_requests - used - 1, retry_after: None }
    }
}

/// Sliding-window rate limiter keyed by `(client_ip, route_bucket)`.
#[derive(Default)]
pub struct InboundRateLimiter {
    buckets: Mutex<HashMap<(String, RouteBucket), Bucket>>,
}

impl InboundRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks and, if allowed, records one request from `client_ip`
    /// against `route`'s bucket as configured in `config`.
    pub async fn check(&self, client_ip: &str, route: RouteBucket, config: &RateLimitConfig) -> RateLimitDecision {
        let (max_requests, window) = route.limit_and_window(config);
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry((client_ip.to_string(), route)).or_insert_with(Bucket::new);
        bucket.check(Instant::now(), window, max_requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RateLimitConfig {
        RateLimitConfig::default()
    }

    #[test]
    fn classifies_known_routes() {
        assert_eq!(classify_route("/api/v1/auth/login"), RouteBucket::AuthLogin);
        assert_eq!(classify_route("/api/v1/auth/register"), RouteBucket::AuthRegister);
        assert_eq!(classify_route("/api/v1/auth/totp/verify"), RouteBucket::AuthTotp);
        assert_eq!(classify_route("/api/v1/files/upload"), RouteBucket::FilesUpload);
        assert_eq!(classify_route("/api/v1/search/messages"), RouteBucket::Search);
        assert_eq!(classify_route("/api/v1/channels/123/messages"), RouteBucket::ChannelMessages);
        assert_eq!(classify_route("/api/v1/guilds/123"), RouteBucket::Global);
    }

    #[tokio::test]
    async fn allows_up_to_the_limit_then_rejects_with_retry_after() {
        let limiter = InboundRateLimiter::new();
        let mut config = config();
        config.auth_login_per_minute = 2;

        let first = limiter.check("1.2.3.4", RouteBucket::AuthLogin, &config).await;
        assert!(first.allowed());
        assert_eq!(first.remaining, 1);

        let second = limiter.check("1.2.3.4", RouteBucket::AuthLogin, &config).await;
        assert!(second.allowed());
        assert_eq!(second.remaining, 0);

        let third = limiter.check("1.2.3.4", RouteBucket::AuthLogin, &config).await;
        assert!(!third.allowed());
        assert!(third.retry_after.unwrap() <= Duration::from_secs(60));
        assert!(matches!(third.into_error(), AmityError::RateLimited { retry_after_secs } if retry_after_secs >= 1));
    }

    #[tokio::test]
    async fn ips_and_buckets_are_independent() {
        let limiter = InboundRateLimiter::new();
        let mut config = config();
        config.auth_login_per_minute = 1;

        assert!(limiter.check("1.2.3.4", RouteBucket::AuthLogin, &config).await.allowed());
        assert!(limiter.check("5.6.7.8", RouteBucket::AuthLogin, &config).await.allowed());
        assert!(limiter.check("1.2.3.4", RouteBucket::Global, &config).await.allowed());
        assert!(!limiter.check("1.2.3.4", RouteBucket::AuthLogin, &config).await.allowed());
    }
}
