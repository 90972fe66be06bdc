// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The SSRF-safe outbound HTTP client (C3), used by [`crate::webhooks`] to
//! deliver to user-supplied URLs.
//!
//! [`SsrfSafeClient`] wraps a single `reqwest::Client` the way any
//! outbound request layer does; the addition here is a custom
//! [`reqwest::dns::Resolve`] that filters out private address space
//! before hyper ever dials a socket, defeating DNS rebinding.

use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use hyper::client::connect::dns::Name;
use reqwest::dns::{Addrs, Resolve, Resolving};
use reqwest::Client;

use crate::errors::{AmityError, AmityResult};

pub use ratelimit::OutboundRateLimiter;

pub mod ratelimit;

const DIAL_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Rejects loopback, RFC1918-private, link-local (unicast and
/// multicast), multicast and unspecified addresses, in both IPv4 and
/// IPv6 form.
fn is_blocked(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || is_unique_local_v6(&v6)
                || is_unicast_link_local_v6(&v6)
        }
    }
}

fn is_unique_local_v6(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

fn is_unicast_link_local_v6(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

/// Resolves via the system resolver, then drops every address
/// [`is_blocked`] rejects. hyper dials whichever addresses are returned,
/// by IP, never re-resolving the name.
#[derive(Debug, Clone, Copy, Default)]
struct SsrfSafeResolver;

impl Resolve for SsrfSafeResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        Box::pin(async move {
            let addrs = tokio::net::lookup_host((host.as_str(), 0))
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;

            let filtered: Vec<SocketAddr> = addrs.filter(|a| !is_blocked(a.ip())).collect();

            if filtered.is_empty() {
                return Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("ssrf: {host} resolved only to blocked addresses"),
                )) as Box<dyn std::error::Error + Send + Sync>);
            }

            Ok(Box::new(filtered.into_iter()) as Addrs)
        })
    }
}

/// An outbound HTTP client that refuses to connect to private network
/// address space, for use on any path that dials a user-supplied URL
/// (currently only outgoing webhook delivery).
#[derive(Clone)]
pub struct SsrfSafeClient {
    inner: Client,
}

impl SsrfSafeClient {
    pub fn new() -> AmityResult<Self> {
        let inner = Client::builder()
            .dns_resolver(Arc::new(SsrfSafeResolver))
            .connect_timeout(DIAL_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build()
            .map_err(|e| AmityError::Internal {
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { inner })
    }

    pub async fn post_json(&self, url: &str, body: &serde_json::Value) -> AmityResult<reqwest::Response> {
        self.inner
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(AmityError::from)
    }

    /// Exposes the underlying client for callers that need to set custom
    /// headers (e.g. [`crate::webhooks`]'s `X-AmityVox-Event`).
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

impl Default for SsrfSafeClient {
    fn default() -> Self {
        Self::new().expect("default reqwest client configuration is always valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn rejects_loopback_v4() {
        assert!(is_blocked(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
    }

    #[test]
    fn rejects_rfc1918_private_v4() {
        assert!(is_blocked(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))));
        assert!(is_blocked(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
        assert!(is_blocked(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1))));
    }

    #[test]
    fn rejects_link_local_and_multicast_v4() {
        assert!(is_blocked(IpAddr::V4(Ipv4Addr::new(169, 254, 1, 1))));
        assert!(is_blocked(IpAddr::V4(Ipv4Addr::new(224, 0, 0, 1))));
        assert!(is_blocked(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))));
    }

    #[test]
    fn rejects_ipv6_loopback_and_unique_local() {
        assert!(is_blocked(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert!(is_blocked("fc00::1".parse().unwrap()));
        assert!(is_blocked("fe80::1".parse().unwrap()));
        assert!(is_blocked(IpAddr::V6(Ipv6Addr::UNSPECIFIED)));
    }

    #[test]
    fn allows_public_addresses() {
        assert!(!is_blocked(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34))));
        assert!(!is_blocked("2606:2800:220:1:248:1893:25c8:1946".parse().unwrap()));
    }
}
