// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Outgoing-webhook engine (C5): subscribes to every bus event, maps the
//! subject to a stable external event name, and delivers to every
//! matching webhook via the SSRF-safe client.

use std::error::Error as _;
use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use pubserve::Subscriber;
use serde_json::json;

use crate::bus::EventBus;
use crate::errors::AmityResult;
use crate::http_client::SsrfSafeClient;
use crate::http_client::ratelimit::OutboundRateLimiter;
use crate::types::Event;

pub mod store;
pub mod templates;

pub use store::{ExecutionLog, SharedWebhookStore, WebhookStore};

/// Queue group name so a multi-instance deployment doesn't double-deliver
/// the same event to the same webhook.
pub const QUEUE_GROUP: &str = "webhook-engine";

const USER_AGENT: &str = "AmityVox-Webhook/1.0";
const DELIVERY_TIMEOUT_SECS: u64 = 10;

/// Maps an event-bus subject to the stable external event name used in
/// the `X-AmityVox-Event` header. Returns `None` for subjects with no
/// external projection, which are ignored.
pub fn event_name_for_subject(subject: &str) -> Option<&'static str> {
    match subject {
        s if s.starts_with("amityvox.message.create") => Some("message_create"),
        s if s.starts_with("amityvox.message.update") => Some("message_update"),
        s if s.starts_with("amityvox.message.delete") => Some("message_delete"),
        s if s.starts_with("amityvox.member.join") => Some("member_join"),
        s if s.starts_with("amityvox.member.leave") => Some("member_leave"),
        s if s.starts_with("amityvox.guild.update") => Some("guild_update"),
        s if s.starts_with("amityvox.reaction.add") => Some("reaction_add"),
        s if s.starts_with("amityvox.reaction.remove") => Some("reaction_remove"),
        _ => None,
    }
}

/// `reqwest::Error::to_string()` only describes the outermost layer
/// ("error sending request for url ..."); the useful detail, like why
/// [`crate::http_client`]'s resolver refused to dial a host, lives
/// further down the `source()` chain. Walks it so delivery failure logs
/// keep the actual reason.
fn describe_error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Constant-time equality for webhook token verification.
pub fn verify_token(expected: &str, provided: &str) -> bool {
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();
    if expected.len() != provided.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (a, b) in expected.iter().zip(provided.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}

/// Subscribes to `amityvox.>` and delivers to every outgoing webhook
/// registered for the mapped event name.
pub struct WebhookEngine {
    store: SharedWebhookStore,
    client: SsrfSafeClient,
    rate_limiter: OutboundRateLimiter,
}

impl WebhookEngine {
    pub fn new(store: SharedWebhookStore) -> AmityResult<Self> {
        Ok(Self {
            store,
            client: SsrfSafeClient::new()?,
            rate_limiter: OutboundRateLimiter::default(),
        })
    }

    /// Registers this engine on `bus` under the queue-group so only one
    /// instance in a cluster handles each event.
    pub async fn attach(self: &Arc<Self>, bus: &EventBus) {
        bus.queue_subscribe("amityvox.>", QUEUE_GROUP, self.clone() as Arc<dyn Subscriber<Event> + Send + Sync>)
            .await;
    }

    async fn deliver_one(&self, event_name: &str, webhook: &crate::types::Webhook, body: &serde_json::Value) {
        let Some(url) = webhook.outgoing_url.as_deref() else {
            return;
        };

        let host = url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string));
        if let Some(host) = &host {
            if !self.rate_limiter.try_acquire(host).await {
                return;
            }
        }

        let request_body = body.to_string();

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(DELIVERY_TIMEOUT_SECS),
            self.client
                .inner()
                .post(url)
                .header("Content-Type", "application/json")
                .header("User-Agent", USER_AGENT)
                .header("X-AmityVox-Event", event_name)
                .json(body)
                .send(),
        )
        .await;

        let log = match outcome {
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                let success = response.status().is_success();
                let preview = response.text().await.unwrap_or_default();
                ExecutionLog::new(webhook.id, status, &request_body, &preview, success, None)
            }
            Ok(Err(err)) => ExecutionLog::new(webhook.id, 0, &request_body, "", false, Some(describe_error_chain(&err))),
            Err(_) => ExecutionLog::new(webhook.id, 0, &request_body, "", false, Some("delivery timed out".to_string())),
        };

        if let Err(err) = self.store.record_execution(log).await {
            warn!("failed to record webhook execution log: {err}");
        }
    }
}

#[async_trait]
impl Subscriber<Event> for WebhookEngine {
    async fn update(&self, event: &Event) {
        let Some(event_name) = event_name_for_subject(&event.subject) else {
            return;
        };

        let webhooks = match self.store.outgoing_for_event(event_name).await {
            Ok(webhooks) => webhooks,
            Err(err) => {
                warn!("failed to query webhooks for {event_name}: {err}");
                return;
            }
        };

        let body = json!({ "event": event_name, "data": event.data });
        for webhook in &webhooks {
            self.deliver_one(event_name, webhook, &body).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_subjects_to_stable_names() {
        assert_eq!(event_name_for_subject("amityvox.message.create"), Some("message_create"));
        assert_eq!(event_name_for_subject("amityvox.unknown.thing"), None);
    }

    #[test]
    fn verify_token_rejects_mismatched_length() {
        assert!(!verify_token("short", "muchlongertoken"));
    }

    #[test]
    fn verify_token_accepts_exact_match() {
        assert!(verify_token("sekret-token-value", "sekret-token-value"));
    }

    #[test]
    fn verify_token_rejects_single_byte_difference() {
        assert!(!verify_token("sekret-token-value", "sekret-token-valux"));
    }

    #[tokio::test]
    async fn ssrf_rejection_reason_reaches_the_execution_log() {
        let store: SharedWebhookStore = Arc::new(store::InMemoryWebhookStore::default());
        let engine = WebhookEngine::new(store.clone()).unwrap();

        let webhook = crate::types::Webhook {
            id: crate::types::utils::Ulid::generate(),
            guild_id: crate::types::utils::Ulid::generate(),
            channel_id: crate::types::utils::Ulid::generate(),
            name: "test".to_string(),
            token: "token".to_string(),
            webhook_type: crate::types::WebhookType::Outgoing,
            outgoing_url: Some("http://10.0.0.1/hook".to_string()),
            subscribed_events: vec!["message_create".to_string()],
        };

        engine.deliver_one("message_create", &webhook, &json!({"event": "message_create"})).await;

        let logs = store.recent_executions(webhook.id).await.unwrap();
        let log = logs.first().expect("delivery attempt should have been logged");
        assert!(!log.success);
        let message = log.error_message.as_deref().unwrap_or_default();
        assert!(message.contains("blocked addresses"), "error_message was: {message}");
    }
}
