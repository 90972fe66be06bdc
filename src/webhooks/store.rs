// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The webhook store boundary: queries outgoing webhooks subscribed to an
//! event name, and records/retains delivery execution logs. Kept as a
//! trait so the SQL implementation lives in [`crate::storage`] and this
//! module never depends on a particular database.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::errors::AmityResult;
use crate::types::utils::Ulid;
use crate::types::Webhook;

/// These caps apply to stored fields, not wire payloads.
pub const REQUEST_BODY_PREVIEW_LIMIT: usize = 4000;
pub const RESPONSE_PREVIEW_LIMIT: usize = 2000;
/// Rows retained per webhook after each insert.
pub const EXECUTION_LOG_RETENTION: usize = 100;

/// One delivery attempt record.
#[derive(Debug, Clone)]
pub struct ExecutionLog {
    pub id: Ulid,
    pub webhook_id: Ulid,
    pub status_code: u16,
    pub request_body: String,
    pub response_preview: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ExecutionLog {
    pub fn new(webhook_id: Ulid, status_code: u16, request_body: &str, response_preview: &str, success: bool, error_message: Option<String>) -> Self {
        Self {
            id: Ulid::generate(),
            webhook_id,
            status_code,
            request_body: truncate(request_body, REQUEST_BODY_PREVIEW_LIMIT),
            response_preview: truncate(response_preview, RESPONSE_PREVIEW_LIMIT),
            success,
            error_message,
            created_at: Utc::now(),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// Outgoing webhooks subscribed to `event_name`.
    async fn outgoing_for_event(&self, event_name: &str) -> AmityResult<Vec<Webhook>>;

    async fn find_by_id(&self, id: Ulid) -> AmityResult<Option<Webhook>>;

    /// Inserts `log`, then prunes the webhook's log to the
    /// [`EXECUTION_LOG_RETENTION`] most recent rows.
    async fn record_execution(&self, log: ExecutionLog) -> AmityResult<()>;

    async fn recent_executions(&self, webhook_id: Ulid) -> AmityResult<Vec<ExecutionLog>>;
}

/// In-memory reference implementation, used by tests and by a
/// single-process deployment without the `postgres` feature.
#[derive(Default)]
pub struct InMemoryWebhookStore {
    webhooks: RwLock<HashMap<Ulid, Webhook>>,
    logs: RwLock<HashMap<Ulid, Vec<ExecutionLog>>>,
}

impl InMemoryWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, webhook: Webhook) {
        self.webhooks.write().await.insert(webhook.id, webhook);
    }
}

#[async_trait]
impl WebhookStore for InMemoryWebhookStore {
    async fn outgoing_for_event(&self, event_name: &str) -> AmityResult<Vec<Webhook>> {
        use crate::types::WebhookType;
        let webhooks = self.webhooks.read().await;
        Ok(webhooks
            .values()
            .filter(|w| {
                w.webhook_type == WebhookType::Outgoing
                    && w.outgoing_url.as_deref().is_some_and(|u| !u.is_empty())
                    && w.subscribed_events.iter().any(|e| e == event_name)
            })
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: Ulid) -> AmityResult<Option<Webhook>> {
        Ok(self.webhooks.read().await.get(&id).cloned())
    }

    async fn record_execution(&self, log: ExecutionLog) -> AmityResult<()> {
        let mut logs = self.logs.write().await;
        let entries = logs.entry(log.webhook_id).or_default();
        entries.push(log);
        entries.sort_by_key(|l| l.created_at);
        if entries.len() > EXECUTION_LOG_RETENTION {
            let excess = entries.len() - EXECUTION_LOG_RETENTION;
            entries.drain(0..excess);
        }
        Ok(())
    }

    async fn recent_executions(&self, webhook_id: Ulid) -> AmityResult<Vec<ExecutionLog>> {
        Ok(self.logs.read().await.get(&webhook_id).cloned().unwrap_or_default())
    }
}

pub type SharedWebhookStore = Arc<dyn WebhookStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "a".repeat(10);
        assert_eq!(truncate(&s, 3).len(), 3);
    }

    /// Invariant 8: execution log retains at most 100 rows per webhook.
    #[tokio::test]
    async fn record_execution_prunes_to_retention_limit() {
        let store = InMemoryWebhookStore::new();
        let webhook_id = Ulid::generate();
        for i in 0..(EXECUTION_LOG_RETENTION + 10) {
            store
                .record_execution(ExecutionLog::new(webhook_id, 200, &format!("{i}"), "ok", true, None))
                .await
                .unwrap();
        }
        let logs = store.recent_executions(webhook_id).await.unwrap();
        assert_eq!(logs.len(), EXECUTION_LOG_RETENTION);
    }
}
