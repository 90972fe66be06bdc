// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Postgres-backed implementations of the storage contracts, built on
//! `sqlx::Postgres` with the `chrono`, `json` and `runtime-tokio-rustls`
//! features. Runtime-checked queries (`query_as`, not the `query_as!`
//! macro) are used throughout since this crate never runs against a
//! live database during authoring.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::e2e::backup::{KeyBackup, KeyBackupStore};
use crate::e2e::mls::{Commit, GroupState, KeyPackage, MlsStore, Welcome, COMMIT_PAGE_LIMIT};
use crate::errors::{AmityError, AmityResult};
use crate::types::utils::Ulid;
use crate::webhooks::store::{ExecutionLog, WebhookStore, EXECUTION_LOG_RETENTION};
use crate::types::{Webhook, WebhookType};

pub struct PgWebhookStore {
    pool: PgPool,
}

impl PgWebhookStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl WebhookStore for PgWebhookStore {
    async fn outgoing_for_event(&self, event_name: &str) -> AmityResult<Vec<Webhook>> {
        let webhooks = sqlx::query_as::<_, Webhook>(
            "SELECT id, guild_id, channel_id, name, token, webhook_type, outgoing_url, subscribed_events \
             FROM webhooks \
             WHERE webhook_type = $1 AND outgoing_url IS NOT NULL AND outgoing_url <> '' \
             AND subscribed_events @> to_jsonb(ARRAY[$2::text])",
        )
        .bind(WebhookType::Outgoing)
        .bind(event_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(webhooks)
    }

    async fn find_by_id(&self, id: Ulid) -> AmityResult<Option<Webhook>> {
        let webhook = sqlx::query_as::<_, Webhook>(
            "SELECT id, guild_id, channel_id, name, token, webhook_type, outgoing_url, subscribed_events \
             FROM webhooks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(webhook)
    }

    async fn record_execution(&self, log: ExecutionLog) -> AmityResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO webhook_executions \
             (id, webhook_id, status_code, request_body, response_preview, success, error_message, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(log.id)
        .bind(log.webhook_id)
        .bind(log.status_code as i32)
        .bind(&log.request_body)
        .bind(&log.response_preview)
        .bind(log.success)
        .bind(&log.error_message)
        .bind(log.created_at)
        .execute(&mut *tx)
        .await?;

        // Invariant 8: retain only the EXECUTION_LOG_RETENTION most recent rows per webhook.
        sqlx::query(
            "DELETE FROM webhook_executions WHERE webhook_id = $1 AND id NOT IN ( \
               SELECT id FROM webhook_executions WHERE webhook_id = $1 \
               ORDER BY created_at DESC LIMIT $2 \
             )",
        )
        .bind(log.webhook_id)
        .bind(EXECUTION_LOG_RETENTION as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn recent_executions(&self, webhook_id: Ulid) -> AmityResult<Vec<ExecutionLog>> {
        let rows = sqlx::query_as::<_, ExecutionLogRow>(
            "SELECT id, webhook_id, status_code, request_body, response_preview, success, error_message, created_at \
             FROM webhook_executions WHERE webhook_id = $1 ORDER BY created_at DESC",
        )
        .bind(webhook_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ExecutionLogRow::into_domain).collect())
    }
}

#[derive(sqlx::FromRow)]
struct ExecutionLogRow {
    id: Ulid,
    webhook_id: Ulid,
    status_code: i32,
    request_body: String,
    response_preview: String,
    success: bool,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl ExecutionLogRow {
    fn into_domain(self) -> ExecutionLog {
        ExecutionLog {
            id: self.id,
            webhook_id: self.webhook_id,
            status_code: self.status_code as u16,
            request_body: self.request_body,
            response_preview: self.response_preview,
            success: self.success,
            error_message: self.error_message,
            created_at: self.created_at,
        }
    }
}

pub struct PgMlsStore {
    pool: PgPool,
}

impl PgMlsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct KeyPackageRow {
    id: Ulid,
    user_id: Ulid,
    device_id: String,
    data: Vec<u8>,
    expires_at: DateTime<Utc>,
}

impl From<KeyPackageRow> for KeyPackage {
    fn from(row: KeyPackageRow) -> Self {
        KeyPackage {
            id: row.id,
            user_id: row.user_id,
            device_id: row.device_id,
            data: row.data,
            expires_at: row.expires_at,
        }
    }
}

#[async_trait::async_trait]
impl MlsStore for PgMlsStore {
    async fn upload_key_package(&self, user_id: Ulid, device_id: &str, data: Vec<u8>, expires_at: DateTime<Utc>) -> AmityResult<Ulid> {
        let id = Ulid::generate();
        sqlx::query("INSERT INTO key_packages (id, user_id, device_id, data, expires_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(id)
            .bind(user_id)
            .bind(device_id)
            .bind(&data)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    /// `DELETE ... WHERE id = (SELECT id ... FOR UPDATE SKIP LOCKED LIMIT 1) RETURNING *`:
    /// Postgres serializes this per-row so two concurrent claims can
    /// never return the same package.
    async fn claim_key_package(&self, user_id: Ulid) -> AmityResult<KeyPackage> {
        let row = sqlx::query_as::<_, KeyPackageRow>(
            "DELETE FROM key_packages WHERE id = ( \
               SELECT id FROM key_packages \
               WHERE user_id = $1 AND expires_at > now() \
               ORDER BY expires_at ASC \
               FOR UPDATE SKIP LOCKED LIMIT 1 \
             ) RETURNING id, user_id, device_id, data, expires_at",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(KeyPackage::from)
            .ok_or_else(|| AmityError::NotFound { what: "key package".to_string() })
    }

    async fn send_welcome(&self, channel_id: Ulid, receiver_id: Ulid, data: Vec<u8>) -> AmityResult<Ulid> {
        let id = Ulid::generate();
        sqlx::query("INSERT INTO welcome_messages (id, channel_id, receiver_id, data) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(channel_id)
            .bind(receiver_id)
            .bind(&data)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn get_welcomes(&self, user_id: Ulid) -> AmityResult<Vec<Welcome>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            id: Ulid,
            channel_id: Ulid,
            receiver_id: Ulid,
            data: Vec<u8>,
        }
        let rows = sqlx::query_as::<_, Row>(
            "SELECT id, channel_id, receiver_id, data FROM welcome_messages WHERE receiver_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Welcome { id: r.id, channel_id: r.channel_id, receiver_id: r.receiver_id, data: r.data })
            .collect())
    }

    async fn ack_welcome(&self, id: Ulid) -> AmityResult<()> {
        sqlx::query("DELETE FROM welcome_messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn publish_commit(&self, channel_id: Ulid, epoch: u64, data: Vec<u8>) -> AmityResult<()> {
        sqlx::query("INSERT INTO commits (channel_id, epoch, data, created_at) VALUES ($1, $2, $3, now())")
            .bind(channel_id)
            .bind(epoch as i64)
            .bind(&data)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_commits(&self, channel_id: Ulid, since_epoch: u64) -> AmityResult<Vec<Commit>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            epoch: i64,
            data: Vec<u8>,
            created_at: DateTime<Utc>,
        }
        let rows = sqlx::query_as::<_, Row>(
            "SELECT epoch, data, created_at FROM commits \
             WHERE channel_id = $1 AND epoch >= $2 \
             ORDER BY epoch ASC, created_at ASC LIMIT $3",
        )
        .bind(channel_id)
        .bind(since_epoch as i64)
        .bind(COMMIT_PAGE_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Commit { channel_id, epoch: r.epoch as u64, data: r.data, created_at: r.created_at })
            .collect())
    }
}

/// Reads a channel's MLS group state, used by clients deciding whether
/// they're caught up before fetching commits.
pub async fn get_group_state(pool: &PgPool, channel_id: Ulid) -> AmityResult<Option<GroupState>> {
    #[derive(sqlx::FromRow)]
    struct Row {
        epoch: i64,
        tree_hash: Vec<u8>,
        updated_at: DateTime<Utc>,
    }
    let row = sqlx::query_as::<_, Row>("SELECT epoch, tree_hash, updated_at FROM group_states WHERE channel_id = $1")
        .bind(channel_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| GroupState { epoch: r.epoch as u64, tree_hash: r.tree_hash, updated_at: Some(r.updated_at) }))
}

pub struct PgKeyBackupStore {
    pool: PgPool,
}

impl PgKeyBackupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl KeyBackupStore for PgKeyBackupStore {
    async fn put(&self, user_id: Ulid, encrypted_data: Vec<u8>, salt: Vec<u8>, nonce: Vec<u8>, key_count: u32) -> AmityResult<u32> {
        let row: (i32,) = sqlx::query_as(
            "INSERT INTO key_backups (user_id, encrypted_data, salt, nonce, key_count, version) \
             VALUES ($1, $2, $3, $4, $5, 1) \
             ON CONFLICT (user_id) DO UPDATE SET \
               encrypted_data = EXCLUDED.encrypted_data, salt = EXCLUDED.salt, nonce = EXCLUDED.nonce, \
               key_count = EXCLUDED.key_count, version = key_backups.version + 1 \
             RETURNING version",
        )
        .bind(user_id)
        .bind(&encrypted_data)
        .bind(&salt)
        .bind(&nonce)
        .bind(key_count as i32)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0 as u32)
    }

    async fn download(&self, user_id: Ulid) -> AmityResult<KeyBackup> {
        #[derive(sqlx::FromRow)]
        struct Row {
            encrypted_data: Vec<u8>,
            salt: Vec<u8>,
            nonce: Vec<u8>,
            key_count: i32,
            version: i32,
        }
        let row = sqlx::query_as::<_, Row>(
            "SELECT encrypted_data, salt, nonce, key_count, version FROM key_backups WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AmityError::NotFound { what: "key backup".to_string() })?;

        Ok(KeyBackup {
            user_id,
            encrypted_data: row.encrypted_data,
            salt: row.salt,
            nonce: row.nonce,
            key_count: row.key_count as u32,
            version: row.version as u32,
        })
    }

    async fn delete(&self, user_id: Ulid) -> AmityResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM recovery_codes WHERE user_id = $1").bind(user_id).execute(&mut *tx).await?;
        sqlx::query("DELETE FROM key_backups WHERE user_id = $1").bind(user_id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
