// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! MLS (RFC 9420) delivery-service storage contracts. The server is a
//! blind relay: every payload here is an opaque blob it never
//! interprets.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::errors::{AmityError, AmityResult};
use crate::types::utils::Ulid;

/// Returned ordered, at most this many per `get_commits` call.
pub const COMMIT_PAGE_LIMIT: usize = 100;
/// Default TTL for an uploaded key package.
pub const KEY_PACKAGE_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct KeyPackage {
    pub id: Ulid,
    pub user_id: Ulid,
    pub device_id: String,
    pub data: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Welcome {
    pub id: Ulid,
    pub channel_id: Ulid,
    pub receiver_id: Ulid,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Commit {
    pub channel_id: Ulid,
    pub epoch: u64,
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct GroupState {
    pub epoch: u64,
    pub tree_hash: Vec<u8>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait MlsStore: Send + Sync {
    async fn upload_key_package(&self, user_id: Ulid, device_id: &str, data: Vec<u8>, expires_at: DateTime<Utc>) -> AmityResult<Ulid>;

    /// Atomically deletes and returns the oldest non-expired package for
    /// `user_id` (spec invariant 6 / scenario S7: concurrent claims must
    /// never return the same package twice).
    async fn claim_key_package(&self, user_id: Ulid) -> AmityResult<KeyPackage>;

    async fn send_welcome(&self, channel_id: Ulid, receiver_id: Ulid, data: Vec<u8>) -> AmityResult<Ulid>;
    async fn get_welcomes(&self, user_id: Ulid) -> AmityResult<Vec<Welcome>>;
    async fn ack_welcome(&self, id: Ulid) -> AmityResult<()>;

    async fn publish_commit(&self, channel_id: Ulid, epoch: u64, data: Vec<u8>) -> AmityResult<()>;
    async fn get_commits(&self, channel_id: Ulid, since_epoch: u64) -> AmityResult<Vec<Commit>>;
}

/// `Mutex`-guarded `Vec` swap-remove, the in-memory counterpart to the
/// Postgres `DELETE ... WHERE id = (SELECT ... FOR UPDATE SKIP LOCKED)`
/// strategy used under load.
#[derive(Default)]
pub struct InMemoryMlsStore {
    key_packages: Mutex<Vec<KeyPackage>>,
    welcomes: Mutex<HashMap<Ulid, Welcome>>,
    commits: Mutex<Vec<Commit>>,
}

impl InMemoryMlsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MlsStore for InMemoryMlsStore {
    async fn upload_key_package(&self, user_id: Ulid, device_id: &str, data: Vec<u8>, expires_at: DateTime<Utc>) -> AmityResult<Ulid> {
        let id = Ulid::generate();
        self.key_packages.lock().await.push(KeyPackage {
            id,
            user_id,
            device_id: device_id.to_string(),
            data,
            expires_at,
        });
        Ok(id)
    }

    async fn claim_key_package(&self, user_id: Ulid) -> AmityResult<KeyPackage> {
        let mut packages = self.key_packages.lock().await;
        let now = Utc::now();
        let mut oldest_index = None;
        let mut oldest_expires_at = None;
        for (index, package) in packages.iter().enumerate() {
            if package.user_id != user_id || package.expires_at <= now {
                continue;
            }
            let is_older = match oldest_expires_at {
                Some(current) => package.expires_at < current,
                None => true,
            };
            if is_older {
                oldest_index = Some(index);
                oldest_expires_at = Some(package.expires_at);
            }
        }

        match oldest_index {
            Some(index) => Ok(packages.swap_remove(index)),
            None => Err(AmityError::NotFound { what: "key package".to_string() }),
        }
    }

    async fn send_welcome(&self, channel_id: Ulid, receiver_id: Ulid, data: Vec<u8>) -> AmityResult<Ulid> {
        let id = Ulid::generate();
        self.welcomes.lock().await.insert(id, Welcome { id, channel_id, receiver_id, data });
        Ok(id)
    }

    async fn get_welcomes(&self, user_id: Ulid) -> AmityResult<Vec<Welcome>> {
        Ok(self.welcomes.lock().await.values().filter(|w| w.receiver_id == user_id).cloned().collect())
    }

    async fn ack_welcome(&self, id: Ulid) -> AmityResult<()> {
        self.welcomes.lock().await.remove(&id);
        Ok(())
    }

    async fn publish_commit(&self, channel_id: Ulid, epoch: u64, data: Vec<u8>) -> AmityResult<()> {
        self.commits.lock().await.push(Commit { channel_id, epoch, data, created_at: Utc::now() });
        Ok(())
    }

    async fn get_commits(&self, channel_id: Ulid, since_epoch: u64) -> AmityResult<Vec<Commit>> {
        let mut commits: Vec<Commit> = self
            .commits
            .lock()
            .await
            .iter()
            .filter(|c| c.channel_id == channel_id && c.epoch >= since_epoch)
            .cloned()
            .collect();
        commits.sort_by(|a, b| a.epoch.cmp(&b.epoch).then(a.created_at.cmp(&b.created_at)));
        commits.truncate(COMMIT_PAGE_LIMIT);
        Ok(commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn expires_soon() -> DateTime<Utc> {
        Utc::now() + chrono::Duration::days(KEY_PACKAGE_TTL_DAYS)
    }

    #[tokio::test]
    async fn claims_oldest_first() {
        let store = InMemoryMlsStore::new();
        let user_id = Ulid::generate();
        let first = store.upload_key_package(user_id, "dev-a", vec![1], expires_soon()).await.unwrap();
        store.upload_key_package(user_id, "dev-b", vec![2], expires_soon() + chrono::Duration::days(1)).await.unwrap();

        let claimed = store.claim_key_package(user_id).await.unwrap();
        assert_eq!(claimed.id, first);
    }

    #[tokio::test]
    async fn claiming_with_none_left_is_not_found() {
        let store = InMemoryMlsStore::new();
        let err = store.claim_key_package(Ulid::generate()).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    /// Invariant 6 / scenario S7: 10 parallel claims against 2 seeded
    /// packages must yield exactly 2 successes, no double-claim.
    #[tokio::test]
    async fn concurrent_claims_never_double_claim() {
        let store = Arc::new(InMemoryMlsStore::new());
        let user_id = Ulid::generate();
        store.upload_key_package(user_id, "dev-a", vec![1], expires_soon()).await.unwrap();
        store.upload_key_package(user_id, "dev-b", vec![2], expires_soon()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.claim_key_package(user_id).await }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 2);
    }

    #[tokio::test]
    async fn get_commits_orders_by_epoch_then_created() {
        let store = InMemoryMlsStore::new();
        let channel_id = Ulid::generate();
        store.publish_commit(channel_id, 2, vec![2]).await.unwrap();
        store.publish_commit(channel_id, 1, vec![1]).await.unwrap();
        let commits = store.get_commits(channel_id, 0).await.unwrap();
        assert_eq!(commits.iter().map(|c| c.epoch).collect::<Vec<_>>(), vec![1, 2]);
    }
}
