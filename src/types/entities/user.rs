// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::utils::Ulid;

bitflags! {
    /// Account-level flags.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct UserFlags: u32 {
        const SUSPENDED = 1 << 0;
        const DELETED = 1 << 1;
        const ADMIN = 1 << 2;
        const BOT = 1 << 3;
        const VERIFIED = 1 << 4;
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for UserFlags {
    fn type_info() -> <sqlx::Postgres as sqlx::Database>::TypeInfo {
        <i32 as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

#[cfg(feature = "postgres")]
impl<'q> sqlx::Encode<'q, sqlx::Postgres> for UserFlags {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Postgres as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i32 as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&(self.bits() as i32), buf)
    }
}

#[cfg(feature = "postgres")]
impl<'d> sqlx::Decode<'d, sqlx::Postgres> for UserFlags {
    fn decode(
        value: <sqlx::Postgres as sqlx::Database>::ValueRef<'d>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let bits = <i32 as sqlx::Decode<'d, sqlx::Postgres>>::decode(value)?;
        Ok(UserFlags::from_bits_truncate(bits as u32))
    }
}

/// Identified globally as `@username@domain`. `username` is unique
/// within `instance_id`, not across the federation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct User {
    pub id: Ulid,
    pub instance_id: Ulid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub flags: UserFlags,
    /// Never serialized into a REST response; present only for the
    /// authentication layer's own reads of the row.
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub totp_secret: Option<String>,
    #[serde(skip_serializing)]
    pub webauthn_credentials: Vec<WebauthnCredential>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn handle(&self, instance_domain: &str) -> String {
        format!("@{}@{}", self.username, instance_domain)
    }

    pub fn is_usable(&self) -> bool {
        !self.flags.intersects(UserFlags::SUSPENDED | UserFlags::DELETED)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebauthnCredential {
    pub credential_id: Vec<u8>,
    pub public_key: Vec<u8>,
    pub sign_count: u32,
}

/// An authentication grant. The bearer token itself is the primary key;
/// invariant `created_at <= last_active_at <= expires_at` is enforced by
/// [`UserSession::touch`] and [`UserSession::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct UserSession {
    pub token: String,
    pub user_id: Ulid,
    pub device_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    pub fn new(user_id: Ulid, device_name: Option<String>, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            token: generate_bearer_token(),
            user_id,
            device_name,
            created_at: now,
            last_active_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Bumps `last_active_at`, clamped so the session invariant holds even
    /// if called after expiry.
    pub fn touch(&mut self) {
        self.last_active_at = self.expires_at.min(Utc::now());
    }
}

fn generate_bearer_token() -> String {
    use base64::Engine;
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_satisfies_ordering_invariant() {
        let session = UserSession::new(Ulid::generate(), None, chrono::Duration::hours(1));
        assert!(session.created_at <= session.last_active_at);
        assert!(session.last_active_at <= session.expires_at);
    }

    #[test]
    fn is_usable_false_when_suspended() {
        let mut user = User {
            id: Ulid::generate(),
            instance_id: Ulid::generate(),
            username: "a".into(),
            display_name: None,
            avatar: None,
            flags: UserFlags::empty(),
            password_hash: String::new(),
            totp_secret: None,
            webauthn_credentials: vec![],
            created_at: Utc::now(),
        };
        assert!(user.is_usable());
        user.flags |= UserFlags::SUSPENDED;
        assert!(!user.is_usable());
    }
}
