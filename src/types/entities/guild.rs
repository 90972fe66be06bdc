// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::permissions::PermissionFlags;
use crate::types::utils::Ulid;

/// A community owned by a [`crate::types::User`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Guild {
    pub id: Ulid,
    pub owner_id: Ulid,
    pub name: String,
    pub icon: Option<String>,
    pub default_permissions: PermissionFlags,
    pub verification_level: VerificationLevel,
    pub system_channel_id: Option<Ulid>,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize_repr, Deserialize_repr,
)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[repr(u8)]
pub enum VerificationLevel {
    #[default]
    None = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

/// A [`crate::types::Role`] at `position = 0` is the synthetic
/// `@everyone` role; guild creation must always produce exactly one, and
/// it can never be deleted.
pub fn everyone_role(guild_id: Ulid) -> crate::types::Role {
    crate::types::Role {
        id: Ulid::generate(),
        guild_id,
        name: "@everyone".to_string(),
        color: 0,
        hoist: false,
        position: 0,
        allow: PermissionFlags::VIEW_CHANNEL
            | PermissionFlags::READ_HISTORY
            | PermissionFlags::SEND_MESSAGES,
        deny: PermissionFlags::empty(),
        mentionable: false,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everyone_role_has_position_zero() {
        let role = everyone_role(Ulid::generate());
        assert_eq!(role.position, 0);
    }
}
