// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::utils::Ulid;

/// The (guild, user) pair. Role membership is a separate `MemberRole`
/// (guild, user, role) triple in storage; here it is denormalized into
/// `role_ids` for the permission resolver's convenience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildMember {
    pub guild_id: Ulid,
    pub user_id: Ulid,
    pub nickname: Option<String>,
    pub avatar_override: Option<String>,
    pub role_ids: Vec<Ulid>,
    pub timeout_until: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
}

impl GuildMember {
    pub fn is_timed_out(&self) -> bool {
        self.timeout_until.is_some_and(|until| until > Utc::now())
    }
}

/// The (guild, user, role) triple backing [`GuildMember::role_ids`] in
/// storage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct MemberRole {
    pub guild_id: Ulid,
    pub user_id: Ulid,
    pub role_id: Ulid,
}
