// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::utils::Ulid;

/// A code that, when used, adds a user to a guild or channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Invite {
    pub code: String,
    pub guild_id: Ulid,
    pub channel_id: Ulid,
    pub created_by: Ulid,
    pub max_uses: Option<u32>,
    pub uses: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Invite {
    pub fn is_usable(&self) -> bool {
        let not_expired = self.expires_at.map_or(true, |at| at > Utc::now());
        let not_exhausted = self.max_uses.map_or(true, |max| self.uses < max);
        not_expired && not_exhausted
    }
}
