// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::permissions::PermissionFlags;
use crate::types::utils::Ulid;

/// Belongs to a [`crate::types::Guild`]. `position = 0` is reserved for
/// the synthetic `@everyone` role (see [`crate::types::everyone_role`]);
/// higher `position` outranks lower when roles are applied in
/// [`crate::permissions::resolve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Role {
    pub id: Ulid,
    pub guild_id: Ulid,
    pub name: String,
    /// RGB packed as `0xRRGGBB`, `0` meaning no color override.
    pub color: u32,
    /// Displayed separately from other members in the member list.
    pub hoist: bool,
    pub position: i32,
    pub allow: PermissionFlags,
    pub deny: PermissionFlags,
    pub mentionable: bool,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn is_everyone(&self) -> bool {
        self.position == 0
    }
}
