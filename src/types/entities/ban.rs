// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::utils::Ulid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Ban {
    pub guild_id: Ulid,
    pub user_id: Ulid,
    pub banned_by: Ulid,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
