// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::utils::Ulid;

/// An append-only moderation record. Permission-gated REST handlers
/// write one row per action; nothing in this crate reads them back
/// except for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct AuditLogEntry {
    pub id: Ulid,
    pub guild_id: Ulid,
    pub actor_id: Ulid,
    pub action: String,
    pub target_id: Option<Ulid>,
    pub reason: Option<String>,
    #[cfg_attr(feature = "postgres", sqlx(json))]
    pub changes: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
