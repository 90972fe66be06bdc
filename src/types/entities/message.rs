// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::utils::Ulid;

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct MessageFlags: u32 {
        const PINNED = 1 << 0;
        const SILENT = 1 << 1;
        const URGENT = 1 << 2;
        const CROSSPOST = 1 << 3;
    }
}

/// A displayed identity overlay that does not change `author_id`,
/// used by webhooks and bridged/bot integrations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Masquerade {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Belongs to a [`crate::types::Channel`]. `author_id` is nullable so a
/// channel's messages outlive soft-deletion of the author.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Message {
    pub id: Ulid,
    pub channel_id: Ulid,
    pub author_id: Option<Ulid>,
    pub content: String,
    pub flags: MessageFlags,
    pub reply_to: Option<Ulid>,
    #[cfg_attr(feature = "postgres", sqlx(json))]
    pub mentioned_user_ids: Vec<Ulid>,
    #[cfg_attr(feature = "postgres", sqlx(json))]
    pub mentioned_role_ids: Vec<Ulid>,
    pub mention_everyone: bool,
    #[cfg_attr(feature = "postgres", sqlx(json))]
    pub masquerade: Option<Masquerade>,
    pub encrypted: bool,
    pub encryption_session_id: Option<Ulid>,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_pinned(&self) -> bool {
        self.flags.contains(MessageFlags::PINNED)
    }
}
