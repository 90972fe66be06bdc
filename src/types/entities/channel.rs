// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::types::utils::Ulid;

/// Either guild-scoped (text/voice/announcement/forum/stage) or
/// standalone (DM/group-DM).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Channel {
    pub id: Ulid,
    pub guild_id: Option<Ulid>,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub name: Option<String>,
    pub topic: Option<String>,
    pub position: Option<i32>,
    pub encrypted: bool,
    pub nsfw: bool,
    pub slowmode_seconds: i32,
    pub archived: bool,
    pub locked: bool,
    /// Gossip-style pointer; readers reconcile via the event bus rather
    /// than treating this as authoritative.
    pub last_message_id: Option<Ulid>,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize_repr, Deserialize_repr,
)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[repr(u8)]
pub enum ChannelType {
    #[default]
    GuildText = 0,
    GuildVoice = 1,
    GuildAnnouncement = 2,
    GuildForum = 3,
    GuildStage = 4,
    Dm = 5,
    GroupDm = 6,
}

impl ChannelType {
    pub fn is_guild_scoped(self) -> bool {
        !matches!(self, ChannelType::Dm | ChannelType::GroupDm)
    }
}
