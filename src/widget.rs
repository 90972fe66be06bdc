// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The public widget embed projection: `GET /guilds/{id}/widget.json`.
//! Unauthenticated, so [`build_guild_widget`] only ever sees data the
//! caller has already decided is safe to publish; it is a pure
//! projection, not a fetch.

use serde::{Deserialize, Serialize};

use crate::types::{Channel, Guild};
use crate::types::utils::Ulid;

pub const MAX_WIDGET_CHANNELS: usize = 25;
pub const MAX_WIDGET_ONLINE_MEMBERS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Idle,
    Dnd,
}

/// A member currently online, as far as the widget is concerned. Built
/// by the caller from gateway presence state, not stored here.
#[derive(Debug, Clone)]
pub struct OnlineMember {
    pub id: Ulid,
    pub username: String,
    pub avatar: Option<String>,
    pub status: PresenceStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct WidgetChannel {
    pub id: Ulid,
    pub name: Option<String>,
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WidgetMember {
    pub id: Ulid,
    pub username: String,
    pub avatar: Option<String>,
    pub status: PresenceStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuildWidget {
    pub id: Ulid,
    pub name: String,
    pub icon_id: Option<String>,
    pub online_count: u64,
    pub member_count: u64,
    pub invite_code: Option<String>,
    pub channels: Vec<WidgetChannel>,
    pub online_members: Vec<WidgetMember>,
}

/// Projects `guild` into its public widget payload, gated on
/// `widget_enabled`. `channels` should already be filtered to the ones
/// visible to `@everyone`; this function only caps and reorders them.
/// Returns `None` when the widget is disabled, so the routing layer can
/// turn that straight into a 404.
pub fn build_guild_widget(
    guild: &Guild,
    widget_enabled: bool,
    member_count: u64,
    invite_code: Option<String>,
    channels: &[Channel],
    online_members: &[OnlineMember],
) -> Option<GuildWidget> {
    if !widget_enabled {
        return None;
    }

    let mut channels: Vec<&Channel> = channels.iter().collect();
    channels.sort_by_key(|c| c.position.unwrap_or(i32::MAX));
    let channels = channels
        .into_iter()
        .take(MAX_WIDGET_CHANNELS)
        .map(|c| WidgetChannel { id: c.id, name: c.name.clone(), position: c.position })
        .collect();

    let online_members: Vec<_> = online_members
        .iter()
        .take(MAX_WIDGET_ONLINE_MEMBERS)
        .map(|m| WidgetMember { id: m.id, username: m.username.clone(), avatar: m.avatar.clone(), status: m.status })
        .collect();

    Some(GuildWidget {
        id: guild.id,
        name: guild.name.clone(),
        icon_id: guild.icon.clone(),
        online_count: online_members.len() as u64,
        member_count,
        invite_code,
        channels,
        online_members,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::permissions::PermissionFlags;
    use crate::types::{ChannelType, VerificationLevel};

    use super::*;

    fn guild() -> Guild {
        Guild {
            id: Ulid::generate(),
            owner_id: Ulid::generate(),
            name: "Test Guild".to_string(),
            icon: Some("icon123".to_string()),
            default_permissions: PermissionFlags::empty(),
            verification_level: VerificationLevel::None,
            system_channel_id: None,
            created_at: Utc::now(),
        }
    }

    fn channel(position: i32) -> Channel {
        Channel {
            id: Ulid::generate(),
            guild_id: None,
            channel_type: ChannelType::GuildText,
            name: Some(format!("channel-{position}")),
            topic: None,
            position: Some(position),
            encrypted: false,
            nsfw: false,
            slowmode_seconds: 0,
            archived: false,
            locked: false,
            last_message_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn disabled_widget_returns_none() {
        assert!(build_guild_widget(&guild(), false, 10, None, &[], &[]).is_none());
    }

    #[test]
    fn enabled_widget_projects_fields() {
        let g = guild();
        let channels = vec![channel(1), channel(0)];
        let widget = build_guild_widget(&g, true, 42, Some("abc123".to_string()), &channels, &[]).unwrap();
        assert_eq!(widget.id, g.id);
        assert_eq!(widget.icon_id.as_deref(), Some("icon123"));
        assert_eq!(widget.member_count, 42);
        assert_eq!(widget.invite_code.as_deref(), Some("abc123"));
        assert_eq!(widget.channels.len(), 2);
        assert_eq!(widget.channels[0].position, Some(0));
    }

    #[test]
    fn channels_are_capped_at_twenty_five() {
        let channels: Vec<Channel> = (0..30).map(channel).collect();
        let widget = build_guild_widget(&guild(), true, 1, None, &channels, &[]).unwrap();
        assert_eq!(widget.channels.len(), MAX_WIDGET_CHANNELS);
    }

    #[test]
    fn online_members_are_capped_at_one_hundred() {
        let members: Vec<OnlineMember> = (0..150)
            .map(|i| OnlineMember { id: Ulid::generate(), username: format!("user{i}"), avatar: None, status: PresenceStatus::Online })
            .collect();
        let widget = build_guild_widget(&guild(), true, 150, None, &[], &members).unwrap();
        assert_eq!(widget.online_members.len(), MAX_WIDGET_ONLINE_MEMBERS);
        assert_eq!(widget.online_count, MAX_WIDGET_ONLINE_MEMBERS as u64);
    }
}
