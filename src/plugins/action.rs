// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The sandbox I/O contract and the action interpreter: the sandbox
//! only ever returns intent, never performs an effect itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::utils::Ulid;

use super::manifest::Hook;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginContext {
    pub guild_id: Ulid,
    pub channel_id: Option<Ulid>,
    pub user_id: Option<Ulid>,
    pub hook_type: Hook,
    pub event_data: Value,
    pub config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PluginAction {
    SendMessage { channel_id: Ulid, content: String },
    AddRole { user_id: Ulid, role_id: Ulid },
    RemoveRole { user_id: Ulid, role_id: Ulid },
    React { message_id: Ulid, emoji: String },
    Log { level: String, message: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PluginResponse {
    pub actions: Vec<PluginAction>,
}

/// The effects an interpreted [`PluginAction`] produces, for the engine
/// to apply. Kept separate from `PluginAction` so the interpreter (which
/// resolves `bot_user_id`/guild-owner fallbacks) doesn't leak back into
/// the sandbox's output contract.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CreateMessage { channel_id: Ulid, author_id: Ulid, content: String },
    UpsertMemberRole { guild_id: Ulid, user_id: Ulid, role_id: Ulid },
    RemoveMemberRole { guild_id: Ulid, user_id: Ulid, role_id: Ulid },
    CreateReaction { message_id: Ulid, author_id: Ulid, emoji: String },
    LogEntry { plugin_id: Ulid, level: String, message: String },
}

/// Truncates `actions` to `max_actions` (excess entries are dropped
/// silently, not rejected), then interprets each surviving action into
/// an [`Effect`]. `send_message`/`react` fall back to `guild_owner_id`
/// when the plugin has no dedicated bot user.
pub fn interpret(
    response: PluginResponse,
    max_actions: usize,
    plugin_id: Ulid,
    guild_id: Ulid,
    bot_user_id: Option<Ulid>,
    guild_owner_id: Ulid,
) -> Vec<Effect> {
    let author = bot_user_id.unwrap_or(guild_owner_id);

    response
        .actions
        .into_iter()
        .take(max_actions)
        .filter_map(|action| match action {
            PluginAction::SendMessage { channel_id, content } => Some(Effect::CreateMessage {
                channel_id,
                author_id: author,
                content,
            }),
            PluginAction::AddRole { user_id, role_id } => {
                Some(Effect::UpsertMemberRole { guild_id, user_id, role_id })
            }
            PluginAction::RemoveRole { user_id, role_id } => {
                Some(Effect::RemoveMemberRole { guild_id, user_id, role_id })
            }
            PluginAction::React { message_id, emoji } => Some(Effect::CreateReaction {
                message_id,
                author_id: guild_owner_id,
                emoji,
            }),
            PluginAction::Log { level, message } => Some(Effect::LogEntry { plugin_id, level, message }),
            PluginAction::Unknown => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(n: usize) -> PluginAction {
        PluginAction::Log {
            level: "info".to_string(),
            message: format!("action {n}"),
        }
    }

    #[test]
    fn interpret_truncates_to_max_actions() {
        let response = PluginResponse {
            actions: (0..20).map(action).collect(),
        };
        let effects = interpret(response, 10, Ulid::generate(), Ulid::generate(), None, Ulid::generate());
        assert_eq!(effects.len(), 10);
    }

    #[test]
    fn unknown_action_is_dropped_not_rejected() {
        let response = PluginResponse {
            actions: vec![action(0), PluginAction::Unknown, action(1)],
        };
        let effects = interpret(response, 10, Ulid::generate(), Ulid::generate(), None, Ulid::generate());
        assert_eq!(effects.len(), 2);
    }

    #[test]
    fn send_message_falls_back_to_guild_owner_without_bot_user() {
        let owner = Ulid::generate();
        let channel = Ulid::generate();
        let response = PluginResponse {
            actions: vec![PluginAction::SendMessage { channel_id: channel, content: "hi".into() }],
        };
        let effects = interpret(response, 10, Ulid::generate(), Ulid::generate(), None, owner);
        assert_eq!(
            effects[0],
            Effect::CreateMessage { channel_id: channel, author_id: owner, content: "hi".into() }
        );
    }
}
