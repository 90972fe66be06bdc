// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Plugin manifests and their resource-limit defaults.

use serde::{Deserialize, Serialize};

use crate::types::utils::Ulid;

/// The stable hook alphabet, each mapping 1:1 to an event-bus subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    MemberJoin,
    MemberLeave,
    GuildUpdate,
    Scheduled,
    ReactionAdd,
    ReactionRemove,
}

impl Hook {
    pub fn bus_subject(self) -> &'static str {
        match self {
            Hook::MessageCreate => "amityvox.message.create",
            Hook::MessageUpdate => "amityvox.message.update",
            Hook::MessageDelete => "amityvox.message.delete",
            Hook::MemberJoin => "amityvox.member.join",
            Hook::MemberLeave => "amityvox.member.leave",
            Hook::GuildUpdate => "amityvox.guild.update",
            Hook::Scheduled => "amityvox.scheduled",
            Hook::ReactionAdd => "amityvox.reaction.add",
            Hook::ReactionRemove => "amityvox.reaction.remove",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_memory_bytes: u64,
    pub max_execution_time: std::time::Duration,
    pub max_cpu_ms: u64,
    pub max_actions: usize,
    pub allow_network: bool,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: 16 * 1024 * 1024,
            max_execution_time: std::time::Duration::from_secs(5),
            max_cpu_ms: 1_000,
            max_actions: 10,
            allow_network: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub hooks: Vec<Hook>,
    pub permissions: Vec<String>,
    pub config_schema: serde_json::Value,
    #[serde(default)]
    pub limits: ResourceLimits,
}

/// One loaded `(guild, plugin)` pair: a manifest plus either WASM bytes
/// or a built-in marker, instantiated into a [`super::sandbox::PluginSandbox`].
#[derive(Debug, Clone)]
pub struct PluginInstance {
    pub id: Ulid,
    pub guild_id: Ulid,
    pub plugin_id: Ulid,
    pub bot_user_id: Ulid,
    pub manifest: Manifest,
    pub wasm_bytes: Option<Vec<u8>>,
    pub enabled: bool,
}

impl PluginInstance {
    pub fn is_builtin(&self) -> bool {
        self.wasm_bytes.is_none()
    }
}
