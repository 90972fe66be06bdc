// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use crate::types::utils::Ulid;

/// The on-the-wire envelope published to [`crate::bus`] and relayed to
/// gateway subscribers and outgoing webhooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Dot-separated subject, e.g. `amityvox.message.create`.
    pub subject: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub guild_id: Option<Ulid>,
    pub channel_id: Option<Ulid>,
    pub user_id: Option<Ulid>,
    pub data: serde_json::Value,
    /// Present on events delivered over a gateway session; absent for
    /// bus-internal publishes that never reach a client.
    pub sequence: Option<u64>,
}

impl Event {
    pub fn new(subject: impl Into<String>, event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            subject: subject.into(),
            event_type: event_type.into(),
            guild_id: None,
            channel_id: None,
            user_id: None,
            data,
            sequence: None,
        }
    }

    pub fn with_guild(mut self, guild_id: Ulid) -> Self {
        self.guild_id = Some(guild_id);
        self
    }

    pub fn with_channel(mut self, channel_id: Ulid) -> Self {
        self.channel_id = Some(channel_id);
        self
    }

    pub fn with_user(mut self, user_id: Ulid) -> Self {
        self.user_id = Some(user_id);
        self
    }
}
