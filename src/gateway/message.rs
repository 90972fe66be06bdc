// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The wire envelope sent and received over the gateway WebSocket.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::utils::Ulid;

/// `{op, d, t?, s?}`, the envelope every gateway opcode rides inside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(rename = "t", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(rename = "s", skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

impl GatewayMessage {
    pub fn new(op: u8, d: Value) -> Self {
        Self {
            op,
            d,
            event_type: None,
            sequence: None,
        }
    }

    pub fn dispatch(event_type: &str, sequence: u64, d: Value) -> Self {
        Self {
            op: super::opcodes::OP_DISPATCH,
            d,
            event_type: Some(event_type.to_string()),
            sequence: Some(sequence),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    pub seq: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribePayload {
    pub channel_id: Ulid,
}

#[derive(Debug, Clone, Serialize)]
pub struct HelloPayload {
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadyPayload {
    pub session_id: String,
    pub user_id: Ulid,
    pub guild_ids: Vec<Ulid>,
}
