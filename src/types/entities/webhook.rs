// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use crate::types::utils::Ulid;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[serde(rename_all = "snake_case")]
pub enum WebhookType {
    #[default]
    Incoming,
    Outgoing,
}

/// Carries an opaque, high-entropy secret `token`; the execute path must
/// compare it with constant-time equality (see [`crate::webhooks`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Webhook {
    pub id: Ulid,
    pub guild_id: Ulid,
    pub channel_id: Ulid,
    pub name: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub webhook_type: WebhookType,
    /// Only meaningful for `webhook_type = outgoing`: where deliveries
    /// are POSTed.
    pub outgoing_url: Option<String>,
    /// Only meaningful for `webhook_type = outgoing`: the subject globs
    /// this webhook is subscribed to on the event bus, e.g.
    /// `amityvox.message.>`.
    #[cfg_attr(feature = "postgres", sqlx(json))]
    pub subscribed_events: Vec<String>,
}
