// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use crate::types::utils::Ulid;

/// The (message, user, emoji) triple a reaction addition/removal toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Reaction {
    pub message_id: Ulid,
    pub user_id: Ulid,
    pub emoji_id: Option<Ulid>,
    pub emoji_name: String,
}
