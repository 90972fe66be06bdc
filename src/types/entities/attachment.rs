// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use crate::types::utils::Ulid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Attachment {
    pub id: Ulid,
    pub message_id: Ulid,
    pub filename: String,
    pub content_type: Option<String>,
    pub size_bytes: u64,
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}
