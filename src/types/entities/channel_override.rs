// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use crate::permissions::PermissionFlags;
use crate::types::utils::Ulid;

/// Per-channel override on a `role|user` target. Storage backends map
/// [`OverrideTarget`] to their own `target_type`/`target_id` columns
/// rather than relying on derived row mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelOverride {
    pub channel_id: Ulid,
    pub target: OverrideTarget,
    pub allow: PermissionFlags,
    pub deny: PermissionFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target_type", rename_all = "snake_case")]
pub enum OverrideTarget {
    Role(Ulid),
    User(Ulid),
}
