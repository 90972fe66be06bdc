// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use crate::types::utils::Ulid;

/// A single federated deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Instance {
    pub id: Ulid,
    pub domain: String,
    /// Ed25519 public key, used to verify signed federation traffic
    /// originating from this instance.
    pub ed25519_public_key: [u8; 32],
    pub federation_policy: FederationPolicy,
    pub enabled: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[serde(rename_all = "snake_case")]
pub enum FederationPolicy {
    /// Accepts federation traffic from any instance.
    #[default]
    Open,
    /// Accepts federation traffic only from instances on an allowlist.
    Allowlist,
    /// Federates with nobody; a single-tenant deployment.
    Closed,
}
