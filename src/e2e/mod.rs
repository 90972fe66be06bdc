// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! End-to-end encryption surfaces (C7): passphrase-derived channel keys
//! (client-side only), MLS delivery-service storage contracts, and key
//! backup/recovery. A password-breach check rides along here since it
//! shares the same "security primitive the server treats as opaque"
//! shape, even though it isn't MLS.

pub mod backup;
pub mod breach_check;
pub mod channel_key;
pub mod mls;
