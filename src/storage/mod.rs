// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The SQL storage boundary. Every contract this module fills
//! (`WebhookStore`, `MlsStore`, `KeyBackupStore`) is a trait owned by its
//! domain module; this module only supplies the `postgres`-feature-gated
//! implementation.

#[cfg(feature = "postgres")]
pub mod postgres;
