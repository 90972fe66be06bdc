// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The data model: entities, the on-the-wire event envelope, and small
//! shared utility types (ULID, instance rights).

pub use entities::*;
pub use event::*;
pub use utils::InstanceRights;

pub mod entities;
mod event;
pub mod utils;
