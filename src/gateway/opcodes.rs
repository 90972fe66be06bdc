// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Gateway opcode constants for a server that accepts connections
//! rather than one that dials out to a remote gateway.

pub const OP_DISPATCH: u8 = 0;
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_IDENTIFY: u8 = 2;
pub const OP_PRESENCE_UPDATE: u8 = 3;
pub const OP_VOICE_STATE_UPDATE: u8 = 4;
pub const OP_RESUME: u8 = 5;
pub const OP_RECONNECT: u8 = 6;
pub const OP_REQUEST_MEMBERS: u8 = 7;
pub const OP_TYPING: u8 = 8;
pub const OP_SUBSCRIBE: u8 = 9;
pub const OP_HELLO: u8 = 10;
pub const OP_HEARTBEAT_ACK: u8 = 11;
