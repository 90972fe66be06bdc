// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Permission resolution (C1): a pure function computing the effective
//! permission bitfield for a member in a guild, optionally narrowed to a
//! single channel.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::types::{ChannelOverride, GuildMember, OverrideTarget, Role};
use crate::types::utils::Ulid;

bitflags! {
    /// The 64-bit effective permission bitfield computed by [`resolve`].
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct PermissionFlags: u64 {
        // server-scoped, bits 0-19
        const MANAGE_CHANNELS = 1 << 0;
        const MANAGE_GUILD = 1 << 1;
        const MANAGE_PERMISSIONS = 1 << 2;
        const MANAGE_ROLES = 1 << 3;
        const MANAGE_EMOJI = 1 << 4;
        const MANAGE_WEBHOOKS = 1 << 5;
        const KICK_MEMBERS = 1 << 6;
        const BAN_MEMBERS = 1 << 7;
        const TIMEOUT_MEMBERS = 1 << 8;
        const ASSIGN_ROLES = 1 << 9;
        const CHANGE_NICKNAME = 1 << 10;
        const MANAGE_NICKNAMES = 1 << 11;
        const CHANGE_AVATAR = 1 << 12;
        const REMOVE_AVATARS = 1 << 13;
        const VIEW_AUDIT_LOG = 1 << 14;
        const VIEW_GUILD_INSIGHTS = 1 << 15;
        const MENTION_EVERYONE = 1 << 16;

        // channel-scoped, bits 20-39
        const VIEW_CHANNEL = 1 << 20;
        const READ_HISTORY = 1 << 21;
        const SEND_MESSAGES = 1 << 22;
        const MANAGE_MESSAGES = 1 << 23;
        const EMBED_LINKS = 1 << 24;
        const UPLOAD_FILES = 1 << 25;
        const ADD_REACTIONS = 1 << 26;
        const USE_EXTERNAL_EMOJI = 1 << 27;
        const CONNECT = 1 << 28;
        const SPEAK = 1 << 29;
        const MUTE_MEMBERS = 1 << 30;
        const DEAFEN_MEMBERS = 1 << 31;
        const MOVE_MEMBERS = 1 << 32;
        const USE_VAD = 1 << 33;
        const PRIORITY_SPEAKER = 1 << 34;
        const STREAM = 1 << 35;
        const MASQUERADE = 1 << 36;
        const CREATE_INVITES = 1 << 37;
        const MANAGE_THREADS = 1 << 38;
        const CREATE_THREADS = 1 << 39;

        /// Bypasses every other check; granted to the guild owner and to
        /// any role set combining to this bit.
        const ADMINISTRATOR = 1 << 63;
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PermissionFlags {
    fn type_info() -> <sqlx::Postgres as sqlx::Database>::TypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

#[cfg(feature = "postgres")]
impl<'q> sqlx::Encode<'q, sqlx::Postgres> for PermissionFlags {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Postgres as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&(self.bits() as i64), buf)
    }
}

#[cfg(feature = "postgres")]
impl<'d> sqlx::Decode<'d, sqlx::Postgres> for PermissionFlags {
    fn decode(
        value: <sqlx::Postgres as sqlx::Database>::ValueRef<'d>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let bits = <i64 as sqlx::Decode<'d, sqlx::Postgres>>::decode(value)?;
        Ok(PermissionFlags::from_bits_truncate(bits as u64))
    }
}

/// All permissions set; returned for the guild owner and for any member
/// whose resolved permissions include [`PermissionFlags::ADMINISTRATOR`].
pub const ALL: PermissionFlags = PermissionFlags::all();

/// Permissions cleared while a member is timed out.
/// `VIEW_CHANNEL` is deliberately excluded: a timed-out member can still
/// read, just not act.
const TIMEOUT_ACTION_MASK: PermissionFlags = PermissionFlags::SEND_MESSAGES
    .union(PermissionFlags::ADD_REACTIONS)
    .union(PermissionFlags::CONNECT)
    .union(PermissionFlags::SPEAK)
    .union(PermissionFlags::STREAM)
    .union(PermissionFlags::CREATE_THREADS)
    .union(PermissionFlags::CREATE_INVITES);

/// The subset of guild-level state [`resolve`] needs; callers pass a
/// projection of [`crate::types::Guild`] rather than the whole entity so
/// tests can construct fixtures cheaply.
pub struct GuildContext {
    pub owner_id: Ulid,
    pub default_permissions: PermissionFlags,
}

/// Resolves the effective permission bitfield for `member` in `guild`,
/// optionally narrowed to `channel`.
///
/// `sorted_roles` must already be sorted by descending `position` (the
/// caller's responsibility, per spec: this function does not re-sort).
/// Total function: every input produces a bitfield, 0 meaning "no access".
pub fn resolve(
    member: &GuildMember,
    guild: &GuildContext,
    sorted_roles: &[Role],
    channel: Option<(&[ChannelOverride], Option<&Role>)>,
) -> PermissionFlags {
    if member.user_id == guild.owner_id {
        return ALL;
    }

    let mut perms = guild.default_permissions;

    for role in sorted_roles {
        perms = (perms | role.allow) & !role.deny;
    }

    if perms.contains(PermissionFlags::ADMINISTRATOR) {
        return ALL;
    }

    let Some((overrides, everyone_role)) = channel else {
        return perms;
    };

    if let Some(everyone) = everyone_role {
        perms = (perms | everyone.allow) & !everyone.deny;
    }

    let member_role_ids: std::collections::HashSet<Ulid> =
        member.role_ids.iter().copied().collect();

    for ov in overrides
        .iter()
        .filter(|o| matches!(o.target, OverrideTarget::Role(id) if member_role_ids.contains(&id)))
    {
        perms = (perms | ov.allow) & !ov.deny;
    }

    for ov in overrides
        .iter()
        .filter(|o| matches!(o.target, OverrideTarget::User(id) if id == member.user_id))
    {
        perms = (perms | ov.allow) & !ov.deny;
    }

    if let Some(timeout_until) = member.timeout_until {
        if timeout_until > chrono::Utc::now() {
            perms &= !TIMEOUT_ACTION_MASK;
        }
    }

    if !perms.contains(PermissionFlags::VIEW_CHANNEL) {
        return PermissionFlags::empty();
    }

    perms
}
