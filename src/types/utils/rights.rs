// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use bitflags::bitflags;

bitflags! {
    /// Instance-wide, per-user rights, separate from the per-guild
    /// permission bitfield that [`crate::permissions::resolve`] computes.
    ///
    /// An [`InstanceRights::OPERATOR`] account bypasses every per-guild
    /// permission check, the same way `Administrator` bypasses channel
    /// overrides within a single guild.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
    pub struct InstanceRights: u64 {
        /// All rights, and exempt from per-guild permission checks.
        const OPERATOR = 1 << 0;
        /// Can suspend, ban or delete any user instance-wide.
        const MANAGE_USERS = 1 << 1;
        /// Can delete or transfer ownership of any guild on the instance.
        const MANAGE_GUILDS = 1 << 2;
        /// Exempt from the sliding-window REST rate limiter.
        const BYPASS_RATE_LIMITS = 1 << 3;
    }
}

impl InstanceRights {
    /// Returns whether this set has `right`, or is an operator.
    pub fn has(&self, right: InstanceRights) -> bool {
        self.contains(InstanceRights::OPERATOR) || self.contains(right)
    }

    /// Same as [`InstanceRights::has`], returning an error suitable for
    /// surfacing as [`crate::errors::AmityError::Forbidden`] on failure.
    pub fn has_throw(&self, right: InstanceRights) -> Result<(), &'static str> {
        if self.has(right) {
            Ok(())
        } else {
            Err("missing required instance right")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::InstanceRights;

    #[test]
    fn operator_has_everything() {
        let rights = InstanceRights::OPERATOR;
        assert!(rights.has(InstanceRights::MANAGE_USERS));
        assert!(rights.has(InstanceRights::MANAGE_GUILDS));
        assert!(rights.has(InstanceRights::BYPASS_RATE_LIMITS));
    }

    #[test]
    fn non_operator_only_has_granted_rights() {
        let rights = InstanceRights::MANAGE_USERS;
        assert!(rights.has(InstanceRights::MANAGE_USERS));
        assert!(!rights.has(InstanceRights::MANAGE_GUILDS));
        assert!(rights.has_throw(InstanceRights::MANAGE_GUILDS).is_err());
    }

    #[test]
    fn default_has_no_rights() {
        assert_eq!(InstanceRights::default(), InstanceRights::empty());
    }
}
