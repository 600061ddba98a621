//! Account creation grant policy
//!
//! Which permissions the requesting user receives when an account is created
//! on their first access. An explicit policy object replaces the global
//! role-state reads the service would otherwise hard-code.

use crate::types::OwnerType;

use super::models::{ActorRole, PermissionSet};

/// Policy deciding the one-time grant at account creation
pub trait GrantPolicy: Send + Sync {
    /// Permissions for `actor` on a freshly created account of `owner_type`;
    /// `None` means no grant row is written.
    fn grants(&self, owner_type: OwnerType, actor: ActorRole) -> Option<PermissionSet>;
}

/// Default policy: full rights on personal accounts and on org accounts
/// created by an admin, view-only for org staff.
pub struct DefaultGrantPolicy;

impl GrantPolicy for DefaultGrantPolicy {
    fn grants(&self, owner_type: OwnerType, actor: ActorRole) -> Option<PermissionSet> {
        match owner_type {
            OwnerType::UserPersonal => Some(PermissionSet::FULL),
            OwnerType::OrgMerchant | OwnerType::OrgProvider => match actor {
                ActorRole::PlatformAdmin | ActorRole::OrgAdmin => Some(PermissionSet::FULL),
                ActorRole::OrgStaff => Some(PermissionSet::VIEW_ONLY),
                ActorRole::Individual => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personal_accounts_get_full_rights() {
        let policy = DefaultGrantPolicy;
        for actor in [
            ActorRole::PlatformAdmin,
            ActorRole::OrgAdmin,
            ActorRole::OrgStaff,
            ActorRole::Individual,
        ] {
            assert_eq!(
                policy.grants(OwnerType::UserPersonal, actor),
                Some(PermissionSet::FULL)
            );
        }
    }

    #[test]
    fn test_org_accounts_scale_with_actor_role() {
        let policy = DefaultGrantPolicy;
        for owner in [OwnerType::OrgMerchant, OwnerType::OrgProvider] {
            assert_eq!(
                policy.grants(owner, ActorRole::OrgAdmin),
                Some(PermissionSet::FULL)
            );
            assert_eq!(
                policy.grants(owner, ActorRole::OrgStaff),
                Some(PermissionSet::VIEW_ONLY)
            );
            assert_eq!(policy.grants(owner, ActorRole::Individual), None);
        }
    }
}
