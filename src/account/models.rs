//! Account domain models

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::balance::Balance;
use crate::types::OwnerType;

/// One owner's credit position
///
/// Keyed by the unique `(owner_id, owner_type)` pair; created lazily on first
/// access and never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_type: OwnerType,
    pub balance: Balance,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role of the user on whose behalf an account is being created
///
/// Input to the grant policy; resolved by the caller from its auth context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    /// Platform administrator
    PlatformAdmin,
    /// Admin of the owning organization
    OrgAdmin,
    /// Staff member of the owning organization
    OrgStaff,
    /// Individual user (creator)
    Individual,
}

/// View/operate rights granted on an account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionSet {
    pub can_view: bool,
    pub can_operate: bool,
}

impl PermissionSet {
    pub const FULL: PermissionSet = PermissionSet {
        can_view: true,
        can_operate: true,
    };

    pub const VIEW_ONLY: PermissionSet = PermissionSet {
        can_view: true,
        can_operate: false,
    };
}
