//! Core ledger types
//!
//! Owner/entry enums are stored in PostgreSQL as short strings or SMALLINT;
//! every enum carries explicit conversions so that no ad hoc string
//! comparison leaks into the services.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Transaction group ID - ULID-based unique identifier
///
/// Links the legs of one atomic settlement event. ULID keeps the ids
/// monotonic and sortable without any coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(ulid::Ulid);

impl GroupId {
    /// Generate a new unique GroupId
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Get the inner ULID value
    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GroupId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// Account owner class
///
/// Stored as VARCHAR in `credit_accounts.owner_type`; part of the unique
/// `(owner_id, owner_type)` account key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnerType {
    /// Merchant organization
    OrgMerchant,
    /// Service-provider organization
    OrgProvider,
    /// Individual user
    UserPersonal,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerType::OrgMerchant => "ORG_MERCHANT",
            OwnerType::OrgProvider => "ORG_PROVIDER",
            OwnerType::UserPersonal => "USER_PERSONAL",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "ORG_MERCHANT" => Some(OwnerType::OrgMerchant),
            "ORG_PROVIDER" => Some(OwnerType::OrgProvider),
            "USER_PERSONAL" => Some(OwnerType::UserPersonal),
            _ => None,
        }
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which balance pool a ledger entry mutates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pool {
    Available,
    Frozen,
}

/// Ledger entry type
///
/// Closed set; each kind targets exactly one balance pool so the per-pool
/// `balance_after = balance_before + amount` chain stays reconstructable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    /// Merchant top-up (available +)
    Recharge,
    /// Campaign published: escrow taken from the merchant (available -)
    CampaignFreeze,
    /// Campaign closed: unused escrow returned (available +)
    CampaignRefund,
    /// Per-task escrow discharge on settlement (frozen -)
    TaskPublish,
    /// Creator payout leg (available +)
    TaskIncome,
    /// Staff referral commission leg (available +)
    StaffReferral,
    /// Provider commission leg (available +)
    ProviderIncome,
    /// Withdrawal requested: credits moved into escrow (available -)
    WithdrawFreeze,
    /// Withdrawal paid out: escrow consumed for cash (frozen -)
    Withdraw,
    /// Withdrawal rejected: escrow returned (available +)
    WithdrawRefund,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Recharge => "RECHARGE",
            TxKind::CampaignFreeze => "CAMPAIGN_FREEZE",
            TxKind::CampaignRefund => "CAMPAIGN_REFUND",
            TxKind::TaskPublish => "TASK_PUBLISH",
            TxKind::TaskIncome => "TASK_INCOME",
            TxKind::StaffReferral => "STAFF_REFERRAL",
            TxKind::ProviderIncome => "PROVIDER_INCOME",
            TxKind::WithdrawFreeze => "WITHDRAW_FREEZE",
            TxKind::Withdraw => "WITHDRAW",
            TxKind::WithdrawRefund => "WITHDRAW_REFUND",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "RECHARGE" => Some(TxKind::Recharge),
            "CAMPAIGN_FREEZE" => Some(TxKind::CampaignFreeze),
            "CAMPAIGN_REFUND" => Some(TxKind::CampaignRefund),
            "TASK_PUBLISH" => Some(TxKind::TaskPublish),
            "TASK_INCOME" => Some(TxKind::TaskIncome),
            "STAFF_REFERRAL" => Some(TxKind::StaffReferral),
            "PROVIDER_INCOME" => Some(TxKind::ProviderIncome),
            "WITHDRAW_FREEZE" => Some(TxKind::WithdrawFreeze),
            "WITHDRAW" => Some(TxKind::Withdraw),
            "WITHDRAW_REFUND" => Some(TxKind::WithdrawRefund),
            _ => None,
        }
    }

    /// The balance pool whose delta this entry's `amount` records
    pub fn pool(&self) -> Pool {
        match self {
            TxKind::Recharge
            | TxKind::CampaignFreeze
            | TxKind::CampaignRefund
            | TxKind::TaskIncome
            | TxKind::StaffReferral
            | TxKind::ProviderIncome
            | TxKind::WithdrawFreeze
            | TxKind::WithdrawRefund => Pool::Available,
            TxKind::TaskPublish | TxKind::Withdraw => Pool::Frozen,
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role of the user that invited a creator to a task
///
/// Determines which account receives the STAFF_REFERRAL leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviterKind {
    ProviderStaff,
    ProviderAdmin,
    MerchantStaff,
    MerchantAdmin,
    Other,
}

impl InviterKind {
    pub fn from_role(role: &str) -> Self {
        match role {
            "SERVICE_PROVIDER_STAFF" => InviterKind::ProviderStaff,
            "SERVICE_PROVIDER_ADMIN" => InviterKind::ProviderAdmin,
            "MERCHANT_STAFF" => InviterKind::MerchantStaff,
            "MERCHANT_ADMIN" => InviterKind::MerchantAdmin,
            _ => InviterKind::Other,
        }
    }

    /// Does the referral commission go to the provider org account?
    pub fn credits_provider_org(&self) -> bool {
        matches!(self, InviterKind::ProviderStaff | InviterKind::ProviderAdmin)
    }

    /// Does the referral commission go to the merchant org account?
    pub fn credits_merchant_org(&self) -> bool {
        matches!(self, InviterKind::MerchantStaff | InviterKind::MerchantAdmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_type_roundtrip() {
        for ot in [
            OwnerType::OrgMerchant,
            OwnerType::OrgProvider,
            OwnerType::UserPersonal,
        ] {
            assert_eq!(OwnerType::from_str_opt(ot.as_str()), Some(ot));
        }
        assert_eq!(OwnerType::from_str_opt("ORG_UNKNOWN"), None);
    }

    #[test]
    fn test_tx_kind_roundtrip() {
        let kinds = [
            TxKind::Recharge,
            TxKind::CampaignFreeze,
            TxKind::CampaignRefund,
            TxKind::TaskPublish,
            TxKind::TaskIncome,
            TxKind::StaffReferral,
            TxKind::ProviderIncome,
            TxKind::WithdrawFreeze,
            TxKind::Withdraw,
            TxKind::WithdrawRefund,
        ];
        for kind in kinds {
            assert_eq!(TxKind::from_str_opt(kind.as_str()), Some(kind));
        }
        assert_eq!(TxKind::from_str_opt("BONUS"), None);
    }

    #[test]
    fn test_tx_kind_pools() {
        assert_eq!(TxKind::CampaignFreeze.pool(), Pool::Available);
        assert_eq!(TxKind::TaskPublish.pool(), Pool::Frozen);
        assert_eq!(TxKind::Withdraw.pool(), Pool::Frozen);
        assert_eq!(TxKind::WithdrawFreeze.pool(), Pool::Available);
        assert_eq!(TxKind::CampaignRefund.pool(), Pool::Available);
    }

    #[test]
    fn test_inviter_kind_routing() {
        assert!(InviterKind::from_role("SERVICE_PROVIDER_STAFF").credits_provider_org());
        assert!(InviterKind::from_role("SERVICE_PROVIDER_ADMIN").credits_provider_org());
        assert!(InviterKind::from_role("MERCHANT_STAFF").credits_merchant_org());
        assert!(InviterKind::from_role("MERCHANT_ADMIN").credits_merchant_org());
        let other = InviterKind::from_role("CREATOR");
        assert!(!other.credits_provider_org());
        assert!(!other.credits_merchant_org());
    }

    #[test]
    fn test_group_id_display_parse() {
        let id = GroupId::new();
        let parsed: GroupId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
