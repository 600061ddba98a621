//! Settlement plan
//!
//! Pure computation of the payout legs for one approved task. No store access:
//! the engine builds the plan first, checks conservation, and only then starts
//! mutating rows.

use crate::campaign::{Campaign, Task};
use crate::error::LedgerError;
use crate::types::GroupId;

/// The legs of one task settlement, before any row is touched
///
/// Leg order is fixed: 1 merchant discharge, 2 creator, 3 staff referral,
/// 4 provider. Legs 3 and 4 are conditional and may be absent.
#[derive(Debug, Clone)]
pub struct SettlementPlan {
    pub group_id: GroupId,
    /// Escrow consumed from the merchant's frozen pool: one task's worth
    /// (`task_amount`), never the whole campaign escrow.
    pub discharge: i64,
    /// Leg 2: creator payout, always present and positive
    pub creator: i64,
    /// Leg 3: staff referral, present when configured and the task has an inviter
    pub staff_referral: Option<i64>,
    /// Leg 4: provider commission, present when configured and the campaign has a provider
    pub provider: Option<i64>,
}

impl SettlementPlan {
    pub fn build(campaign: &Campaign, task: &Task) -> Result<Self, LedgerError> {
        let creator = match campaign.creator_amount {
            Some(amount) if amount > 0 => amount,
            _ => return Err(LedgerError::CreatorAmountMissing),
        };

        let staff_referral = match campaign.staff_referral_amount {
            Some(amount) if amount > 0 && task.inviter_id.is_some() => Some(amount),
            _ => None,
        };

        let provider = match campaign.provider_amount {
            Some(amount) if amount > 0 && campaign.provider_id.is_some() => Some(amount),
            _ => None,
        };

        let plan = Self {
            group_id: GroupId::new(),
            discharge: campaign.task_amount,
            creator,
            staff_referral,
            provider,
        };
        plan.check_conservation()?;
        Ok(plan)
    }

    /// Total credited across legs 2-4
    pub fn credited_total(&self) -> i64 {
        self.creator + self.staff_referral.unwrap_or(0) + self.provider.unwrap_or(0)
    }

    /// No leg may create value: credits must fit inside the discharge
    fn check_conservation(&self) -> Result<(), LedgerError> {
        if self.credited_total() > self.discharge {
            return Err(LedgerError::InvalidCommissionSplit {
                expected: self.discharge,
                actual: self.credited_total(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::TaskStatus;
    use uuid::Uuid;

    fn campaign_with(
        creator: Option<i64>,
        staff: Option<i64>,
        provider_amount: Option<i64>,
        provider_id: Option<Uuid>,
    ) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            provider_id,
            title: "launch week".into(),
            task_amount: 100,
            campaign_amount: 1000,
            quota: 10,
            creator_amount: creator,
            staff_referral_amount: staff,
            provider_amount,
        }
    }

    fn task_with_inviter(campaign: &Campaign, inviter: Option<Uuid>) -> Task {
        Task {
            id: Uuid::new_v4(),
            campaign_id: campaign.id,
            creator_id: Some(Uuid::new_v4()),
            inviter_id: inviter,
            inviter_role: inviter.map(|_| "MERCHANT_STAFF".to_string()),
            status: TaskStatus::Approved,
        }
    }

    #[test]
    fn test_full_plan() {
        let provider = Uuid::new_v4();
        let campaign = campaign_with(Some(70), Some(10), Some(20), Some(provider));
        let task = task_with_inviter(&campaign, Some(Uuid::new_v4()));

        let plan = SettlementPlan::build(&campaign, &task).unwrap();
        assert_eq!(plan.discharge, 100);
        assert_eq!(plan.creator, 70);
        assert_eq!(plan.staff_referral, Some(10));
        assert_eq!(plan.provider, Some(20));
        assert_eq!(plan.credited_total(), 100);
    }

    #[test]
    fn test_requires_creator_amount() {
        let campaign = campaign_with(None, Some(10), Some(20), Some(Uuid::new_v4()));
        let task = task_with_inviter(&campaign, None);
        assert!(matches!(
            SettlementPlan::build(&campaign, &task),
            Err(LedgerError::CreatorAmountMissing)
        ));

        let zeroed = campaign_with(Some(0), None, None, None);
        assert!(matches!(
            SettlementPlan::build(&zeroed, &task),
            Err(LedgerError::CreatorAmountMissing)
        ));
    }

    #[test]
    fn test_staff_leg_needs_inviter() {
        let campaign = campaign_with(Some(70), Some(10), None, None);
        let uninvited = task_with_inviter(&campaign, None);
        let plan = SettlementPlan::build(&campaign, &uninvited).unwrap();
        assert_eq!(plan.staff_referral, None);
        // Credits below discharge are tolerated: the rest of the escrow
        // for this task is simply destroyed, never minted elsewhere.
        assert_eq!(plan.credited_total(), 70);
    }

    #[test]
    fn test_provider_leg_needs_provider_org() {
        let campaign = campaign_with(Some(70), None, Some(20), None);
        let task = task_with_inviter(&campaign, None);
        let plan = SettlementPlan::build(&campaign, &task).unwrap();
        assert_eq!(plan.provider, None);
    }

    #[test]
    fn test_conservation_rejects_overcommit() {
        let mut campaign = campaign_with(Some(90), Some(10), Some(20), Some(Uuid::new_v4()));
        campaign.task_amount = 100;
        let task = task_with_inviter(&campaign, Some(Uuid::new_v4()));
        let err = SettlementPlan::build(&campaign, &task).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidCommissionSplit {
                expected: 100,
                actual: 120
            }
        ));
    }
}
