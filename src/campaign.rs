//! Campaign and task references
//!
//! Campaigns and tasks are owned by the campaign/task modules upstream; the
//! ledger only reads the money-relevant columns and the status that gates
//! settlement eligibility.

use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::error::LedgerError;

/// Three-way commission split of one task's payout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    pub creator: i64,
    pub staff_referral: i64,
    pub provider: i64,
}

impl CommissionSplit {
    pub fn total(&self) -> i64 {
        self.creator + self.staff_referral + self.provider
    }

    /// The split must cover the task amount exactly, no more, no less.
    pub fn validate(&self, task_amount: i64) -> Result<(), LedgerError> {
        if self.creator < 0 || self.staff_referral < 0 || self.provider < 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if self.total() != task_amount {
            return Err(LedgerError::InvalidCommissionSplit {
                expected: task_amount,
                actual: self.total(),
            });
        }
        Ok(())
    }
}

/// Task status values that matter to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Open,
    Accepted,
    Submitted,
    Approved,
    Rejected,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "OPEN",
            TaskStatus::Accepted => "ACCEPTED",
            TaskStatus::Submitted => "SUBMITTED",
            TaskStatus::Approved => "APPROVED",
            TaskStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(TaskStatus::Open),
            "ACCEPTED" => Some(TaskStatus::Accepted),
            "SUBMITTED" => Some(TaskStatus::Submitted),
            "APPROVED" => Some(TaskStatus::Approved),
            "REJECTED" => Some(TaskStatus::Rejected),
            _ => None,
        }
    }
}

/// Money-relevant view of a campaign
#[derive(Debug, Clone)]
pub struct Campaign {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub title: String,
    /// Per-task payout
    pub task_amount: i64,
    /// Total escrow: task_amount * quota
    pub campaign_amount: i64,
    pub quota: i64,
    pub creator_amount: Option<i64>,
    pub staff_referral_amount: Option<i64>,
    pub provider_amount: Option<i64>,
}

impl Campaign {
    /// The split, required complete at freeze time
    pub fn split(&self) -> Result<CommissionSplit, LedgerError> {
        match (
            self.creator_amount,
            self.staff_referral_amount,
            self.provider_amount,
        ) {
            (Some(creator), Some(staff_referral), Some(provider)) => {
                let split = CommissionSplit {
                    creator,
                    staff_referral,
                    provider,
                };
                split.validate(self.task_amount)?;
                Ok(split)
            }
            _ => Err(LedgerError::InvalidCommissionSplit {
                expected: self.task_amount,
                actual: self.creator_amount.unwrap_or(0)
                    + self.staff_referral_amount.unwrap_or(0)
                    + self.provider_amount.unwrap_or(0),
            }),
        }
    }

    pub async fn load(conn: &mut PgConnection, id: Uuid) -> Result<Self, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT id, merchant_id, provider_id, title, task_amount, campaign_amount,
                   quota, creator_amount, staff_referral_amount, provider_amount
            FROM campaigns
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(LedgerError::CampaignNotFound(id))?;

        Ok(Campaign {
            id: row.get("id"),
            merchant_id: row.get("merchant_id"),
            provider_id: row.get("provider_id"),
            title: row.get("title"),
            task_amount: row.get("task_amount"),
            campaign_amount: row.get("campaign_amount"),
            quota: row.get("quota"),
            creator_amount: row.get("creator_amount"),
            staff_referral_amount: row.get("staff_referral_amount"),
            provider_amount: row.get("provider_amount"),
        })
    }

    /// Count APPROVED tasks inside the caller's transaction
    ///
    /// Recomputed from current task statuses on every close so that a repeated
    /// close sees the already-refunded state, never a cached count.
    pub async fn count_approved_tasks(
        conn: &mut PgConnection,
        campaign_id: Uuid,
    ) -> Result<i64, LedgerError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tasks WHERE campaign_id = $1 AND status = $2",
        )
        .bind(campaign_id)
        .bind(TaskStatus::Approved.as_str())
        .fetch_one(conn)
        .await?;
        Ok(count)
    }
}

/// Money-relevant view of one funded task slot
#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub creator_id: Option<Uuid>,
    pub inviter_id: Option<Uuid>,
    pub inviter_role: Option<String>,
    pub status: TaskStatus,
}

impl Task {
    pub async fn load(conn: &mut PgConnection, id: Uuid) -> Result<Self, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT id, campaign_id, creator_id, inviter_id, inviter_role, status
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(LedgerError::TaskNotFound(id))?;

        let status_str: String = row.get("status");
        let status = TaskStatus::from_str_opt(&status_str)
            .ok_or_else(|| LedgerError::System(format!("unknown task status: {status_str}")))?;

        Ok(Task {
            id: row.get("id"),
            campaign_id: row.get("campaign_id"),
            creator_id: row.get("creator_id"),
            inviter_id: row.get("inviter_id"),
            inviter_role: row.get("inviter_role"),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign(creator: Option<i64>, staff: Option<i64>, provider: Option<i64>) -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            provider_id: None,
            title: "spring push".into(),
            task_amount: 100,
            campaign_amount: 1000,
            quota: 10,
            creator_amount: creator,
            staff_referral_amount: staff,
            provider_amount: provider,
        }
    }

    #[test]
    fn test_split_must_sum_to_task_amount() {
        let split = CommissionSplit {
            creator: 70,
            staff_referral: 10,
            provider: 20,
        };
        assert!(split.validate(100).is_ok());

        let short = CommissionSplit {
            creator: 70,
            staff_referral: 10,
            provider: 10,
        };
        let err = short.validate(100).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidCommissionSplit {
                expected: 100,
                actual: 90
            }
        ));

        let over = CommissionSplit {
            creator: 70,
            staff_referral: 40,
            provider: 20,
        };
        assert!(over.validate(100).is_err());
    }

    #[test]
    fn test_split_rejects_negative_components() {
        let split = CommissionSplit {
            creator: 120,
            staff_referral: -20,
            provider: 0,
        };
        assert!(matches!(
            split.validate(100),
            Err(LedgerError::InvalidAmount)
        ));
    }

    #[test]
    fn test_campaign_split_requires_all_three() {
        assert!(campaign(Some(70), Some(10), Some(20)).split().is_ok());
        assert!(campaign(Some(70), None, Some(30)).split().is_err());
        assert!(campaign(None, None, None).split().is_err());
    }

    #[test]
    fn test_task_status_roundtrip() {
        for s in [
            TaskStatus::Open,
            TaskStatus::Accepted,
            TaskStatus::Submitted,
            TaskStatus::Approved,
            TaskStatus::Rejected,
        ] {
            assert_eq!(TaskStatus::from_str_opt(s.as_str()), Some(s));
        }
        assert_eq!(TaskStatus::from_str_opt("EXPIRED"), None);
    }
}
