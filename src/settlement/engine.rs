//! Settlement engine
//!
//! Each operation runs in exactly one store transaction: account rows are
//! locked FOR UPDATE, re-validated inside the transaction, mutated through
//! the enforced `Balance` type, and every change lands as one ledger entry.
//! Nothing is awaited outside the store while a transaction is open.

use std::sync::Arc;

use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::account::{Account, AccountService};
use crate::campaign::{Campaign, Task, TaskStatus};
use crate::error::LedgerError;
use crate::ledger::{self, NewEntry};
use crate::types::{GroupId, InviterKind, OwnerType, TxKind};

use super::plan::SettlementPlan;

/// One credited leg of a finished settlement
#[derive(Debug, Clone)]
pub struct SettledLeg {
    pub kind: TxKind,
    pub account_id: Uuid,
    pub amount: i64,
}

/// What a task settlement actually did
#[derive(Debug, Clone)]
pub struct SettlementReceipt {
    pub group_id: GroupId,
    pub discharged: i64,
    pub legs: Vec<SettledLeg>,
    /// Referral leg was planned but its account could not be resolved
    pub staff_leg_skipped: bool,
}

/// Outcome of `settle_task`
#[derive(Debug, Clone)]
pub enum SettleTaskResult {
    /// The task's discharge entry already exists; nothing was done
    AlreadySettled,
    Settled(SettlementReceipt),
}

pub struct SettlementEngine {
    pool: PgPool,
    accounts: Arc<AccountService>,
}

impl SettlementEngine {
    pub fn new(pool: PgPool, accounts: Arc<AccountService>) -> Self {
        Self { pool, accounts }
    }

    /// Escrow the campaign total on the merchant account when a campaign
    /// transitions to OPEN.
    ///
    /// Validates the commission split first; then moves
    /// `campaign_amount = task_amount * quota` from the merchant's available
    /// pool into its frozen pool and appends one CAMPAIGN_FREEZE entry.
    pub async fn freeze_for_campaign(&self, campaign: &Campaign) -> Result<Account, LedgerError> {
        campaign.split()?;

        let escrow = campaign
            .task_amount
            .checked_mul(campaign.quota)
            .ok_or(LedgerError::Overflow)?;
        if escrow != campaign.campaign_amount {
            return Err(LedgerError::System(format!(
                "campaign {} escrow mismatch: task_amount * quota = {escrow}, campaign_amount = {}",
                campaign.id, campaign.campaign_amount
            )));
        }

        let mut tx = self.pool.begin().await?;

        let account = AccountService::load_for_update(
            &mut tx,
            campaign.merchant_id,
            OwnerType::OrgMerchant,
        )
        .await?;

        let before = account.balance;
        let mut after = before;
        after.freeze(escrow)?;

        AccountService::save_balance(&mut tx, account.id, after).await?;
        ledger::append_entry(
            &mut tx,
            &NewEntry::from_mutation(
                account.id,
                TxKind::CampaignFreeze,
                before,
                after,
                format!("Campaign published, credits escrowed: {}", campaign.title),
            )
            .for_campaign(campaign.id),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            campaign_id = %campaign.id,
            merchant_id = %campaign.merchant_id,
            escrow,
            "Campaign escrow frozen"
        );

        let mut account = account;
        account.balance = after;
        Ok(account)
    }

    /// Distribute one approved task's payout across up to four parties.
    ///
    /// All legs share one transaction group id and commit atomically. Legs 1
    /// (merchant discharge) and 2 (creator) are required; legs 3 (staff
    /// referral) and 4 (provider) are conditional and an unresolvable referral
    /// account skips that leg with a warning instead of rolling back.
    ///
    /// Idempotent on task id: an existing TASK_PUBLISH entry short-circuits.
    pub async fn settle_task(
        &self,
        task_id: Uuid,
        auditor_id: Uuid,
    ) -> Result<SettleTaskResult, LedgerError> {
        let mut tx = self.pool.begin().await?;

        if ledger::task_already_settled(&mut tx, task_id).await? {
            tracing::info!(task_id = %task_id, "Task already settled, skipping");
            return Ok(SettleTaskResult::AlreadySettled);
        }

        let task = Task::load(&mut tx, task_id).await?;
        if task.status != TaskStatus::Approved {
            return Err(LedgerError::System(format!(
                "task {task_id} is {} and not eligible for settlement",
                task.status.as_str()
            )));
        }
        let campaign = Campaign::load(&mut tx, task.campaign_id).await?;
        let plan = SettlementPlan::build(&campaign, &task)?;

        let mut legs = Vec::with_capacity(4);
        let mut seq = 1;

        // Leg 1: discharge one task's escrow from the merchant's frozen pool
        let merchant = AccountService::load_for_update(
            &mut tx,
            campaign.merchant_id,
            OwnerType::OrgMerchant,
        )
        .await?;

        // Recheck under the merchant lock: a concurrent settlement of this
        // task may have committed while we waited for the row.
        if ledger::task_already_settled(&mut tx, task_id).await? {
            tracing::info!(task_id = %task_id, "Task settled by a concurrent caller, skipping");
            return Ok(SettleTaskResult::AlreadySettled);
        }

        let before = merchant.balance;
        let mut after = before;
        after.spend_frozen(plan.discharge)?;
        AccountService::save_balance(&mut tx, merchant.id, after).await?;
        ledger::append_entry(
            &mut tx,
            &NewEntry::from_mutation(
                merchant.id,
                TxKind::TaskPublish,
                before,
                after,
                format!("Task settlement: {}", campaign.title),
            )
            .in_group(plan.group_id, seq)
            .for_campaign(campaign.id)
            .for_task(task.id),
        )
        .await?;
        legs.push(SettledLeg {
            kind: TxKind::TaskPublish,
            account_id: merchant.id,
            amount: -plan.discharge,
        });
        seq += 1;

        // Leg 2: creator payout into their personal account
        let creator_id = task
            .creator_id
            .ok_or_else(|| LedgerError::System(format!("task {task_id} has no creator")))?;
        let creator_user = resolve_creator_user(&mut tx, creator_id).await?;
        let creator_account = self
            .accounts
            .find_or_create(&mut tx, creator_user, OwnerType::UserPersonal, None)
            .await?;
        self.credit_leg(
            &mut tx,
            &creator_account,
            TxKind::TaskIncome,
            plan.creator,
            format!("Task income: {}", campaign.title),
            &plan,
            seq,
            &campaign,
            &task,
        )
        .await?;
        legs.push(SettledLeg {
            kind: TxKind::TaskIncome,
            account_id: creator_account.id,
            amount: plan.creator,
        });
        seq += 1;

        // Leg 3: staff referral, skipped (not failed) when unresolvable
        let mut staff_leg_skipped = false;
        if let Some(amount) = plan.staff_referral {
            let inviter_id = task
                .inviter_id
                .ok_or_else(|| LedgerError::System("referral leg planned without inviter".into()))?;
            match self
                .resolve_inviter_account(&mut tx, inviter_id, task.inviter_role.as_deref())
                .await?
            {
                Some(inviter_account) => {
                    self.credit_leg(
                        &mut tx,
                        &inviter_account,
                        TxKind::StaffReferral,
                        amount,
                        format!("Staff referral: {}", campaign.title),
                        &plan,
                        seq,
                        &campaign,
                        &task,
                    )
                    .await?;
                    legs.push(SettledLeg {
                        kind: TxKind::StaffReferral,
                        account_id: inviter_account.id,
                        amount,
                    });
                    seq += 1;
                }
                None => {
                    staff_leg_skipped = true;
                    tracing::warn!(
                        task_id = %task.id,
                        inviter_id = %inviter_id,
                        amount,
                        "Referral leg skipped: no account resolvable for inviter"
                    );
                }
            }
        }

        // Leg 4: provider commission
        if let Some(amount) = plan.provider {
            let provider_id = campaign.provider_id.ok_or_else(|| {
                LedgerError::System("provider leg planned without provider org".into())
            })?;
            let provider_account = self
                .accounts
                .find_or_create(&mut tx, provider_id, OwnerType::OrgProvider, None)
                .await?;
            self.credit_leg(
                &mut tx,
                &provider_account,
                TxKind::ProviderIncome,
                amount,
                format!("Provider commission: {}", campaign.title),
                &plan,
                seq,
                &campaign,
                &task,
            )
            .await?;
            legs.push(SettledLeg {
                kind: TxKind::ProviderIncome,
                account_id: provider_account.id,
                amount,
            });
        }

        tx.commit().await?;

        tracing::info!(
            task_id = %task.id,
            campaign_id = %campaign.id,
            group_id = %plan.group_id,
            auditor_id = %auditor_id,
            discharged = plan.discharge,
            credited = plan.credited_total(),
            staff_leg_skipped,
            "Task settled"
        );

        Ok(SettleTaskResult::Settled(SettlementReceipt {
            group_id: plan.group_id,
            discharged: plan.discharge,
            legs,
            staff_leg_skipped,
        }))
    }

    /// Return the escrow of unfilled task slots to the merchant when a
    /// campaign transitions OPEN -> CLOSED.
    ///
    /// The uncompleted count is recomputed from current task statuses inside
    /// the transaction; an existing CAMPAIGN_REFUND entry makes a repeated
    /// close a no-op.
    pub async fn settle_campaign_close(
        &self,
        campaign_id: Uuid,
    ) -> Result<Option<Account>, LedgerError> {
        let mut tx = self.pool.begin().await?;

        if ledger::campaign_already_refunded(&mut tx, campaign_id).await? {
            tracing::info!(campaign_id = %campaign_id, "Campaign close already settled, skipping");
            return Ok(None);
        }

        let campaign = Campaign::load(&mut tx, campaign_id).await?;
        let account = AccountService::load_for_update(
            &mut tx,
            campaign.merchant_id,
            OwnerType::OrgMerchant,
        )
        .await?;

        // Recheck under the merchant lock, and only count approved tasks
        // once the lock serializes us against in-flight task settlements.
        if ledger::campaign_already_refunded(&mut tx, campaign_id).await? {
            tracing::info!(campaign_id = %campaign_id, "Campaign refunded by a concurrent caller, skipping");
            return Ok(None);
        }

        let approved = Campaign::count_approved_tasks(&mut tx, campaign.id).await?;
        let uncompleted = campaign.quota - approved;
        if uncompleted <= 0 {
            return Ok(None);
        }

        let refund = uncompleted
            .checked_mul(campaign.task_amount)
            .ok_or(LedgerError::Overflow)?;

        let before = account.balance;
        let mut after = before;
        after.unfreeze(refund)?;

        AccountService::save_balance(&mut tx, account.id, after).await?;
        ledger::append_entry(
            &mut tx,
            &NewEntry::from_mutation(
                account.id,
                TxKind::CampaignRefund,
                before,
                after,
                format!(
                    "Campaign closed, unused escrow refunded: {} ({} of {} slots unfilled)",
                    campaign.title, uncompleted, campaign.quota
                ),
            )
            .for_campaign(campaign.id),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            campaign_id = %campaign.id,
            merchant_id = %campaign.merchant_id,
            refund,
            uncompleted,
            "Campaign close settled"
        );

        let mut account = account;
        account.balance = after;
        Ok(Some(account))
    }

    #[allow(clippy::too_many_arguments)]
    async fn credit_leg(
        &self,
        conn: &mut PgConnection,
        account: &Account,
        kind: TxKind,
        amount: i64,
        description: String,
        plan: &SettlementPlan,
        seq: i32,
        campaign: &Campaign,
        task: &Task,
    ) -> Result<(), LedgerError> {
        let before = account.balance;
        let mut after = before;
        after.deposit(amount)?;
        AccountService::save_balance(conn, account.id, after).await?;
        ledger::append_entry(
            conn,
            &NewEntry::from_mutation(account.id, kind, before, after, description)
                .in_group(plan.group_id, seq)
                .for_campaign(campaign.id)
                .for_task(task.id),
        )
        .await?;
        Ok(())
    }

    /// Route the referral leg to the account its inviter role points at:
    /// provider staff credit the provider org, merchant staff the merchant
    /// org, anyone else their personal account. Missing staff records make
    /// the leg unresolvable (None), never an error.
    async fn resolve_inviter_account(
        &self,
        conn: &mut PgConnection,
        inviter_id: Uuid,
        inviter_role: Option<&str>,
    ) -> Result<Option<Account>, LedgerError> {
        let kind = InviterKind::from_role(inviter_role.unwrap_or(""));

        if kind.credits_provider_org() {
            let provider_id: Option<Uuid> =
                sqlx::query("SELECT provider_id FROM provider_staff WHERE user_id = $1")
                    .bind(inviter_id)
                    .fetch_optional(&mut *conn)
                    .await?
                    .map(|row| row.get("provider_id"));
            return match provider_id {
                Some(provider_id) => Ok(Some(
                    self.accounts
                        .find_or_create(conn, provider_id, OwnerType::OrgProvider, None)
                        .await?,
                )),
                None => Ok(None),
            };
        }

        if kind.credits_merchant_org() {
            let merchant_id: Option<Uuid> =
                sqlx::query("SELECT merchant_id FROM merchant_staff WHERE user_id = $1")
                    .bind(inviter_id)
                    .fetch_optional(&mut *conn)
                    .await?
                    .map(|row| row.get("merchant_id"));
            return match merchant_id {
                Some(merchant_id) => Ok(Some(
                    self.accounts
                        .find_or_create(conn, merchant_id, OwnerType::OrgMerchant, None)
                        .await?,
                )),
                None => Ok(None),
            };
        }

        Ok(Some(
            self.accounts
                .find_or_create(conn, inviter_id, OwnerType::UserPersonal, None)
                .await?,
        ))
    }
}

async fn resolve_creator_user(
    conn: &mut PgConnection,
    creator_id: Uuid,
) -> Result<Uuid, LedgerError> {
    let user_id: Option<Uuid> = sqlx::query("SELECT user_id FROM creators WHERE id = $1")
        .bind(creator_id)
        .fetch_optional(conn)
        .await?
        .map(|row| row.get("user_id"));

    user_id.ok_or(LedgerError::CreatorNotFound(creator_id))
}
