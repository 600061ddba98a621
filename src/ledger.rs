//! Append-only credit transaction log
//!
//! Every balance change is recorded as one entry inside the same store
//! transaction that performs it. Entries are never updated or deleted.
//!
//! Logging convention: each entry snapshots BOTH pools before/after, and
//! `amount` is the signed delta of the pool its kind targets, so per-account
//! replay reconstructs both the available and frozen balance exactly.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::balance::Balance;
use crate::error::LedgerError;
use crate::types::{GroupId, Pool, TxKind};

/// One persisted ledger entry
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub kind: TxKind,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub frozen_before: i64,
    pub frozen_after: i64,
    pub group_id: Option<GroupId>,
    pub group_sequence: Option<i32>,
    pub related_campaign_id: Option<Uuid>,
    pub related_task_id: Option<Uuid>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Entry under construction, derived from a balance mutation
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub account_id: Uuid,
    pub kind: TxKind,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub frozen_before: i64,
    pub frozen_after: i64,
    pub group_id: Option<GroupId>,
    pub group_sequence: Option<i32>,
    pub related_campaign_id: Option<Uuid>,
    pub related_task_id: Option<Uuid>,
    pub description: String,
}

impl NewEntry {
    /// Build an entry from the account snapshots taken before and after a
    /// mutation. `amount` is derived from the target pool, which makes the
    /// `after = before + amount` chain hold by construction.
    pub fn from_mutation(
        account_id: Uuid,
        kind: TxKind,
        before: Balance,
        after: Balance,
        description: String,
    ) -> Self {
        let amount = match kind.pool() {
            Pool::Available => after.available() - before.available(),
            Pool::Frozen => after.frozen() - before.frozen(),
        };
        Self {
            account_id,
            kind,
            amount,
            balance_before: before.available(),
            balance_after: after.available(),
            frozen_before: before.frozen(),
            frozen_after: after.frozen(),
            group_id: None,
            group_sequence: None,
            related_campaign_id: None,
            related_task_id: None,
            description,
        }
    }

    pub fn in_group(mut self, group_id: GroupId, sequence: i32) -> Self {
        self.group_id = Some(group_id);
        self.group_sequence = Some(sequence);
        self
    }

    pub fn for_campaign(mut self, campaign_id: Uuid) -> Self {
        self.related_campaign_id = Some(campaign_id);
        self
    }

    pub fn for_task(mut self, task_id: Uuid) -> Self {
        self.related_task_id = Some(task_id);
        self
    }
}

/// Append one entry within the caller's open transaction
pub async fn append_entry(conn: &mut PgConnection, entry: &NewEntry) -> Result<Uuid, LedgerError> {
    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO credit_transactions
            (id, account_id, type, amount, balance_before, balance_after,
             frozen_before, frozen_after, transaction_group_id, group_sequence,
             related_campaign_id, related_task_id, description, created_at)
        VALUES
            (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
        RETURNING id
        "#,
    )
    .bind(entry.account_id)
    .bind(entry.kind.as_str())
    .bind(entry.amount)
    .bind(entry.balance_before)
    .bind(entry.balance_after)
    .bind(entry.frozen_before)
    .bind(entry.frozen_after)
    .bind(entry.group_id.map(|g| g.to_string()))
    .bind(entry.group_sequence)
    .bind(entry.related_campaign_id)
    .bind(entry.related_task_id)
    .bind(&entry.description)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Check whether a task already has its escrow-discharge entry
///
/// Idempotency guard for task settlement: a TASK_PUBLISH entry exists exactly
/// when the settlement transaction for that task committed.
pub async fn task_already_settled(
    conn: &mut PgConnection,
    task_id: Uuid,
) -> Result<bool, LedgerError> {
    let exists: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM credit_transactions WHERE related_task_id = $1 AND type = $2 LIMIT 1",
    )
    .bind(task_id)
    .bind(TxKind::TaskPublish.as_str())
    .fetch_optional(conn)
    .await?;

    Ok(exists.is_some())
}

/// Check whether a campaign's close refund has already been booked
pub async fn campaign_already_refunded(
    conn: &mut PgConnection,
    campaign_id: Uuid,
) -> Result<bool, LedgerError> {
    let exists: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM credit_transactions WHERE related_campaign_id = $1 AND type = $2 LIMIT 1",
    )
    .bind(campaign_id)
    .bind(TxKind::CampaignRefund.as_str())
    .fetch_optional(conn)
    .await?;

    Ok(exists.is_some())
}

/// List an account's entries, newest first
pub async fn list_entries(
    pool: &sqlx::PgPool,
    account_id: Uuid,
    page: i64,
    page_size: i64,
) -> Result<Vec<LedgerEntry>, LedgerError> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, 200);

    let rows = sqlx::query(
        r#"
        SELECT id, account_id, type, amount, balance_before, balance_after,
               frozen_before, frozen_after, transaction_group_id, group_sequence,
               related_campaign_id, related_task_id, description, created_at
        FROM credit_transactions
        WHERE account_id = $1
        ORDER BY seq DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(account_id)
    .bind(page_size)
    .bind((page - 1) * page_size)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_entry).collect()
}

/// Replay all entries of an account and reconstruct its balances, verifying
/// that every entry chains onto the previous one.
///
/// Ordered by the insert sequence, not `created_at`: timestamps carry the
/// transaction start time, which under concurrency can disagree with the
/// order in which the account lock was taken.
pub async fn replay_account(
    pool: &sqlx::PgPool,
    account_id: Uuid,
) -> Result<Balance, LedgerError> {
    let rows = sqlx::query(
        r#"
        SELECT id, account_id, type, amount, balance_before, balance_after,
               frozen_before, frozen_after, transaction_group_id, group_sequence,
               related_campaign_id, related_task_id, description, created_at
        FROM credit_transactions
        WHERE account_id = $1
        ORDER BY seq ASC
        "#,
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    let mut balance = Balance::default();
    for row in &rows {
        let entry = row_to_entry(row)?;
        verify_chain(&balance, &entry)?;
        balance = Balance::from_parts(entry.balance_after, entry.frozen_after)?;
    }
    Ok(balance)
}

/// Check one entry against the running balance of a replay
pub fn verify_chain(running: &Balance, entry: &LedgerEntry) -> Result<(), LedgerError> {
    let ok = entry.balance_before == running.available()
        && entry.frozen_before == running.frozen()
        && match entry.kind.pool() {
            Pool::Available => {
                entry.balance_after == entry.balance_before + entry.amount
                    && entry.frozen_after >= 0
            }
            Pool::Frozen => {
                entry.frozen_after == entry.frozen_before + entry.amount
                    && entry.balance_after >= 0
            }
        };
    if !ok {
        return Err(LedgerError::System(format!(
            "ledger chain broken at entry {} ({}): before=({}, {}) expected=({}, {})",
            entry.id,
            entry.kind,
            entry.balance_before,
            entry.frozen_before,
            running.available(),
            running.frozen()
        )));
    }
    Ok(())
}

fn row_to_entry(row: &sqlx::postgres::PgRow) -> Result<LedgerEntry, LedgerError> {
    let kind_str: String = row.get("type");
    let kind = TxKind::from_str_opt(&kind_str)
        .ok_or_else(|| LedgerError::System(format!("unknown transaction type: {kind_str}")))?;

    let group_id = match row.get::<Option<String>, _>("transaction_group_id") {
        Some(s) => Some(
            s.parse::<GroupId>()
                .map_err(|_| LedgerError::System(format!("invalid transaction group id: {s}")))?,
        ),
        None => None,
    };

    Ok(LedgerEntry {
        id: row.get("id"),
        account_id: row.get("account_id"),
        kind,
        amount: row.get("amount"),
        balance_before: row.get("balance_before"),
        balance_after: row.get("balance_after"),
        frozen_before: row.get("frozen_before"),
        frozen_after: row.get("frozen_after"),
        group_id,
        group_sequence: row.get("group_sequence"),
        related_campaign_id: row.get("related_campaign_id"),
        related_task_id: row.get("related_task_id"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_for(kind: TxKind, before: Balance, after: Balance) -> LedgerEntry {
        let new = NewEntry::from_mutation(Uuid::new_v4(), kind, before, after, String::new());
        LedgerEntry {
            id: Uuid::new_v4(),
            account_id: new.account_id,
            kind: new.kind,
            amount: new.amount,
            balance_before: new.balance_before,
            balance_after: new.balance_after,
            frozen_before: new.frozen_before,
            frozen_after: new.frozen_after,
            group_id: None,
            group_sequence: None,
            related_campaign_id: None,
            related_task_id: None,
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_amount_derived_from_target_pool() {
        let mut before = Balance::default();
        before.deposit(1000).unwrap();
        let mut after = before;
        after.freeze(400).unwrap();

        // Freeze targets the available pool: amount is the available delta
        let entry = NewEntry::from_mutation(
            Uuid::new_v4(),
            TxKind::CampaignFreeze,
            before,
            after,
            "freeze".into(),
        );
        assert_eq!(entry.amount, -400);
        assert_eq!(entry.balance_before, 1000);
        assert_eq!(entry.balance_after, 600);
        assert_eq!(entry.frozen_before, 0);
        assert_eq!(entry.frozen_after, 400);

        // Discharge targets the frozen pool
        let mut discharged = after;
        discharged.spend_frozen(100).unwrap();
        let entry =
            NewEntry::from_mutation(Uuid::new_v4(), TxKind::TaskPublish, after, discharged, String::new());
        assert_eq!(entry.amount, -100);
        assert_eq!(entry.frozen_before, 400);
        assert_eq!(entry.frozen_after, 300);
        assert_eq!(entry.balance_after, 600);
    }

    #[test]
    fn test_verify_chain_accepts_consistent_sequence() {
        let zero = Balance::default();
        let mut recharged = zero;
        recharged.deposit(10_000).unwrap();
        let mut frozen = recharged;
        frozen.freeze(1_000).unwrap();

        let e1 = entry_for(TxKind::Recharge, zero, recharged);
        let e2 = entry_for(TxKind::CampaignFreeze, recharged, frozen);

        let mut running = Balance::default();
        verify_chain(&running, &e1).unwrap();
        running = Balance::from_parts(e1.balance_after, e1.frozen_after).unwrap();
        verify_chain(&running, &e2).unwrap();
        running = Balance::from_parts(e2.balance_after, e2.frozen_after).unwrap();

        assert_eq!(running.available(), 9_000);
        assert_eq!(running.frozen(), 1_000);
    }

    #[test]
    fn test_verify_chain_rejects_gap() {
        let zero = Balance::default();
        let mut recharged = zero;
        recharged.deposit(100).unwrap();
        let e = entry_for(TxKind::Recharge, recharged, {
            let mut b = recharged;
            b.deposit(50).unwrap();
            b
        });

        // Running balance is still zero: the entry's before does not chain
        assert!(verify_chain(&Balance::default(), &e).is_err());
    }

    #[test]
    fn test_builder_attaches_group_and_refs() {
        let group = GroupId::new();
        let campaign = Uuid::new_v4();
        let task = Uuid::new_v4();
        let mut after = Balance::default();
        after.deposit(70).unwrap();

        let entry = NewEntry::from_mutation(
            Uuid::new_v4(),
            TxKind::TaskIncome,
            Balance::default(),
            after,
            "task income".into(),
        )
        .in_group(group, 2)
        .for_campaign(campaign)
        .for_task(task);

        assert_eq!(entry.group_id, Some(group));
        assert_eq!(entry.group_sequence, Some(2));
        assert_eq!(entry.related_campaign_id, Some(campaign));
        assert_eq!(entry.related_task_id, Some(task));
        assert_eq!(entry.amount, 70);
    }
}
