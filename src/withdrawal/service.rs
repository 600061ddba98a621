use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::account::AccountService;
use crate::audit::{AuditEntry, AuditLog};
use crate::error::LedgerError;
use crate::ledger::{self, NewEntry};
use crate::types::{OwnerType, TxKind};

use super::cash::{self, CashAccountType, CashLedger};
use super::state::WithdrawalStatus;

/// One withdrawal request row
#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Credits to withdraw
    pub amount: i64,
    /// Cash value requested, in yuan
    pub yuan_amount: Decimal,
    pub status: WithdrawalStatus,
    pub cash_account_type: Option<CashAccountType>,
    pub reviewer_id: Option<Uuid>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

pub struct WithdrawalService {
    pool: PgPool,
    cash: Arc<dyn CashLedger>,
    audit: Arc<AuditLog>,
}

impl WithdrawalService {
    pub fn new(pool: PgPool, cash: Arc<dyn CashLedger>, audit: Arc<AuditLog>) -> Self {
        Self { pool, cash, audit }
    }

    /// Create a request: freeze the amount on the owner's account and record
    /// a PENDING row. No cash moves yet.
    pub async fn create(
        &self,
        owner_id: Uuid,
        owner_type: OwnerType,
        amount: i64,
        yuan_amount: Decimal,
    ) -> Result<WithdrawalRequest, LedgerError> {
        if amount <= 0 || yuan_amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        // The payout must be representable in whole cents up front
        cash::yuan_to_cents(yuan_amount)?;

        let mut tx = self.pool.begin().await?;

        let account = AccountService::load_for_update(&mut tx, owner_id, owner_type).await?;
        let before = account.balance;
        let mut after = before;
        after.freeze(amount)?;

        AccountService::save_balance(&mut tx, account.id, after).await?;
        ledger::append_entry(
            &mut tx,
            &NewEntry::from_mutation(
                account.id,
                TxKind::WithdrawFreeze,
                before,
                after,
                format!("Withdrawal requested: {amount}"),
            ),
        )
        .await?;

        let request = Self::insert_request(&mut tx, account.id, amount, yuan_amount).await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            account_id = %account.id,
            amount,
            "Withdrawal request created"
        );
        self.audit
            .record(AuditEntry {
                action: "WITHDRAWAL_CREATE",
                subject_type: "withdrawal_request",
                actor_id: Some(owner_id),
                subject_id: request.id,
                changes: json!({ "amount": amount, "account_id": account.id }),
            })
            .await;

        Ok(request)
    }

    /// Approve a PENDING request. A pure review decision: the reviewer and
    /// payout channel are recorded, no funds move until processing.
    pub async fn approve(
        &self,
        request_id: Uuid,
        reviewer_id: Uuid,
        cash_account_type: CashAccountType,
    ) -> Result<WithdrawalRequest, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let request = Self::load_for_update(&mut tx, request_id).await?;
        Self::check_transition(&request, WithdrawalStatus::Approved, "approve")?;

        sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET status = $2, reviewer_id = $3, cash_account_type = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(request_id)
        .bind(WithdrawalStatus::Approved.id())
        .bind(reviewer_id)
        .bind(cash_account_type.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request_id,
            reviewer_id = %reviewer_id,
            cash_account_type = cash_account_type.as_str(),
            "Withdrawal request approved"
        );
        self.audit
            .record(AuditEntry {
                action: "WITHDRAWAL_APPROVE",
                subject_type: "withdrawal_request",
                actor_id: Some(reviewer_id),
                subject_id: request_id,
                changes: json!({
                    "from": WithdrawalStatus::Pending.as_str(),
                    "to": WithdrawalStatus::Approved.as_str(),
                    "cash_account_type": cash_account_type.as_str(),
                }),
            })
            .await;

        let mut request = request;
        request.status = WithdrawalStatus::Approved;
        request.reviewer_id = Some(reviewer_id);
        request.cash_account_type = Some(cash_account_type);
        Ok(request)
    }

    /// Reject a PENDING request and thaw the frozen amount back to available.
    pub async fn reject(
        &self,
        request_id: Uuid,
        reviewer_id: Uuid,
        reason: &str,
    ) -> Result<WithdrawalRequest, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let request = Self::load_for_update(&mut tx, request_id).await?;
        Self::check_transition(&request, WithdrawalStatus::Rejected, "reject")?;

        let account = AccountService::load_for_update_by_id(&mut tx, request.account_id).await?;
        let before = account.balance;
        let mut after = before;
        after.unfreeze(request.amount)?;

        AccountService::save_balance(&mut tx, account.id, after).await?;
        ledger::append_entry(
            &mut tx,
            &NewEntry::from_mutation(
                account.id,
                TxKind::WithdrawRefund,
                before,
                after,
                format!("Withdrawal rejected: {reason}"),
            ),
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET status = $2, reviewer_id = $3, review_note = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(request_id)
        .bind(WithdrawalStatus::Rejected.id())
        .bind(reviewer_id)
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request_id,
            reviewer_id = %reviewer_id,
            amount = request.amount,
            "Withdrawal request rejected, credits thawed"
        );
        self.audit
            .record(AuditEntry {
                action: "WITHDRAWAL_REJECT",
                subject_type: "withdrawal_request",
                actor_id: Some(reviewer_id),
                subject_id: request_id,
                changes: json!({
                    "from": WithdrawalStatus::Pending.as_str(),
                    "to": WithdrawalStatus::Rejected.as_str(),
                    "reason": reason,
                    "refunded": request.amount,
                }),
            })
            .await;

        let mut request = request;
        request.status = WithdrawalStatus::Rejected;
        request.reviewer_id = Some(reviewer_id);
        request.review_note = Some(reason.to_string());
        Ok(request)
    }

    /// Execute an APPROVED payout: burn the frozen credits and debit the
    /// chosen cash account in the same transaction.
    pub async fn process(
        &self,
        request_id: Uuid,
        operator_id: Uuid,
    ) -> Result<WithdrawalRequest, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let request = Self::load_for_update(&mut tx, request_id).await?;
        Self::check_transition(&request, WithdrawalStatus::Completed, "process")?;
        let cash_account_type = request.cash_account_type.ok_or_else(|| {
            LedgerError::System(format!("approved request {request_id} has no payout channel"))
        })?;

        let account = AccountService::load_for_update_by_id(&mut tx, request.account_id).await?;
        let before = account.balance;
        let mut after = before;
        after.spend_frozen(request.amount)?;

        AccountService::save_balance(&mut tx, account.id, after).await?;
        ledger::append_entry(
            &mut tx,
            &NewEntry::from_mutation(
                account.id,
                TxKind::Withdraw,
                before,
                after,
                format!("Withdrawal paid out via {}", cash_account_type.as_str()),
            ),
        )
        .await?;

        let cents = cash::yuan_to_cents(request.yuan_amount)?;
        self.cash
            .debit(&mut tx, cash_account_type, cents, &request_id.to_string())
            .await?;

        sqlx::query(
            r#"
            UPDATE withdrawal_requests
            SET status = $2, processed_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(request_id)
        .bind(WithdrawalStatus::Completed.id())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request_id,
            operator_id = %operator_id,
            amount = request.amount,
            cents,
            cash_account_type = cash_account_type.as_str(),
            "Withdrawal completed"
        );
        self.audit
            .record(AuditEntry {
                action: "WITHDRAWAL_PROCESS",
                subject_type: "withdrawal_request",
                actor_id: Some(operator_id),
                subject_id: request_id,
                changes: json!({
                    "from": WithdrawalStatus::Approved.as_str(),
                    "to": WithdrawalStatus::Completed.as_str(),
                    "amount": request.amount,
                    "cents": cents,
                }),
            })
            .await;

        let mut request = request;
        request.status = WithdrawalStatus::Completed;
        Ok(request)
    }

    pub async fn get(&self, request_id: Uuid) -> Result<WithdrawalRequest, LedgerError> {
        let row = sqlx::query(SELECT_REQUEST)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LedgerError::WithdrawalNotFound(request_id))?;
        row_to_request(&row)
    }

    fn check_transition(
        request: &WithdrawalRequest,
        next: WithdrawalStatus,
        attempted: &'static str,
    ) -> Result<(), LedgerError> {
        if !request.status.can_transition_to(next) {
            return Err(LedgerError::InvalidWithdrawalStatus {
                found: request.status,
                attempted,
            });
        }
        Ok(())
    }

    async fn load_for_update(
        conn: &mut PgConnection,
        request_id: Uuid,
    ) -> Result<WithdrawalRequest, LedgerError> {
        let row = sqlx::query(&format!("{SELECT_REQUEST} FOR UPDATE"))
            .bind(request_id)
            .fetch_optional(conn)
            .await?
            .ok_or(LedgerError::WithdrawalNotFound(request_id))?;
        row_to_request(&row)
    }

    async fn insert_request(
        conn: &mut PgConnection,
        account_id: Uuid,
        amount: i64,
        yuan_amount: Decimal,
    ) -> Result<WithdrawalRequest, LedgerError> {
        let row = sqlx::query(
            r#"
            INSERT INTO withdrawal_requests
                (id, account_id, amount, yuan_amount, status, created_at, updated_at)
            VALUES (gen_random_uuid(), $1, $2, $3, $4, NOW(), NOW())
            RETURNING id, account_id, amount, yuan_amount, status, cash_account_type, reviewer_id,
                      review_note, created_at, updated_at, processed_at
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .bind(yuan_amount)
        .bind(WithdrawalStatus::Pending.id())
        .fetch_one(conn)
        .await?;
        row_to_request(&row)
    }
}

const SELECT_REQUEST: &str = r#"
    SELECT id, account_id, amount, yuan_amount, status, cash_account_type, reviewer_id,
           review_note, created_at, updated_at, processed_at
    FROM withdrawal_requests
    WHERE id = $1
"#;

fn row_to_request(row: &sqlx::postgres::PgRow) -> Result<WithdrawalRequest, LedgerError> {
    let status_id: i16 = row.get("status");
    let status = WithdrawalStatus::from_id(status_id)
        .ok_or_else(|| LedgerError::System(format!("unknown withdrawal status id: {status_id}")))?;

    let cash_account_type = match row.get::<Option<String>, _>("cash_account_type") {
        Some(s) => Some(
            CashAccountType::from_str_opt(&s)
                .ok_or_else(|| LedgerError::System(format!("unknown cash account type: {s}")))?,
        ),
        None => None,
    };

    Ok(WithdrawalRequest {
        id: row.get("id"),
        account_id: row.get("account_id"),
        amount: row.get("amount"),
        yuan_amount: row.get("yuan_amount"),
        status,
        cash_account_type,
        reviewer_id: row.get("reviewer_id"),
        review_note: row.get("review_note"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        processed_at: row.get("processed_at"),
    })
}
