//! Ledger Error Types
//!
//! Every ledger mutation runs inside one store transaction; any of these
//! errors aborts that transaction with a full rollback. Retry policy belongs
//! to the caller and must be keyed on task/withdrawal id, never blind.

use thiserror::Error;

use crate::withdrawal::WithdrawalStatus;

/// Ledger error types
///
/// Error codes are stable and intended for API responses by the callers.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    // === Balance errors ===
    #[error("Insufficient available balance: have {available}, need {required}")]
    InsufficientBalance { available: i64, required: i64 },

    #[error("Insufficient frozen balance: have {frozen}, need {required}")]
    InsufficientFrozenBalance { frozen: i64, required: i64 },

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Balance arithmetic overflow")]
    Overflow,

    // === Validation errors ===
    #[error("Commission split {actual} does not equal task amount {expected}")]
    InvalidCommissionSplit { expected: i64, actual: i64 },

    #[error("Creator payout amount not configured or zero")]
    CreatorAmountMissing,

    // === Lookup errors ===
    #[error("Credit account not found")]
    AccountNotFound,

    #[error("Campaign not found: {0}")]
    CampaignNotFound(uuid::Uuid),

    #[error("Task not found: {0}")]
    TaskNotFound(uuid::Uuid),

    #[error("Creator not found: {0}")]
    CreatorNotFound(uuid::Uuid),

    #[error("Withdrawal request not found: {0}")]
    WithdrawalNotFound(uuid::Uuid),

    // === Withdrawal state machine ===
    #[error("Withdrawal in status {found} cannot be {attempted}")]
    InvalidWithdrawalStatus {
        found: WithdrawalStatus,
        attempted: &'static str,
    },

    // === Cash ledger ===
    #[error("Cash account not found: {0}")]
    CashAccountNotFound(String),

    #[error("Cash account balance insufficient: have {available_cents} cents, need {required_cents}")]
    CashAccountInsufficient {
        available_cents: i64,
        required_cents: i64,
    },

    // === System errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal system error: {0}")]
    System(String),
}

impl LedgerError {
    /// Get the stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            LedgerError::InsufficientFrozenBalance { .. } => "INSUFFICIENT_FROZEN_BALANCE",
            LedgerError::InvalidAmount => "INVALID_AMOUNT",
            LedgerError::Overflow => "OVERFLOW",
            LedgerError::InvalidCommissionSplit { .. } => "INVALID_COMMISSION_SPLIT",
            LedgerError::CreatorAmountMissing => "CREATOR_AMOUNT_MISSING",
            LedgerError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            LedgerError::CampaignNotFound(_) => "CAMPAIGN_NOT_FOUND",
            LedgerError::TaskNotFound(_) => "TASK_NOT_FOUND",
            LedgerError::CreatorNotFound(_) => "CREATOR_NOT_FOUND",
            LedgerError::WithdrawalNotFound(_) => "WITHDRAWAL_NOT_FOUND",
            LedgerError::InvalidWithdrawalStatus { .. } => "INVALID_WITHDRAWAL_STATUS",
            LedgerError::CashAccountNotFound(_) => "CASH_ACCOUNT_NOT_FOUND",
            LedgerError::CashAccountInsufficient { .. } => "CASH_ACCOUNT_INSUFFICIENT",
            LedgerError::Database(_) => "DATABASE_ERROR",
            LedgerError::System(_) => "SYSTEM_ERROR",
        }
    }

    /// Get HTTP status code suggestion for callers
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::InvalidAmount
            | LedgerError::InvalidCommissionSplit { .. }
            | LedgerError::CreatorAmountMissing => 400,
            LedgerError::AccountNotFound
            | LedgerError::CampaignNotFound(_)
            | LedgerError::TaskNotFound(_)
            | LedgerError::CreatorNotFound(_)
            | LedgerError::WithdrawalNotFound(_)
            | LedgerError::CashAccountNotFound(_) => 404,
            LedgerError::InsufficientBalance { .. }
            | LedgerError::InsufficientFrozenBalance { .. }
            | LedgerError::InvalidWithdrawalStatus { .. }
            | LedgerError::CashAccountInsufficient { .. } => 422,
            LedgerError::Overflow | LedgerError::Database(_) | LedgerError::System(_) => 500,
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Database(e.to_string())
    }
}

impl From<anyhow::Error> for LedgerError {
    fn from(e: anyhow::Error) -> Self {
        LedgerError::System(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LedgerError::InsufficientBalance {
                available: 1,
                required: 2
            }
            .code(),
            "INSUFFICIENT_BALANCE"
        );
        assert_eq!(
            LedgerError::InvalidCommissionSplit {
                expected: 100,
                actual: 90
            }
            .code(),
            "INVALID_COMMISSION_SPLIT"
        );
        assert_eq!(LedgerError::AccountNotFound.code(), "ACCOUNT_NOT_FOUND");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(
            LedgerError::InvalidCommissionSplit {
                expected: 100,
                actual: 90
            }
            .http_status(),
            400
        );
        assert_eq!(LedgerError::AccountNotFound.http_status(), 404);
        assert_eq!(
            LedgerError::InsufficientFrozenBalance {
                frozen: 0,
                required: 10
            }
            .http_status(),
            422
        );
        assert_eq!(LedgerError::Database("x".into()).http_status(), 500);
    }

    #[test]
    fn test_display() {
        let err = LedgerError::InsufficientBalance {
            available: 50,
            required: 100,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient available balance: have 50, need 100"
        );
    }
}
