//! Cash-side ledger for completed withdrawals
//!
//! Credits are denominated in yuan; cash accounts hold integer cents. The
//! payout debit runs on the caller's open transaction so the credit burn and
//! the cash movement commit or roll back together.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::PgConnection;

use crate::error::LedgerError;

/// Payout channels, each backed by one row in cash_accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CashAccountType {
    WeChat,
    Alipay,
    BankTransfer,
    Marketing,
    Operations,
}

impl CashAccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CashAccountType::WeChat => "WECHAT",
            CashAccountType::Alipay => "ALIPAY",
            CashAccountType::BankTransfer => "BANK_TRANSFER",
            CashAccountType::Marketing => "MARKETING",
            CashAccountType::Operations => "OPERATIONS",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "WECHAT" => Some(CashAccountType::WeChat),
            "ALIPAY" => Some(CashAccountType::Alipay),
            "BANK_TRANSFER" => Some(CashAccountType::BankTransfer),
            "MARKETING" => Some(CashAccountType::Marketing),
            "OPERATIONS" => Some(CashAccountType::Operations),
            _ => None,
        }
    }
}

/// Convert a yuan amount to cash cents, exactly; fractional cents are rejected
pub fn yuan_to_cents(yuan: Decimal) -> Result<i64, LedgerError> {
    let cents = yuan
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(LedgerError::Overflow)?;
    if cents.fract() != Decimal::ZERO {
        return Err(LedgerError::InvalidAmount);
    }
    cents.to_i64().ok_or(LedgerError::Overflow)
}

/// Debit side of a payout. Trait seam so tests can run withdrawals against a
/// stub without provisioning real cash account rows.
#[async_trait]
pub trait CashLedger: Send + Sync {
    async fn debit(
        &self,
        conn: &mut PgConnection,
        account_type: CashAccountType,
        amount_cents: i64,
        reference: &str,
    ) -> Result<(), LedgerError>;
}

/// Cash ledger over the cash_accounts table
pub struct PgCashLedger;

#[async_trait]
impl CashLedger for PgCashLedger {
    async fn debit(
        &self,
        conn: &mut PgConnection,
        account_type: CashAccountType,
        amount_cents: i64,
        reference: &str,
    ) -> Result<(), LedgerError> {
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let balance_cents: i64 = sqlx::query_scalar(
            "SELECT balance_cents FROM cash_accounts WHERE account_type = $1 FOR UPDATE",
        )
        .bind(account_type.as_str())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| LedgerError::CashAccountNotFound(account_type.as_str().to_string()))?;

        if balance_cents < amount_cents {
            return Err(LedgerError::CashAccountInsufficient {
                available_cents: balance_cents,
                required_cents: amount_cents,
            });
        }

        sqlx::query(
            r#"
            UPDATE cash_accounts
            SET balance_cents = balance_cents - $2, updated_at = NOW()
            WHERE account_type = $1
            "#,
        )
        .bind(account_type.as_str())
        .bind(amount_cents)
        .execute(&mut *conn)
        .await?;

        tracing::info!(
            account_type = account_type.as_str(),
            amount_cents,
            reference,
            "Cash account debited"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuan_to_cents() {
        assert_eq!(yuan_to_cents(Decimal::ZERO).unwrap(), 0);
        assert_eq!(yuan_to_cents(Decimal::from(500)).unwrap(), 50_000);
        assert_eq!(yuan_to_cents(Decimal::new(1250, 2)).unwrap(), 1_250);
        // Sub-cent precision is a data error, not something to round away
        assert!(yuan_to_cents(Decimal::new(12345, 3)).is_err());
        assert!(yuan_to_cents(Decimal::from(i64::MAX)).is_err());
    }

    #[test]
    fn test_account_type_roundtrip() {
        for t in [
            CashAccountType::WeChat,
            CashAccountType::Alipay,
            CashAccountType::BankTransfer,
            CashAccountType::Marketing,
            CashAccountType::Operations,
        ] {
            assert_eq!(CashAccountType::from_str_opt(t.as_str()), Some(t));
        }
        assert_eq!(CashAccountType::from_str_opt("PAYPAL"), None);
    }
}
