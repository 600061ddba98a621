//! Enforced balance type
//!
//! The single arithmetic authority for credit accounts. Services read an
//! account row (locked FOR UPDATE), run the mutation through this type, and
//! write both pools back in the same transaction.
//!
//! # Invariants (enforced by private fields):
//! - `available >= 0` and `frozen >= 0` at all times
//! - No overflow/underflow (checked arithmetic)
//! - All state changes return Result; a failed mutation leaves the value
//!   untouched

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Credit position of one account: available plus frozen (escrowed) credits.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Balance {
    available: i64,
    frozen: i64,
}

impl Balance {
    /// Rehydrate from persisted pools. Rejects negative values, which would
    /// mean the store constraint was bypassed.
    pub fn from_parts(available: i64, frozen: i64) -> Result<Self, LedgerError> {
        if available < 0 || frozen < 0 {
            return Err(LedgerError::System(format!(
                "negative balance loaded from store: available={available} frozen={frozen}"
            )));
        }
        Ok(Self { available, frozen })
    }

    /// Get available balance (read-only)
    #[inline(always)]
    pub const fn available(&self) -> i64 {
        self.available
    }

    /// Get frozen balance (read-only)
    #[inline(always)]
    pub const fn frozen(&self) -> i64 {
        self.frozen
    }

    /// Get total position (available + frozen)
    pub fn total(&self) -> Result<i64, LedgerError> {
        self.available
            .checked_add(self.frozen)
            .ok_or(LedgerError::Overflow)
    }

    fn check_amount(amount: i64) -> Result<(), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        Ok(())
    }

    /// Credit the available pool (recharge, payout legs, refunds)
    pub fn deposit(&mut self, amount: i64) -> Result<(), LedgerError> {
        Self::check_amount(amount)?;
        self.available = self
            .available
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Move credits from available to frozen (campaign/withdrawal escrow)
    pub fn freeze(&mut self, amount: i64) -> Result<(), LedgerError> {
        Self::check_amount(amount)?;
        if self.available < amount {
            return Err(LedgerError::InsufficientBalance {
                available: self.available,
                required: amount,
            });
        }
        self.available -= amount;
        self.frozen = self
            .frozen
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Move credits from frozen back to available (campaign close refund,
    /// withdrawal rejection)
    pub fn unfreeze(&mut self, amount: i64) -> Result<(), LedgerError> {
        Self::check_amount(amount)?;
        if self.frozen < amount {
            return Err(LedgerError::InsufficientFrozenBalance {
                frozen: self.frozen,
                required: amount,
            });
        }
        self.frozen -= amount;
        self.available = self
            .available
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Consume frozen credits without returning them to available
    /// (per-task escrow discharge, completed withdrawal)
    pub fn spend_frozen(&mut self, amount: i64) -> Result<(), LedgerError> {
        Self::check_amount(amount)?;
        if self.frozen < amount {
            return Err(LedgerError::InsufficientFrozenBalance {
                frozen: self.frozen,
                required: amount,
            });
        }
        self.frozen -= amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit() {
        let mut bal = Balance::default();
        bal.deposit(100).unwrap();
        assert_eq!(bal.available(), 100);
        bal.deposit(50).unwrap();
        assert_eq!(bal.available(), 150);
        assert_eq!(bal.frozen(), 0);
    }

    #[test]
    fn test_deposit_rejects_non_positive() {
        let mut bal = Balance::default();
        assert!(matches!(bal.deposit(0), Err(LedgerError::InvalidAmount)));
        assert!(matches!(bal.deposit(-5), Err(LedgerError::InvalidAmount)));
    }

    #[test]
    fn test_deposit_overflow() {
        let mut bal = Balance::from_parts(i64::MAX, 0).unwrap();
        assert!(matches!(bal.deposit(1), Err(LedgerError::Overflow)));
        assert_eq!(bal.available(), i64::MAX);
    }

    #[test]
    fn test_freeze_unfreeze() {
        let mut bal = Balance::default();
        bal.deposit(100).unwrap();

        bal.freeze(60).unwrap();
        assert_eq!(bal.available(), 40);
        assert_eq!(bal.frozen(), 60);

        bal.unfreeze(20).unwrap();
        assert_eq!(bal.available(), 60);
        assert_eq!(bal.frozen(), 40);
    }

    #[test]
    fn test_freeze_insufficient() {
        let mut bal = Balance::default();
        bal.deposit(50).unwrap();

        let err = bal.freeze(100).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance {
                available: 50,
                required: 100
            }
        ));
        // Unchanged
        assert_eq!(bal.available(), 50);
        assert_eq!(bal.frozen(), 0);
    }

    #[test]
    fn test_spend_frozen() {
        let mut bal = Balance::default();
        bal.deposit(100).unwrap();
        bal.freeze(60).unwrap();

        bal.spend_frozen(30).unwrap();
        assert_eq!(bal.frozen(), 30);
        assert_eq!(bal.available(), 40); // Unchanged

        let err = bal.spend_frozen(31).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFrozenBalance {
                frozen: 30,
                required: 31
            }
        ));
    }

    #[test]
    fn test_total() {
        let mut bal = Balance::default();
        bal.deposit(100).unwrap();
        bal.freeze(60).unwrap();
        assert_eq!(bal.total().unwrap(), 100); // Freeze conserves total

        bal.spend_frozen(20).unwrap();
        assert_eq!(bal.total().unwrap(), 80); // Discharge destroys escrow
    }

    #[test]
    fn test_from_parts_rejects_negative() {
        assert!(Balance::from_parts(-1, 0).is_err());
        assert!(Balance::from_parts(0, -1).is_err());
        assert!(Balance::from_parts(0, 0).is_ok());
    }
}
