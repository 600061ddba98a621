//! Withdrawal pipeline: request, review, payout
//!
//! Credits leave the ledger in three distinct steps. Creating a request
//! freezes the amount; approval is a pure review decision that moves no
//! funds; processing spends the frozen credits and debits a real cash
//! account in the same transaction.

pub mod cash;
pub mod service;
pub mod state;

pub use cash::{CashAccountType, CashLedger, PgCashLedger, yuan_to_cents};
pub use service::{WithdrawalRequest, WithdrawalService};
pub use state::WithdrawalStatus;
