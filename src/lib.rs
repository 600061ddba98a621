//! Credit ledger and settlement engine for the campaign platform.
//!
//! Merchants fund campaigns with credits, creators earn them by completing
//! tasks, and staff and service providers take commissions. Every balance
//! change flows through the enforced [`balance::Balance`] type and lands as
//! one append-only entry in the credit transaction log.

pub mod account;
pub mod audit;
pub mod balance;
pub mod campaign;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod schema;
pub mod settlement;
pub mod types;
pub mod withdrawal;

pub use account::{Account, AccountService, ActorRole, DefaultGrantPolicy, GrantPolicy};
pub use balance::Balance;
pub use config::AppConfig;
pub use db::Database;
pub use error::LedgerError;
pub use ledger::{LedgerEntry, NewEntry};
pub use settlement::{SettleTaskResult, SettlementEngine, SettlementQueue, SettlementWorker};
pub use types::{GroupId, OwnerType, Pool, TxKind};
pub use withdrawal::{WithdrawalService, WithdrawalStatus};
