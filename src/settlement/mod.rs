//! Escrow & settlement engine
//!
//! Campaign-funding freeze, per-task multi-party payout, campaign-closure
//! refund, and the durable job queue that replaces fire-and-forget dispatch
//! of task settlements.

pub mod engine;
pub mod plan;
pub mod queue;
pub mod worker;

pub use engine::{SettleTaskResult, SettlementEngine, SettlementReceipt};
pub use plan::SettlementPlan;
pub use queue::{JobState, SettlementJob, SettlementQueue};
pub use worker::{SettlementWorker, WorkerConfig};
