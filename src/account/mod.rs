//! Account management module
//!
//! Lazy find-or-create of credit accounts, balance queries, and the one-time
//! permission grant that fires when an account is first created.

pub mod models;
pub mod policy;
pub mod service;

pub use models::{Account, ActorRole, PermissionSet};
pub use policy::{DefaultGrantPolicy, GrantPolicy};
pub use service::AccountService;
