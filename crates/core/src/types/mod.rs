//! Domain types for TaskSync
//!
//! - `account`: accounts and their identifiers
//! - `task`: task records and incoming edits
//! - `common`: version stamps and shared traits

mod account;
mod common;
mod task;

// Re-export all public types
pub use account::{Account, AccountId};
pub use common::{Validator, Version};
pub use task::{TaskEdit, TaskId, TaskRecord};
