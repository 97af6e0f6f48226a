//! Database query operations organized by entity

pub mod accounts;
pub mod tasks;

// Re-export commonly used query functions
pub use accounts::{
    account_exists, find_account, find_or_create_account, get_account, list_accounts,
    set_account_extra,
};
pub use tasks::{count_tasks, get_task, scan_since, upsert_task, upsert_task_if_newer};
