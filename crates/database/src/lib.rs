//! TaskSync Database Layer
//!
//! Durable storage for accounts and task records, backed by SQLite through
//! sqlx. `TaskStore` is the handle the sync engine holds; the free functions
//! in `queries` are the statements it runs.

pub mod connection;
pub mod migrations;
pub mod queries;
pub mod store;

pub use connection::{DatabaseConfig, DbPool};
pub use migrations::{current_version, optimize, run_migrations, verify_integrity};
pub use store::TaskStore;
