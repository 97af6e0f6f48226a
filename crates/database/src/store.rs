//! Task store handle with an explicit lifecycle

use crate::connection::{self, DatabaseConfig, DbPool};
use crate::migrations;
use crate::queries::{accounts, tasks};
use tasksync_core::{Account, AccountId, AppError, TaskId, TaskRecord, Version};

/// Durable keyed storage for accounts and task records
///
/// Cloning is cheap; every clone shares the same connection pool.
#[derive(Debug, Clone)]
pub struct TaskStore {
    pool: DbPool,
}

impl TaskStore {
    /// Opens the database and brings its schema up to date
    pub async fn open(config: DatabaseConfig) -> Result<Self, AppError> {
        let path = config.path.clone();
        let pool = connection::connect(config).await?;
        migrations::run_migrations(&pool).await?;

        log::info!("Opened task store at {}", path);
        Ok(Self { pool })
    }

    /// Opens a private in-memory store
    pub async fn open_in_memory() -> Result<Self, AppError> {
        let pool = connection::connect_in_memory().await?;
        migrations::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Wraps a pool whose schema is already migrated
    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Closes the pool; outstanding clones stop working
    pub async fn close(self) {
        connection::close(self.pool).await;
        log::debug!("Closed task store");
    }

    /// Runs SQLite's integrity check
    pub async fn verify_integrity(&self) -> Result<(), AppError> {
        migrations::verify_integrity(&self.pool).await
    }

    pub async fn get(
        &self,
        owner: AccountId,
        task_id: &TaskId,
    ) -> Result<Option<TaskRecord>, AppError> {
        tasks::get_task(&self.pool, owner, task_id).await
    }

    pub async fn upsert(&self, record: &TaskRecord) -> Result<(), AppError> {
        tasks::upsert_task(&self.pool, record).await
    }

    /// Conditional upsert; see [`tasks::upsert_task_if_newer`]
    pub async fn upsert_if_newer(&self, record: &TaskRecord) -> Result<Option<Version>, AppError> {
        tasks::upsert_task_if_newer(&self.pool, record).await
    }

    pub async fn scan_since(
        &self,
        owner: AccountId,
        watermark: Version,
    ) -> Result<Vec<TaskRecord>, AppError> {
        tasks::scan_since(&self.pool, owner, watermark, None).await
    }

    /// Like [`scan_since`](Self::scan_since), stopping after about `limit` records
    pub async fn scan_since_limited(
        &self,
        owner: AccountId,
        watermark: Version,
        limit: u32,
    ) -> Result<Vec<TaskRecord>, AppError> {
        tasks::scan_since(&self.pool, owner, watermark, Some(limit)).await
    }

    pub async fn count_tasks(&self, owner: AccountId) -> Result<i64, AppError> {
        tasks::count_tasks(&self.pool, owner).await
    }

    /// Returns the highest version stamped across all accounts
    pub async fn max_version(&self) -> Result<Version, AppError> {
        tasks::max_version(&self.pool).await
    }

    pub async fn find_or_create_account(&self, identity: &str) -> Result<Account, AppError> {
        accounts::find_or_create_account(&self.pool, identity).await
    }

    pub async fn find_account(&self, identity: &str) -> Result<Option<Account>, AppError> {
        accounts::find_account(&self.pool, identity).await
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, AppError> {
        accounts::get_account(&self.pool, id).await
    }

    pub async fn account_exists(&self, id: AccountId) -> Result<bool, AppError> {
        accounts::account_exists(&self.pool, id).await
    }

    pub async fn set_account_extra(
        &self,
        id: AccountId,
        extra: Option<&str>,
    ) -> Result<(), AppError> {
        accounts::set_account_extra(&self.pool, id, extra).await
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        accounts::list_accounts(&self.pool).await
    }
}
