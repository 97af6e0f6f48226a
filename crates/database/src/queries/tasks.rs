//! Task record database operations

use crate::DbPool;
use tasksync_core::{AccountId, AppError, TaskId, TaskRecord, Version};

/// Gets the live record for `(owner, task_id)`, if any
pub async fn get_task(
    pool: &DbPool,
    owner: AccountId,
    task_id: &TaskId,
) -> Result<Option<TaskRecord>, AppError> {
    let row = sqlx::query(
        "SELECT owner, id, version, client_version, content FROM tasks WHERE owner = ? AND id = ?",
    )
    .bind(owner.as_i64())
    .bind(task_id.as_str())
    .fetch_optional(pool)
    .await
    .map_err(|e| AppError::storage("Failed to fetch task", e))?;

    row.map(row_to_task).transpose()
}

/// Inserts the record, or replaces version, client version and content in place
pub async fn upsert_task(pool: &DbPool, record: &TaskRecord) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO tasks (owner, id, version, client_version, content)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(owner, id) DO UPDATE SET
            version = excluded.version,
            client_version = excluded.client_version,
            content = excluded.content
        "#,
    )
    .bind(record.owner.as_i64())
    .bind(record.task_id.as_str())
    .bind(record.version.as_i64())
    .bind(record.client_version.as_i64())
    .bind(&record.content)
    .execute(pool)
    .await
    .map_err(|e| write_error(record.owner, "Failed to save task", e))?;

    Ok(())
}

/// Writes the record only if it is new or its client version is newer
///
/// The comparison and the write are one statement, so two writers racing on
/// the same key cannot both win with stale information. The stored version
/// never goes backwards: it is the larger of the record's stamp and the
/// previous stored version plus one.
///
/// Returns the stored version, or `None` if the stored record already holds
/// an equal-or-newer client version.
pub async fn upsert_task_if_newer(
    pool: &DbPool,
    record: &TaskRecord,
) -> Result<Option<Version>, AppError> {
    let stored: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO tasks (owner, id, version, client_version, content)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(owner, id) DO UPDATE SET
            version = MAX(excluded.version, tasks.version + 1),
            client_version = excluded.client_version,
            content = excluded.content
        WHERE tasks.client_version < excluded.client_version
        RETURNING version
        "#,
    )
    .bind(record.owner.as_i64())
    .bind(record.task_id.as_str())
    .bind(record.version.as_i64())
    .bind(record.client_version.as_i64())
    .bind(&record.content)
    .fetch_optional(pool)
    .await
    .map_err(|e| write_error(record.owner, "Failed to save task", e))?;

    Ok(stored.map(Version::from_raw))
}

/// Returns the owner's records with `version > watermark`, oldest first
///
/// With a `limit`, the page ends at the version of the `limit`-th record and
/// includes every record sharing that version, so a follow-up scan from the
/// page's highest version never skips a record. A page can therefore hold
/// slightly more than `limit` records.
pub async fn scan_since(
    pool: &DbPool,
    owner: AccountId,
    watermark: Version,
    limit: Option<u32>,
) -> Result<Vec<TaskRecord>, AppError> {
    let rows = match limit {
        None => sqlx::query(
            r#"
            SELECT owner, id, version, client_version, content FROM tasks
            WHERE owner = ? AND version > ?
            ORDER BY version ASC, id ASC
            "#,
        )
        .bind(owner.as_i64())
        .bind(watermark.as_i64())
        .fetch_all(pool)
        .await,
        Some(limit) => sqlx::query(
            r#"
            SELECT owner, id, version, client_version, content FROM tasks
            WHERE owner = ?1 AND version > ?2
              AND version <= COALESCE(
                  (SELECT version FROM tasks
                   WHERE owner = ?1 AND version > ?2
                   ORDER BY version ASC
                   LIMIT 1 OFFSET ?3),
                  9223372036854775807)
            ORDER BY version ASC, id ASC
            "#,
        )
        .bind(owner.as_i64())
        .bind(watermark.as_i64())
        .bind(i64::from(limit.max(1)) - 1)
        .fetch_all(pool)
        .await,
    }
    .map_err(|e| AppError::storage("Failed to scan tasks", e))?;

    rows.into_iter().map(row_to_task).collect()
}

/// Counts the records an account owns
pub async fn count_tasks(pool: &DbPool, owner: AccountId) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE owner = ?")
        .bind(owner.as_i64())
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::storage("Failed to count tasks", e))
}

/// Returns the highest version stamped on any task, or `Version::ZERO`
pub async fn max_version(pool: &DbPool) -> Result<Version, AppError> {
    let max: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM tasks")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::storage("Failed to read highest version", e))?;
    Ok(Version::from_raw(max))
}

fn write_error(owner: AccountId, message: &str, error: sqlx::Error) -> AppError {
    let is_fk_violation = error
        .as_database_error()
        .map(|db| db.is_foreign_key_violation())
        .unwrap_or(false);

    if is_fk_violation {
        AppError::unknown_account(owner)
    } else {
        AppError::storage(message, error)
    }
}

pub(crate) fn row_to_task(row: sqlx::sqlite::SqliteRow) -> Result<TaskRecord, AppError> {
    use sqlx::Row;

    let owner: i64 = row
        .try_get("owner")
        .map_err(|e| AppError::storage("Missing task owner", e))?;
    let id: String = row
        .try_get("id")
        .map_err(|e| AppError::storage("Missing task ID", e))?;
    let version: i64 = row
        .try_get("version")
        .map_err(|e| AppError::storage("Missing task version", e))?;
    let client_version: i64 = row
        .try_get("client_version")
        .map_err(|e| AppError::storage("Missing task client version", e))?;
    let content: String = row
        .try_get("content")
        .map_err(|e| AppError::storage("Missing task content", e))?;

    Ok(TaskRecord {
        owner: AccountId::from_raw(owner),
        task_id: TaskId::new(id),
        version: Version::from_raw(version),
        client_version: Version::from_raw(client_version),
        content,
    })
}
