//! Account database operations

use crate::DbPool;
use tasksync_core::{Account, AccountId, AppError};

/// Returns the account for an identity, creating it on first sight
///
/// The insert is a no-op when the identity already exists, so concurrent
/// first logins for the same identity still end up with a single row.
pub async fn find_or_create_account(pool: &DbPool, identity: &str) -> Result<Account, AppError> {
    let inserted = sqlx::query(
        "INSERT INTO accounts (external_identity) VALUES (?) ON CONFLICT(external_identity) DO NOTHING",
    )
    .bind(identity)
    .execute(pool)
    .await
    .map_err(|e| AppError::storage("Failed to create account", e))?;

    if inserted.rows_affected() == 1 {
        log::info!("Created account for {}", identity);
    }

    find_account(pool, identity)
        .await?
        .ok_or_else(|| AppError::InternalError {
            message: format!("Account for {} vanished after insert", identity),
        })
}

/// Looks up an account by external identity
pub async fn find_account(pool: &DbPool, identity: &str) -> Result<Option<Account>, AppError> {
    let row = sqlx::query("SELECT id, external_identity, extra FROM accounts WHERE external_identity = ?")
        .bind(identity)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::storage("Failed to fetch account", e))?;

    row.map(row_to_account).transpose()
}

/// Gets an account by internal id
pub async fn get_account(pool: &DbPool, id: AccountId) -> Result<Account, AppError> {
    let row = sqlx::query("SELECT id, external_identity, extra FROM accounts WHERE id = ?")
        .bind(id.as_i64())
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::storage("Failed to fetch account", e))?
        .ok_or_else(|| AppError::unknown_account(id))?;

    row_to_account(row)
}

/// Returns true if an account with this id exists
pub async fn account_exists(pool: &DbPool, id: AccountId) -> Result<bool, AppError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM accounts WHERE id = ?")
        .bind(id.as_i64())
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::storage("Failed to check account", e))?;

    Ok(found.is_some())
}

/// Replaces the opaque extra attributes of an account
pub async fn set_account_extra(
    pool: &DbPool,
    id: AccountId,
    extra: Option<&str>,
) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE accounts SET extra = ? WHERE id = ?")
        .bind(extra)
        .bind(id.as_i64())
        .execute(pool)
        .await
        .map_err(|e| AppError::storage("Failed to update account", e))?;

    if result.rows_affected() == 0 {
        return Err(AppError::unknown_account(id));
    }

    Ok(())
}

/// Lists all accounts ordered by id
pub async fn list_accounts(pool: &DbPool) -> Result<Vec<Account>, AppError> {
    let rows = sqlx::query("SELECT id, external_identity, extra FROM accounts ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::storage("Failed to list accounts", e))?;

    rows.into_iter().map(row_to_account).collect()
}

pub(crate) fn row_to_account(row: sqlx::sqlite::SqliteRow) -> Result<Account, AppError> {
    use sqlx::Row;

    let id: i64 = row
        .try_get("id")
        .map_err(|e| AppError::storage("Missing account ID", e))?;
    let external_identity: String = row
        .try_get("external_identity")
        .map_err(|e| AppError::storage("Missing account identity", e))?;
    let extra: Option<String> = row
        .try_get("extra")
        .map_err(|e| AppError::storage("Invalid account extra", e))?;

    Ok(Account {
        id: AccountId::from_raw(id),
        external_identity,
        extra,
    })
}
