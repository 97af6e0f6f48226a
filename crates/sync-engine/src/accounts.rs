//! Maps authenticated identities to accounts

use tasksync_core::{Account, AppError};
use tasksync_database::TaskStore;

/// Resolves external identities to internal accounts
#[derive(Debug, Clone)]
pub struct AccountResolver {
    store: TaskStore,
}

impl AccountResolver {
    pub fn new(store: TaskStore) -> Self {
        Self { store }
    }

    /// Returns the account for a verified identity, creating it on first sight
    pub async fn resolve(&self, identity: &str) -> Result<Account, AppError> {
        let identity = normalize(identity)?;
        self.store.find_or_create_account(identity).await
    }

    /// Returns the account for an identity without creating one
    pub async fn lookup(&self, identity: &str) -> Result<Option<Account>, AppError> {
        match normalize(identity) {
            Ok(identity) => self.store.find_account(identity).await,
            Err(_) => Ok(None),
        }
    }

    /// Makes sure every listed identity has an account
    pub async fn ensure<I, S>(&self, identities: I) -> Result<Vec<Account>, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut accounts = Vec::new();
        for identity in identities {
            accounts.push(self.resolve(identity.as_ref()).await?);
        }

        log::debug!("Ensured {} pre-provisioned accounts", accounts.len());
        Ok(accounts)
    }
}

fn normalize(identity: &str) -> Result<&str, AppError> {
    let trimmed = identity.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidArgument {
            argument: "identity".to_string(),
            reason: "Identity cannot be empty".to_string(),
        });
    }
    Ok(trimmed)
}
