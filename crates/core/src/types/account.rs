//! Account domain model

use crate::types::Validator;
use serde::{Deserialize, Serialize};

/// Internal identifier for an account, assigned by the store on creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    /// Wraps a raw store identifier
    pub fn from_raw(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw store identifier
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An account owning a set of task records
///
/// Accounts are created the first time an unseen external identity signs in
/// and are never deleted. Only `extra` may change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Stable identity from the identity provider (e.g. a verified e-mail)
    pub external_identity: String,
    /// Opaque extra attributes
    pub extra: Option<String>,
}

impl Account {
    /// Creates an account value for an already-stored row
    pub fn new(id: AccountId, external_identity: impl Into<String>) -> Self {
        Self {
            id,
            external_identity: external_identity.into(),
            extra: None,
        }
    }
}

impl Validator for Account {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.external_identity.trim().is_empty() {
            errors.push("Account identity cannot be empty".to_string());
        }

        if self.external_identity.trim() != self.external_identity {
            errors.push("Account identity must not have surrounding whitespace".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
