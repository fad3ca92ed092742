mod memory;
mod password;
mod resolver;

pub use memory::InMemoryAccountRepository;
pub use password::{Argon2Hasher, PasswordHasher};
pub use resolver::{AuthError, PrincipalResolver};

#[cfg(test)]
pub(crate) use password::PasswordError;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role granted to an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authority {
    #[serde(rename = "ROLE_USER")]
    User,
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
}

impl Authority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Authority::User => "ROLE_USER",
            Authority::Admin => "ROLE_ADMIN",
        }
    }
}

/// A stored member account
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub authority: Authority,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"[hidden]")
            .field("authority", &self.authority)
            .finish()
    }
}

/// Account data before an id has been assigned
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub authority: Authority,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("account {0} already exists")]
    Duplicate(String),
}

/// Read/write access to stored accounts
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Look up exactly one account by its email/username
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>, RepositoryError>;

    async fn insert(&self, account: NewAccount) -> Result<Account, RepositoryError>;
}
