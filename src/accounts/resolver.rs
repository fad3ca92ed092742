use std::sync::Arc;

use thiserror::Error;

use super::{Account, AccountRepository, RepositoryError};
use crate::auth::Principal;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0} -> not found in account storage")]
    SubjectNotFound(String),
    #[error("bad credentials")]
    BadCredentials,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Maps stored accounts to principals for the authentication layer
#[derive(Clone)]
pub struct PrincipalResolver {
    repository: Arc<dyn AccountRepository>,
}

impl PrincipalResolver {
    pub fn new(repository: Arc<dyn AccountRepository>) -> Self {
        Self { repository }
    }

    /// Fresh lookup on every call; no caching
    pub async fn load_by_subject(&self, identifier: &str) -> Result<Principal, AuthError> {
        match self.repository.find_by_identifier(identifier).await? {
            Some(account) => Ok(principal_for(&account)),
            None => {
                tracing::warn!("Account lookup missed for {}", identifier);
                Err(AuthError::SubjectNotFound(identifier.to_string()))
            }
        }
    }
}

fn principal_for(account: &Account) -> Principal {
    Principal::new(
        account.id.to_string(),
        [account.authority.as_str()],
        account.password_hash.clone(),
    )
}
