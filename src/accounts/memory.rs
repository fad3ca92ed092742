use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Account, AccountRepository, NewAccount, RepositoryError};

/// Accounts kept in process memory, keyed by email
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountRepository {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>, RepositoryError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(identifier).cloned())
    }

    async fn insert(&self, account: NewAccount) -> Result<Account, RepositoryError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.email) {
            return Err(RepositoryError::Duplicate(account.email));
        }

        let stored = Account {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            email: account.email,
            password_hash: account.password_hash,
            authority: account.authority,
        };
        accounts.insert(stored.email.clone(), stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Authority;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            authority: Authority::User,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let repo = InMemoryAccountRepository::new();

        let first = repo.insert(new_account("a@x.com")).await.unwrap();
        let second = repo.insert(new_account("b@x.com")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_find_by_identifier() {
        let repo = InMemoryAccountRepository::new();
        repo.insert(new_account("a@x.com")).await.unwrap();

        let found = repo.find_by_identifier("a@x.com").await.unwrap();
        assert_eq!(found.map(|a| a.email), Some("a@x.com".to_string()));
        assert!(repo.find_by_identifier("nobody@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = InMemoryAccountRepository::new();
        repo.insert(new_account("a@x.com")).await.unwrap();

        let result = repo.insert(new_account("a@x.com")).await;
        assert!(matches!(result, Err(RepositoryError::Duplicate(email)) if email == "a@x.com"));
    }
}
