use std::sync::Arc;

use crate::accounts::{AccountRepository, PasswordHasher, PrincipalResolver};
use crate::auth::TokenIssuer;

/// Shared handles passed to every route
#[derive(Clone)]
pub struct AppState {
    pub issuer: TokenIssuer,
    pub resolver: PrincipalResolver,
    pub accounts: Arc<dyn AccountRepository>,
    pub hasher: Arc<dyn PasswordHasher>,
    /// Verified against on lookup misses so unknown and known emails cost the same
    pub dummy_hash: Arc<str>,
}

impl AppState {
    pub fn new(
        issuer: TokenIssuer,
        accounts: Arc<dyn AccountRepository>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        let dummy_hash = hasher
            .hash("member-auth-unknown-account")
            .map(Arc::from)
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to prepare dummy password hash: {}", e);
                Arc::from("")
            });

        Self {
            issuer,
            resolver: PrincipalResolver::new(accounts.clone()),
            accounts,
            hasher,
            dummy_hash,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    use crate::accounts::{Argon2Hasher, InMemoryAccountRepository};
    use crate::auth::encode_secret;
    use crate::config::Config;

    let config = Config {
        port: 0,
        jwt_secret: encode_secret("member-auth-test-secret-0123456789ab"),
    };
    let issuer = TokenIssuer::from_config(&config).expect("test secret is valid");

    AppState::new(
        issuer,
        Arc::new(InMemoryAccountRepository::new()),
        Arc::new(Argon2Hasher),
    )
}
