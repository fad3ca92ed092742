mod jwt;
mod keys;
mod middleware;
mod principal;

pub use jwt::{TokenError, TokenIssuer, TokenPair};
pub use middleware::auth_middleware;
pub use principal::Principal;

#[cfg(test)]
pub(crate) use keys::encode_secret;
