use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::keys::{KeyError, SigningKeys, StaticKey};
use super::principal::Principal;
use crate::config::Config;

pub const BEARER_TYPE: &str = "bearer";
pub const ACCESS_TOKEN_TTL_MS: i64 = 10 * 60 * 1000;
pub const REFRESH_TOKEN_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Payload of an access token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    pub sub: String,  // Principal subject
    pub auth: String, // Comma-joined authorities
    pub exp: i64,     // Expiration time (seconds)
}

/// Payload of a refresh token: no identity, only an expiry
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub exp: i64,
}

/// Lenient view used when reading claims back out of a token.
/// A non-string `auth` or `sub` fails to decode and is reported as malformed.
#[derive(Debug, Deserialize)]
struct DecodedClaims {
    sub: Option<String>,
    auth: Option<String>,
    exp: i64,
}

/// Strict view of a refresh token: any identity claim makes it fail to decode
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictRefreshClaims {
    #[allow(dead_code)]
    exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub grant_type: String,
    pub access_token: String,
    pub access_token_expires_in: i64, // epoch millis
    pub refresh_token: String,
}

/// Why a token failed verification
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("expired token")]
    Expired,
    #[error("unsupported token")]
    Unsupported,
    #[error("malformed token")]
    Malformed,
}

impl From<&jsonwebtoken::errors::Error> for TokenRejection {
    fn from(err: &jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidKeyFormat => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm
            | ErrorKind::ImmatureSignature => Self::Unsupported,
            _ => Self::Malformed,
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token carries no authority claim")]
    MissingAuthorityClaim,
    #[error("token carries no subject")]
    MissingSubject,
    #[error("authority {0:?} contains the ',' separator")]
    AuthoritySeparator(String),
    #[error("access token expired too long ago to be renewed")]
    StaleAccessToken,
    #[error("{0}")]
    Rejected(#[from] TokenRejection),
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Issues and verifies stateless bearer tokens
#[derive(Clone)]
pub struct TokenIssuer {
    keys: Arc<dyn SigningKeys>,
}

impl TokenIssuer {
    pub fn new(keys: Arc<dyn SigningKeys>) -> Self {
        Self { keys }
    }

    pub fn from_config(config: &Config) -> Result<Self, KeyError> {
        let key = StaticKey::from_base64(&config.jwt_secret)?;
        Ok(Self::new(Arc::new(key)))
    }

    /// Create an access/refresh token pair for an authenticated principal
    pub fn issue(&self, principal: &Principal) -> Result<TokenPair, TokenError> {
        self.issue_at(principal, Utc::now())
    }

    pub fn issue_at(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        if let Some(authority) = principal.authorities().iter().find(|a| a.contains(',')) {
            return Err(TokenError::AuthoritySeparator(authority.clone()));
        }

        let header = Header::new(self.keys.algorithm());

        let access_expiry = now + Duration::milliseconds(ACCESS_TOKEN_TTL_MS);
        let access_claims = AccessClaims {
            sub: principal.subject().to_string(),
            auth: principal.authorities().join(","),
            exp: access_expiry.timestamp(),
        };
        let access_token = encode(&header, &access_claims, self.keys.encoding_key())
            .map_err(TokenError::Signing)?;

        let refresh_expiry = now + Duration::milliseconds(REFRESH_TOKEN_TTL_MS);
        let refresh_claims = RefreshClaims {
            exp: refresh_expiry.timestamp(),
        };
        let refresh_token = encode(&header, &refresh_claims, self.keys.encoding_key())
            .map_err(TokenError::Signing)?;

        Ok(TokenPair {
            grant_type: BEARER_TYPE.to_string(),
            access_token,
            access_token_expires_in: access_expiry.timestamp_millis(),
            refresh_token,
        })
    }

    /// Rebuild the principal carried by an access token.
    ///
    /// The signature must verify, but an expired token still yields its
    /// claims; callers gate authentication on `is_valid`.
    pub fn resolve_principal(&self, access_token: &str) -> Result<Principal, TokenError> {
        self.decode_access(access_token)
            .map(|(principal, _)| principal)
    }

    /// Verify a refresh token: signature, expiry, and no claims besides `exp`
    pub fn validate_refresh(&self, token: &str) -> Result<(), TokenRejection> {
        decode::<StrictRefreshClaims>(token, self.keys.decoding_key(), &self.validation())
            .map(|_| ())
            .map_err(|e| TokenRejection::from(&e))
    }

    /// Exchange a refresh token and the principal's previous access token
    /// for a new pair. The access token may be expired, but not for longer
    /// than a refresh token lives.
    pub fn reissue(&self, access_token: &str, refresh_token: &str) -> Result<TokenPair, TokenError> {
        self.reissue_at(access_token, refresh_token, Utc::now())
    }

    pub fn reissue_at(
        &self,
        access_token: &str,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        self.validate_refresh(refresh_token)?;

        let (principal, exp) = self.decode_access(access_token)?;
        if exp * 1000 < now.timestamp_millis() - REFRESH_TOKEN_TTL_MS {
            return Err(TokenError::StaleAccessToken);
        }

        self.issue_at(&principal, now)
    }

    fn decode_access(&self, access_token: &str) -> Result<(Principal, i64), TokenError> {
        let mut validation = self.validation();
        validation.validate_exp = false;

        let token_data = decode::<DecodedClaims>(access_token, self.keys.decoding_key(), &validation)
            .map_err(|e| TokenRejection::from(&e))?;
        let claims = token_data.claims;

        let auth = claims.auth.ok_or(TokenError::MissingAuthorityClaim)?;
        let subject = claims.sub.ok_or(TokenError::MissingSubject)?;

        Ok((Principal::new(subject, auth.split(','), ""), claims.exp))
    }

    /// Full verification, reporting which check failed
    pub fn validate(&self, token: &str) -> Result<(), TokenRejection> {
        decode::<RefreshClaims>(token, self.keys.decoding_key(), &self.validation())
            .map(|_| ())
            .map_err(|e| TokenRejection::from(&e))
    }

    pub fn is_valid(&self, token: &str) -> bool {
        match self.validate(token) {
            Ok(()) => true,
            Err(rejection) => {
                tracing::info!("Token rejected: {}", rejection);
                false
            }
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.keys.algorithm());
        validation.leeway = 0;
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::keys::encode_secret;
    use chrono::TimeZone;
    use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};

    const SECRET: &str = "member-auth-test-secret-0123456789ab";
    const OTHER_SECRET: &str = "another-secret-that-is-long-enough-xyz";

    fn issuer_for(raw: &str) -> TokenIssuer {
        let key = StaticKey::from_base64(&encode_secret(raw)).unwrap();
        TokenIssuer::new(Arc::new(key))
    }

    fn alice() -> Principal {
        Principal::new("alice", ["ROLE_USER", "ROLE_ADMIN"], "")
    }

    fn raw_claims(token: &str) -> serde_json::Value {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        decode::<serde_json::Value>(
            token,
            &DecodingKey::from_secret(SECRET.as_bytes()),
            &validation,
        )
        .unwrap()
        .claims
    }

    fn sign(claims: &serde_json::Value, algorithm: Algorithm) -> String {
        encode(
            &Header::new(algorithm),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_and_resolve_round_trip() {
        let issuer = issuer_for(SECRET);
        let pair = issuer.issue(&alice()).unwrap();

        let principal = issuer.resolve_principal(&pair.access_token).unwrap();

        assert_eq!(principal.subject(), "alice");
        assert_eq!(principal.authorities(), alice().authorities());
        assert_eq!(principal.credential(), "");
        assert_eq!(pair.grant_type, "bearer");
    }

    #[test]
    fn test_access_token_claims() {
        let issuer = issuer_for(SECRET);
        let pair = issuer.issue(&alice()).unwrap();

        let claims = raw_claims(&pair.access_token);
        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["auth"], "ROLE_USER,ROLE_ADMIN");
    }

    #[test]
    fn test_expiry_offsets() {
        let issuer = issuer_for(SECRET);
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

        let pair = issuer.issue_at(&alice(), now).unwrap();
        assert_eq!(pair.access_token_expires_in, 1_700_000_000_123 + 600_000);

        let access = raw_claims(&pair.access_token);
        assert_eq!(access["exp"], 1_700_000_600);

        let refresh = raw_claims(&pair.refresh_token);
        assert_eq!(refresh["exp"], (1_700_000_000_123_i64 + 604_800_000) / 1000);
        assert!(refresh.get("sub").is_none());
        assert!(refresh.get("auth").is_none());
    }

    #[test]
    fn test_fresh_tokens_are_valid() {
        let issuer = issuer_for(SECRET);
        let pair = issuer.issue(&alice()).unwrap();

        assert!(issuer.is_valid(&pair.access_token));
        assert!(issuer.is_valid(&pair.refresh_token));
    }

    #[test]
    fn test_rejects_foreign_key() {
        let issuer = issuer_for(SECRET);
        let pair = issuer_for(OTHER_SECRET).issue(&alice()).unwrap();

        assert!(!issuer.is_valid(&pair.access_token));
        assert_eq!(
            issuer.validate(&pair.access_token),
            Err(TokenRejection::InvalidSignature)
        );
        assert!(matches!(
            issuer.resolve_principal(&pair.access_token),
            Err(TokenError::Rejected(TokenRejection::InvalidSignature))
        ));
    }

    #[test]
    fn test_rejects_expired_token() {
        let issuer = issuer_for(SECRET);
        let pair = issuer
            .issue_at(&alice(), Utc::now() - Duration::days(30))
            .unwrap();

        assert!(!issuer.is_valid(&pair.access_token));
        assert!(!issuer.is_valid(&pair.refresh_token));
        assert_eq!(
            issuer.validate(&pair.access_token),
            Err(TokenRejection::Expired)
        );
    }

    #[test]
    fn test_expired_token_still_resolves() {
        let issuer = issuer_for(SECRET);
        let pair = issuer
            .issue_at(&alice(), Utc::now() - Duration::hours(1))
            .unwrap();

        let principal = issuer.resolve_principal(&pair.access_token).unwrap();
        assert_eq!(principal.subject(), "alice");
    }

    #[test]
    fn test_rejects_malformed_input() {
        let issuer = issuer_for(SECRET);

        assert!(!issuer.is_valid(""));
        assert!(!issuer.is_valid("not-a-token"));
        assert!(!issuer.is_valid("a.b.c"));
        assert_eq!(issuer.validate(""), Err(TokenRejection::Malformed));
        assert_eq!(issuer.validate("a.b.c"), Err(TokenRejection::Malformed));
    }

    #[test]
    fn test_rejects_other_algorithm() {
        let issuer = issuer_for(SECRET);
        let exp = (Utc::now() + Duration::minutes(5)).timestamp();
        let token = sign(&serde_json::json!({ "exp": exp }), Algorithm::HS512);

        assert!(!issuer.is_valid(&token));
        assert_eq!(issuer.validate(&token), Err(TokenRejection::Unsupported));
    }

    #[test]
    fn test_refresh_token_has_no_authorities() {
        let issuer = issuer_for(SECRET);
        let pair = issuer.issue(&alice()).unwrap();

        let result = issuer.resolve_principal(&pair.refresh_token);
        assert!(matches!(result, Err(TokenError::MissingAuthorityClaim)));
    }

    #[test]
    fn test_empty_authority_claim_resolves_to_no_authorities() {
        let issuer = issuer_for(SECRET);
        let exp = (Utc::now() + Duration::minutes(5)).timestamp();
        let token = sign(
            &serde_json::json!({ "sub": "bob", "auth": "", "exp": exp }),
            Algorithm::HS256,
        );

        let principal = issuer.resolve_principal(&token).unwrap();
        assert_eq!(principal.subject(), "bob");
        assert!(principal.authorities().is_empty());
    }

    #[test]
    fn test_missing_subject() {
        let issuer = issuer_for(SECRET);
        let exp = (Utc::now() + Duration::minutes(5)).timestamp();
        let token = sign(
            &serde_json::json!({ "auth": "ROLE_USER", "exp": exp }),
            Algorithm::HS256,
        );

        assert!(matches!(
            issuer.resolve_principal(&token),
            Err(TokenError::MissingSubject)
        ));
    }

    #[test]
    fn test_round_trip_single_authority() {
        let issuer = issuer_for(SECRET);
        let original = Principal::new("42", ["ROLE_USER"], "");
        let pair = issuer.issue(&original).unwrap();

        let principal = issuer.resolve_principal(&pair.access_token).unwrap();
        assert_eq!(principal, original);
    }

    #[test]
    fn test_round_trip_non_ascii_subject() {
        let issuer = issuer_for(SECRET);
        let original = Principal::new("zoë.müller@例え.jp", ["ROLE_ADMIN"], "");
        let pair = issuer.issue(&original).unwrap();

        let principal = issuer.resolve_principal(&pair.access_token).unwrap();
        assert_eq!(principal.subject(), "zoë.müller@例え.jp");
        assert_eq!(principal.authorities(), ["ROLE_ADMIN"]);
    }

    #[test]
    fn test_round_trip_duplicate_and_empty_authorities() {
        let issuer = issuer_for(SECRET);
        let original = Principal::new("carol", ["ROLE_USER", "", "ROLE_USER", "ROLE_OPS"], "");
        let pair = issuer.issue(&original).unwrap();

        assert_eq!(raw_claims(&pair.access_token)["auth"], "ROLE_USER,ROLE_OPS");
        let principal = issuer.resolve_principal(&pair.access_token).unwrap();
        assert_eq!(principal.authorities(), ["ROLE_USER", "ROLE_OPS"]);
    }

    #[test]
    fn test_issue_refuses_authority_with_separator() {
        let issuer = issuer_for(SECRET);
        let principal = Principal::new("dave", ["ROLE_USER", "A,B"], "");

        match issuer.issue(&principal) {
            Err(TokenError::AuthoritySeparator(authority)) => assert_eq!(authority, "A,B"),
            other => panic!("expected AuthoritySeparator, got {:?}", other),
        }
    }

    #[test]
    fn test_non_string_authority_claim_is_malformed() {
        let issuer = issuer_for(SECRET);
        let exp = (Utc::now() + Duration::minutes(5)).timestamp();
        let token = sign(
            &serde_json::json!({ "sub": "bob", "auth": 5, "exp": exp }),
            Algorithm::HS256,
        );

        assert!(matches!(
            issuer.resolve_principal(&token),
            Err(TokenError::Rejected(TokenRejection::Malformed))
        ));
    }

    #[test]
    fn test_validate_refresh() {
        let issuer = issuer_for(SECRET);
        let pair = issuer.issue(&alice()).unwrap();

        assert_eq!(issuer.validate_refresh(&pair.refresh_token), Ok(()));
        assert_eq!(
            issuer.validate_refresh(&pair.access_token),
            Err(TokenRejection::Malformed)
        );
    }

    #[test]
    fn test_reissue_from_recently_expired_access_token() {
        let issuer = issuer_for(SECRET);
        let old = issuer
            .issue_at(&alice(), Utc::now() - Duration::hours(1))
            .unwrap();
        let fresh = issuer.issue(&alice()).unwrap();

        let renewed = issuer
            .reissue(&old.access_token, &fresh.refresh_token)
            .unwrap();
        assert!(issuer.is_valid(&renewed.access_token));
        assert_eq!(
            issuer.resolve_principal(&renewed.access_token).unwrap().subject(),
            "alice"
        );
    }

    #[test]
    fn test_reissue_rejects_access_token_as_refresh_token() {
        let issuer = issuer_for(SECRET);
        let pair = issuer.issue(&alice()).unwrap();

        let result = issuer.reissue(&pair.access_token, &pair.access_token);
        assert!(matches!(
            result,
            Err(TokenError::Rejected(TokenRejection::Malformed))
        ));
    }

    #[test]
    fn test_reissue_rejects_stale_access_token() {
        let issuer = issuer_for(SECRET);
        let ancient = issuer
            .issue_at(&alice(), Utc::now() - Duration::days(365))
            .unwrap();
        let fresh = issuer
            .issue(&Principal::new("someone-else", ["ROLE_USER"], ""))
            .unwrap();

        let result = issuer.reissue(&ancient.access_token, &fresh.refresh_token);
        assert!(matches!(result, Err(TokenError::StaleAccessToken)));
    }
}
