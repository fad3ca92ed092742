use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use super::{api_error, ApiError};
use crate::accounts::{AuthError, Authority, NewAccount, RepositoryError};
use crate::auth::{TokenError, TokenPair};
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/reissue", post(reissue))
}

#[derive(Deserialize)]
pub struct CredentialsRequest {
    email: String,
    password: String,
}

impl CredentialsRequest {
    /// Identifier as stored and looked up
    fn email(&self) -> &str {
        self.email.trim()
    }
}

#[derive(Serialize)]
pub struct SignupResponse {
    id: i64,
    email: String,
    authority: Authority,
}

/// Signup endpoint - stores a new account with the user role
async fn signup(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    if request.email().is_empty() || request.password.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "email and password are required",
        ));
    }

    let password_hash = state.hasher.hash(&request.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create account")
    })?;

    let account = state
        .accounts
        .insert(NewAccount {
            email: request.email().to_string(),
            password_hash,
            authority: Authority::User,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Duplicate(_) => api_error(StatusCode::CONFLICT, e.to_string()),
        })?;

    tracing::info!("Created account {} for {}", account.id, account.email);

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            id: account.id,
            email: account.email,
            authority: account.authority,
        }),
    ))
}

/// Login endpoint - verifies credentials and returns a token pair
async fn login(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let principal = match state.resolver.load_by_subject(request.email()).await {
        Ok(principal) => principal,
        Err(e) => {
            // Same hashing cost as a wrong password
            state.hasher.verify(&request.password, &state.dummy_hash);
            return Err(auth_failure(e));
        }
    };

    if !state.hasher.verify(&request.password, principal.credential()) {
        return Err(auth_failure(AuthError::BadCredentials));
    }

    let pair = state.issuer.issue(&principal).map_err(token_failure)?;
    tracing::info!("Login successful for subject {}", principal.subject());

    Ok(Json(pair))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReissueRequest {
    access_token: String,
    refresh_token: String,
}

/// Reissue endpoint - exchanges a valid refresh token and a recently
/// expired access token for a new pair
async fn reissue(
    State(state): State<AppState>,
    Json(request): Json<ReissueRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let pair = state
        .issuer
        .reissue(&request.access_token, &request.refresh_token)
        .map_err(token_failure)?;
    tracing::info!("Reissued tokens");

    Ok(Json(pair))
}

fn auth_failure(err: AuthError) -> ApiError {
    match err {
        AuthError::SubjectNotFound(_) | AuthError::BadCredentials => {
            tracing::warn!("Authentication failed: {}", err);
            api_error(StatusCode::UNAUTHORIZED, "Invalid credentials")
        }
        AuthError::Repository(e) => {
            tracing::error!("Account lookup failed: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Account lookup failed")
        }
    }
}

fn token_failure(err: TokenError) -> ApiError {
    match err {
        TokenError::Signing(_) | TokenError::AuthoritySeparator(_) => {
            tracing::error!("Failed to create token: {}", err);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create token")
        }
        other => {
            tracing::warn!("Token not accepted: {}", other);
            api_error(StatusCode::UNAUTHORIZED, "Invalid token")
        }
    }
}
