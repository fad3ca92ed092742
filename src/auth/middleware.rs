use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Authentication middleware that validates bearer tokens and stores the
/// resolved `Principal` in the request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = match bearer_token(request.headers()) {
        Some(token) => token.to_owned(),
        None => {
            tracing::warn!("Missing or invalid Authorization header");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    if !state.issuer.is_valid(&token) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    match state.issuer.resolve_principal(&token) {
        Ok(principal) => {
            tracing::debug!("Authenticated subject {}", principal.subject());
            request.extensions_mut().insert(principal);
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::warn!("Token accepted but principal could not be resolved: {}", e);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
