use axum::{middleware, routing::get, Extension, Json, Router};

use crate::auth::{auth_middleware, Principal};
use crate::state::AppState;

pub fn member_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Principal of the bearer token on this request
async fn me(Extension(principal): Extension<Principal>) -> Json<Principal> {
    Json(principal)
}
