mod accounts;
mod auth;
mod config;
mod routes;
mod state;

use axum::{http::Method, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use accounts::{Argon2Hasher, InMemoryAccountRepository};
use auth::TokenIssuer;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env first so RUST_LOG from it reaches the filter
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "member_auth=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting member auth backend");

    let issuer = TokenIssuer::from_config(&config)?;
    tracing::info!("Token signing key: configured");

    let state = AppState::new(
        issuer,
        Arc::new(InMemoryAccountRepository::new()),
        Arc::new(Argon2Hasher),
    );

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .nest("/auth", routes::auth_routes())
        .nest("/member", routes::member_routes(state.clone()))
        .nest("/debug", routes::debug_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
