pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;
pub mod models;
pub mod password;
pub mod routes;
pub mod tokens;
pub mod workflow;

use std::sync::Arc;

use axum::{routing::get, Router};
use sqlx::SqlitePool;
use time::Duration;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tower_sessions::{cookie::SameSite, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

use crate::config::Config;
use crate::mail::MailQueue;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub mail: Arc<dyn MailQueue>,
    pub config: Arc<Config>,
}

async fn health() -> &'static str {
    "ok"
}

/// Build the full Axum application router.
///
/// Caller is responsible for running database migrations on `pool` beforehand.
/// This function sets up the session store (and migrates its table), then
/// assembles all route modules, middleware, and state.
pub async fn build_app(
    pool: SqlitePool,
    config: Config,
    mail: Arc<dyn MailQueue>,
) -> Result<Router, sqlx::Error> {
    let session_store = SqliteStore::new(pool.clone());
    session_store.migrate().await?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_expiry(Expiry::OnInactivity(Duration::days(30)))
        .with_secure(config.secure_cookies)
        .with_http_only(true)
        .with_same_site(SameSite::Lax);

    let state = AppState {
        db: pool,
        mail,
        config: Arc::new(config),
    };

    Ok(Router::new()
        .route("/health", get(health))
        .merge(routes::auth::router())
        .merge(routes::verification::router())
        .merge(routes::users::router())
        .merge(routes::groups::router())
        .merge(routes::pokerboards::router())
        .merge(routes::invitations::router())
        .layer(session_layer)
        .layer(
            TraceLayer::new_for_http()
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state))
}
