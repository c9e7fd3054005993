//! # gatehouse: session-based authentication for a web frontend
//!
//! `gatehouse` is a small authentication service: clients register
//! credentials, log in to receive an opaque session cookie, present that
//! cookie to protected resources, and log out to revoke it. Sessions use a
//! sliding expiration window - every successful validation renews the
//! window, and a session that sits unused past the timeout is rejected and
//! lazily removed the next time it is presented.
//!
//! ## Architecture
//!
//! The HTTP layer is built on [Axum](https://github.com/tokio-rs/axum); the
//! transport hands the core nothing but typed form fields and the raw
//! cookie value. Underneath sit four pieces:
//!
//! - the **credential store** ([`store::CredentialStore`]) persists one
//!   `username -> Argon2id verifier` record per user and enforces username
//!   uniqueness atomically;
//! - the **session store** ([`store::SessionStore`]) persists one record
//!   per live session and guarantees that concurrent renewals and
//!   revocations of the same id cannot tear a record;
//! - the **auth service** ([`auth::AuthService`]) drives signup, login and
//!   logout as small state transitions over the two stores;
//! - the **session guard** ([`auth::SessionGuard`]) is the single authority
//!   every protected request consults for a verdict on its session.
//!
//! Both stores keep plain `key=value` record files under directories from
//! the configuration, and every update is an atomic create or replace - a
//! reader never sees half a write. There is no database to operate.
//!
//! ## Quick start
//!
//! ```no_run
//! use clap::Parser;
//! use gatehouse::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = gatehouse::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     gatehouse::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for the YAML/environment configuration.

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
mod openapi;
pub mod store;
pub mod telemetry;
mod types;

#[cfg(test)]
pub(crate) mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use bon::Builder;
use chrono::Utc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    auth::{AuthService, SessionGuard},
    openapi::ApiDoc,
    store::{CredentialStore, SessionStore},
};
pub use config::Config;
pub use types::{SessionId, abbrev_uuid};

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub auth: Arc<AuthService>,
    pub guard: Arc<SessionGuard>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    /// Wire up stores, service and guard from a configuration.
    pub fn from_config(config: Config) -> Self {
        let users = Arc::new(CredentialStore::new(
            config.data.users_dir.clone(),
            config.auth.password.argon2_params(),
        ));
        let sessions = Arc::new(SessionStore::new(config.data.sessions_dir.clone()));
        let auth = Arc::new(AuthService::new(users, sessions.clone()));
        let guard = Arc::new(SessionGuard::new(sessions.clone(), config.auth.session.timeout));

        AppState::builder()
            .config(config)
            .auth(auth)
            .guard(guard)
            .sessions(sessions)
            .build()
    }
}

/// The HTTP server and its background work.
pub struct Application {
    state: AppState,
}

impl Application {
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            state: AppState::from_config(config),
        })
    }

    /// Assemble the router for the given state.
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/auth/signup", post(api::handlers::auth::signup))
            .route("/auth/login", post(api::handlers::auth::login))
            .route("/auth/logout", post(api::handlers::auth::logout))
            .route("/dashboard", get(api::handlers::session::dashboard))
            .route("/session", get(api::handlers::session::session_status))
            .route("/health", get(api::handlers::health::health))
            .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                    .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
            )
            .with_state(state)
    }

    /// Serve until the shutdown future resolves.
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let sweeper = spawn_session_sweeper(&self.state);

        let listener = TcpListener::bind(self.state.config.bind_address()).await?;
        info!("Listening on {}", listener.local_addr()?);

        let router = Self::router(self.state);
        axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;

        if let Some(handle) = sweeper {
            handle.abort();
        }
        info!("Shutdown complete");
        Ok(())
    }
}

/// Periodically clear session records whose window has lapsed.
///
/// Purely housekeeping: the guard rejects and removes expired records on
/// access whether or not the sweeper ever runs.
fn spawn_session_sweeper(state: &AppState) -> Option<tokio::task::JoinHandle<()>> {
    let session_config = &state.config.auth.session;
    if !session_config.sweep.enabled {
        return None;
    }

    let sessions = state.sessions.clone();
    let timeout = session_config.timeout;
    let interval = session_config.sweep.interval;
    info!(interval = ?interval, "Session sweeper enabled");

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sessions.sweep_expired(Utc::now(), timeout).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Swept expired sessions"),
                Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
            }
        }
    }))
}
