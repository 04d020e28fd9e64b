//! HTTP surface of Duet: a shared photo gallery and notes space for couples.
//!
//! # Layout
//! - `config`: environment-driven settings.
//! - `session`: in-process session store and the couple gate middleware.
//! - `identity` / `invitation`: outbound OAuth and image-generation clients.
//! - `routes` / `pages`: handlers and their HTML.
//!
//! Pairing and data-scoping rules live in `duet_core`; this crate only wires
//! them to requests.

pub mod config;
pub mod error;
pub mod identity;
pub mod invitation;
pub mod pages;
pub mod routes;
pub mod session;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use config::Config;
use duet_core::db::DbError;
use duet_core::{UploadError, UploadStore};
use identity::OAuthIdentityProvider;
use invitation::OpenAiImageClient;
use log::{error, info, warn};
use routes::{auth, gallery, invitation as invitation_routes, partner, public, words};
use session::{require_couple, SessionStore};
use state::AppState;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Builds the application router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let gated = Router::new()
        .route(
            "/gallery",
            get(gallery::show)
                .post(gallery::submit)
                .layer(DefaultBodyLimit::max(gallery::MAX_UPLOAD_BYTES)),
        )
        .route("/uploads/:name", get(gallery::serve_upload))
        .route("/words-together", get(words::show).post(words::submit))
        .route("/profile", get(partner::profile))
        .route("/add-partner", post(partner::add_partner))
        .route(
            "/partner-management",
            get(partner::management).post(partner::manage),
        )
        .route(
            "/generate-invitation",
            get(invitation_routes::show).post(invitation_routes::generate),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_couple,
        ));

    Router::new()
        .route("/", get(public::home))
        .route("/ask-girl", get(public::ask_girl).post(public::answer_girl))
        .route(
            "/ask-boyfriend",
            get(public::ask_boyfriend).post(public::answer_boyfriend),
        )
        .route("/our-story", get(public::our_story).post(public::our_story))
        .route("/login", get(auth::login))
        .route("/login/callback", get(auth::callback))
        .route("/logout", get(auth::logout))
        .route("/error-login", get(public::error_login))
        .merge(gated)
        .with_state(state)
}

/// Error returned when the server cannot start.
#[derive(Debug)]
pub enum StartupError {
    Database(DbError),
    Uploads(UploadError),
    HttpClient(reqwest::Error),
    Bind(io::Error),
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Database(err) => write!(f, "database init failed: {err}"),
            Self::Uploads(err) => write!(f, "upload directory init failed: {err}"),
            Self::HttpClient(err) => write!(f, "http client init failed: {err}"),
            Self::Bind(err) => write!(f, "server failed: {err}"),
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database(err) => Some(err),
            Self::Uploads(err) => Some(err),
            Self::HttpClient(err) => Some(err),
            Self::Bind(err) => Some(err),
        }
    }
}

impl From<DbError> for StartupError {
    fn from(err: DbError) -> Self {
        Self::Database(err)
    }
}

impl From<UploadError> for StartupError {
    fn from(err: UploadError) -> Self {
        Self::Uploads(err)
    }
}

/// Opens storage, builds the outbound clients, and serves until Ctrl+C or SIGTERM.
pub async fn serve(config: Config) -> Result<(), StartupError> {
    let conn = duet_core::db::open_db(&config.db_path)?;
    let files = UploadStore::open(config.upload_dir.clone())?;
    let identity = OAuthIdentityProvider::new(config.oauth.clone(), config.oauth_redirect_url())
        .map_err(StartupError::HttpClient)?;
    let images =
        OpenAiImageClient::new(config.image.clone()).map_err(StartupError::HttpClient)?;
    if config.image.api_key.is_none() {
        warn!("event=server_start module=server status=degraded reason=image_api_key_missing");
    }

    let state = Arc::new(AppState::new(
        conn,
        files,
        SessionStore::new(config.session_ttl),
        Arc::new(identity),
        Arc::new(images),
        config.secure_cookies(),
    ));
    spawn_session_sweeper(Arc::clone(&state));

    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(StartupError::Bind)?;
    info!("event=server_start module=server status=ok bind={}", config.bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Bind)?;

    info!("event=server_stop module=server status=ok");
    Ok(())
}

fn spawn_session_sweeper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(err) = state.sessions.purge_expired() {
                error!("event=session_purge module=session status=error error={err}");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("event=shutdown module=server status=error error={err}");
            std::future::pending::<()>().await;
        }
        info!("event=shutdown module=server status=ok signal=ctrl_c");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("event=shutdown module=server status=ok signal=terminate");
            }
            Err(err) => {
                error!("event=shutdown module=server status=error error={err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
