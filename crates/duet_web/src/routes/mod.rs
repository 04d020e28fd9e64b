pub mod auth;
pub mod gallery;
pub mod invitation;
pub mod partner;
pub mod public;
pub mod words;

use crate::error::AppError;
use crate::state::AppState;
use axum::http::HeaderMap;

/// Whether the request carries a session with a verified identity.
fn logged_in(state: &AppState, headers: &HeaderMap) -> Result<bool, AppError> {
    Ok(state
        .sessions
        .from_headers(headers)?
        .is_some_and(|(_, context)| !context.is_anonymous()))
}

fn parse_id(raw: Option<&str>, field: &str) -> Result<i64, AppError> {
    raw.and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| AppError::MalformedPayload(format!("missing or invalid {field}")))
}
