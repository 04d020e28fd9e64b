//! OAuth login, callback and logout.
//!
//! The callback rotates the session id so a pre-login cookie never becomes
//! an authenticated one.

use crate::error::AppError;
use crate::session::{session_cookie, session_id_from_headers};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use duet_core::SessionContext;
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let oauth_state = Uuid::new_v4().simple().to_string();

    let existing = match session_id_from_headers(&headers) {
        Some(session_id) => state
            .sessions
            .update(&session_id, |context| context.begin_login(oauth_state.as_str()))?
            .map(|()| session_id),
        None => None,
    };
    let session_id = match existing {
        Some(session_id) => session_id,
        None => {
            let mut context = SessionContext::default();
            context.begin_login(oauth_state.as_str());
            state.sessions.create(context)?
        }
    };

    info!("event=login_start module=auth status=ok");
    Ok((
        AppendHeaders([(
            SET_COOKIE,
            session_cookie(&session_id, state.secure_cookies),
        )]),
        Redirect::to(&state.identity.authorize_url(&oauth_state)),
    )
        .into_response())
}

pub async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    let missing_session = || AppError::Authentication("callback without a session".to_string());
    let session_id = session_id_from_headers(&headers).ok_or_else(missing_session)?;

    // The pending state is single use, whatever the outcome.
    let expected = state
        .sessions
        .update(&session_id, SessionContext::take_pending_oauth_state)?
        .ok_or_else(missing_session)?;

    if let Some(error) = params.error {
        return Err(AppError::Authentication(format!("provider error: {error}")));
    }
    match (expected, params.state) {
        (Some(expected), Some(received)) if expected == received => {}
        _ => {
            warn!("event=login module=auth status=error error_code=state_mismatch");
            return Err(AppError::Authentication("oauth state mismatch".to_string()));
        }
    }
    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::Authentication("missing authorization code".to_string()))?;

    let identity = state.identity.resolve(&code).await?;
    info!(
        "event=login module=auth status=ok identity_domain={}",
        identity.domain()
    );

    let mut context = SessionContext::default();
    context.authenticate(identity);
    state.sessions.remove(&session_id)?;
    let session_id = state.sessions.create(context)?;

    Ok((
        AppendHeaders([(
            SET_COOKIE,
            session_cookie(&session_id, state.secure_cookies),
        )]),
        Redirect::to("/gallery"),
    )
        .into_response())
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Redirect, AppError> {
    if let Some(session_id) = session_id_from_headers(&headers) {
        if state
            .sessions
            .update(&session_id, SessionContext::logout)?
            .is_some()
        {
            info!("event=logout module=auth status=ok");
        }
    }
    Ok(Redirect::to("/"))
}
