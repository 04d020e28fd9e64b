use super::logged_in;
use crate::error::AppError;
use crate::pages;
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Html;
use axum::Form;
use duet_core::{Answer, Proposal};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ProposalForm {
    #[serde(default)]
    response: String,
}

pub async fn home(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    Ok(pages::home(logged_in(&state, &headers)?))
}

pub async fn our_story(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    Ok(pages::our_story(logged_in(&state, &headers)?))
}

pub async fn error_login() -> Html<String> {
    pages::error_login()
}

pub async fn ask_girl(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    Ok(pages::proposal(
        Proposal::Girlfriend,
        logged_in(&state, &headers)?,
        None,
    ))
}

pub async fn answer_girl(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<ProposalForm>,
) -> Result<Html<String>, AppError> {
    answer(&state, &headers, Proposal::Girlfriend, &form)
}

pub async fn ask_boyfriend(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    Ok(pages::proposal(
        Proposal::Boyfriend,
        logged_in(&state, &headers)?,
        None,
    ))
}

pub async fn answer_boyfriend(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<ProposalForm>,
) -> Result<Html<String>, AppError> {
    answer(&state, &headers, Proposal::Boyfriend, &form)
}

fn answer(
    state: &AppState,
    headers: &HeaderMap,
    proposal: Proposal,
    form: &ProposalForm,
) -> Result<Html<String>, AppError> {
    let message = proposal.response(Answer::parse(&form.response));
    Ok(pages::proposal(
        proposal,
        logged_in(state, headers)?,
        Some(message),
    ))
}
