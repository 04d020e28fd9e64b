use super::parse_id;
use crate::error::AppError;
use crate::pages::{self, Notice};
use crate::session::CoupleScope;
use crate::state::AppState;
use axum::extract::State;
use axum::response::Html;
use axum::{Extension, Form};
use duet_core::{SqliteWordsRepository, WordsService, WordsServiceError};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct WordsForm {
    action: String,
    text: Option<String>,
    word_id: Option<String>,
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    Extension(scope): Extension<CoupleScope>,
) -> Result<Html<String>, AppError> {
    render(&state, &scope, None)
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Extension(scope): Extension<CoupleScope>,
    Form(form): Form<WordsForm>,
) -> Result<Html<String>, AppError> {
    let notice = state.with_conn(|conn| {
        let words = WordsService::new(SqliteWordsRepository::try_new(conn)?);
        match form.action.as_str() {
            "add" => match words.add(scope.couple_id, form.text.as_deref().unwrap_or_default()) {
                Ok(_) => Ok(Notice::info("Saved.")),
                Err(err @ WordsServiceError::EmptyText) => Ok(Notice::error(err.to_string())),
                Err(err) => Err(err.into()),
            },
            "delete" => {
                let word_id = parse_id(form.word_id.as_deref(), "word_id")?;
                words.delete(scope.couple_id, word_id)?;
                Ok(Notice::info("Deleted."))
            }
            _ => Err(AppError::MalformedPayload("unknown words action".to_string())),
        }
    })?;

    render(&state, &scope, Some(&notice))
}

fn render(
    state: &AppState,
    scope: &CoupleScope,
    notice: Option<&Notice>,
) -> Result<Html<String>, AppError> {
    let items = state.with_conn(|conn| {
        let words = WordsService::new(SqliteWordsRepository::try_new(conn)?);
        Ok(words.list(scope.couple_id)?)
    })?;
    Ok(pages::words(&items, notice))
}
