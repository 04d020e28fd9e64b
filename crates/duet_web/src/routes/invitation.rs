use crate::error::AppError;
use crate::invitation::ExternalServiceError;
use crate::pages::{self, Notice};
use crate::session::CoupleScope;
use crate::state::AppState;
use axum::extract::State;
use axum::response::Html;
use axum::{Extension, Form};
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct InvitationForm {
    #[serde(default)]
    prompt: String,
}

pub async fn show() -> Html<String> {
    pages::invitation(None, None)
}

/// Failures of the image service are shown on the page, never raised.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Extension(scope): Extension<CoupleScope>,
    Form(form): Form<InvitationForm>,
) -> Result<Html<String>, AppError> {
    let prompt = form.prompt.trim();
    if prompt.is_empty() {
        return Ok(pages::invitation(
            None,
            Some(&Notice::error("Please describe the invitation first.")),
        ));
    }

    match state.images.generate(prompt).await {
        Ok(url) => {
            info!(
                "event=invitation_generate module=invitation status=ok couple_id={}",
                scope.couple_id
            );
            Ok(pages::invitation(Some(&url), None))
        }
        Err(err) => {
            warn!(
                "event=invitation_generate module=invitation status=error couple_id={} error={}",
                scope.couple_id, err
            );
            let message = match err {
                ExternalServiceError::NotConfigured => {
                    "Invitation images are not available right now.".to_string()
                }
                other => format!("Could not generate the invitation: {other}"),
            };
            Ok(pages::invitation(None, Some(&Notice::error(message))))
        }
    }
}
