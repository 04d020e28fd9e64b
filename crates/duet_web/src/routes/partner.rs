//! Profile and pairing management.

use crate::error::AppError;
use crate::pages::{self, Notice};
use crate::session::CoupleScope;
use crate::state::AppState;
use axum::extract::State;
use axum::response::Html;
use axum::{Extension, Form};
use duet_core::{
    Couple, CoupleService, CoupleServiceError, SessionContext, SqliteCoupleRepository,
};
use log::info;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct AddPartnerForm {
    #[serde(default)]
    partner_email: String,
}

#[derive(Debug, Deserialize)]
pub struct ManagementForm {
    action: String,
}

fn load_couple(state: &AppState, scope: &CoupleScope) -> Result<Couple, AppError> {
    state.with_conn(|conn| {
        let couples = CoupleService::new(SqliteCoupleRepository::try_new(conn)?);
        Ok(couples.get_couple(scope.couple_id)?)
    })
}

pub async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(scope): Extension<CoupleScope>,
) -> Result<Html<String>, AppError> {
    let couple = load_couple(&state, &scope)?;
    Ok(pages::profile(&scope.identity, &couple, None))
}

pub async fn add_partner(
    State(state): State<Arc<AppState>>,
    Extension(scope): Extension<CoupleScope>,
    Form(form): Form<AddPartnerForm>,
) -> Result<Html<String>, AppError> {
    let (couple, notice) = state.with_conn(|conn| {
        let couples = CoupleService::new(SqliteCoupleRepository::try_new(conn)?);
        match couples.add_partner(scope.couple_id, &form.partner_email) {
            Ok(couple) => Ok((couple, Notice::info("Partner saved."))),
            Err(err @ (CoupleServiceError::InvalidPartner(_) | CoupleServiceError::SelfPairing)) => {
                Ok((couples.get_couple(scope.couple_id)?, Notice::error(err.to_string())))
            }
            Err(err) => Err(err.into()),
        }
    })?;

    Ok(pages::profile(&scope.identity, &couple, Some(&notice)))
}

pub async fn management(
    State(state): State<Arc<AppState>>,
    Extension(scope): Extension<CoupleScope>,
) -> Result<Html<String>, AppError> {
    let couple = load_couple(&state, &scope)?;
    Ok(pages::partner_management(&scope.identity, &couple, None))
}

/// `action=remove` dissolves the pairing and purges everything the couple shared.
pub async fn manage(
    State(state): State<Arc<AppState>>,
    Extension(scope): Extension<CoupleScope>,
    Form(form): Form<ManagementForm>,
) -> Result<Html<String>, AppError> {
    if form.action != "remove" {
        return Err(AppError::MalformedPayload(
            "unknown partner action".to_string(),
        ));
    }

    let couple = state.with_conn(|conn| {
        let couples = CoupleService::new(SqliteCoupleRepository::try_new(conn)?);
        couples.dissolve(scope.couple_id, &state.files)?;
        Ok(couples.get_couple(scope.couple_id)?)
    })?;

    // The caller may have been member_b; make the next gated request re-resolve.
    state
        .sessions
        .update(&scope.session_id, SessionContext::unpair)?;
    info!(
        "event=partner_remove module=partner status=ok couple_id={}",
        scope.couple_id
    );

    Ok(pages::partner_management(
        &scope.identity,
        &couple,
        Some(&Notice::info("Partner removed. Your shared photos and notes were deleted.")),
    ))
}
