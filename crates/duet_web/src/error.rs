//! Request-fatal errors and their HTTP mapping.
//!
//! Validation, capacity and external-service failures are not here: handlers
//! render those inline on the page that caused them.

use crate::identity::AuthenticationError;
use crate::pages;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use duet_core::{
    CoupleServiceError, GalleryServiceError, RepoError, SessionError, UploadError,
    WordsServiceError,
};
use log::{error, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const ERROR_LOGIN_PATH: &str = "/error-login";

#[derive(Debug)]
pub enum AppError {
    /// No verified identity on the session.
    Unauthenticated,
    /// The identity provider rejected or failed the login.
    Authentication(String),
    /// Form or multipart body could not be read.
    MalformedPayload(String),
    NotFound,
    /// Storage and other failures that abort the request.
    Internal(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "not logged in"),
            Self::Authentication(reason) => write!(f, "authentication failed: {reason}"),
            Self::MalformedPayload(reason) => write!(f, "malformed payload: {reason}"),
            Self::NotFound => write!(f, "not found"),
            Self::Internal(reason) => write!(f, "internal error: {reason}"),
        }
    }
}

impl Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => Redirect::to(ERROR_LOGIN_PATH).into_response(),
            Self::Authentication(reason) => {
                warn!("event=login module=auth status=error reason={reason}");
                Redirect::to(ERROR_LOGIN_PATH).into_response()
            }
            Self::MalformedPayload(reason) => (
                StatusCode::BAD_REQUEST,
                pages::message_page("Bad request", &reason),
            )
                .into_response(),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                pages::message_page("Not found", "There is nothing here."),
            )
                .into_response(),
            Self::Internal(reason) => {
                error!("event=request module=web status=error error={reason}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    pages::message_page("Something went wrong", "Please try again later."),
                )
                    .into_response()
            }
        }
    }
}

impl From<RepoError> for AppError {
    fn from(value: RepoError) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<UploadError> for AppError {
    fn from(value: UploadError) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<SessionError> for AppError {
    fn from(_: SessionError) -> Self {
        Self::Unauthenticated
    }
}

impl From<CoupleServiceError> for AppError {
    fn from(value: CoupleServiceError) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<GalleryServiceError> for AppError {
    fn from(value: GalleryServiceError) -> Self {
        match value {
            GalleryServiceError::ItemNotFound(_) => Self::NotFound,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<WordsServiceError> for AppError {
    fn from(value: WordsServiceError) -> Self {
        match value {
            WordsServiceError::WordNotFound(_) => Self::NotFound,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<AuthenticationError> for AppError {
    fn from(value: AuthenticationError) -> Self {
        Self::Authentication(value.to_string())
    }
}
