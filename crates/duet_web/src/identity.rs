//! OAuth identity resolution.
//!
//! # Responsibility
//! - Build the provider consent URL for a login attempt.
//! - Turn the authorization code from the callback into a verified email.
//!
//! # Invariants
//! - Single attempt per call; failures are returned, never retried.
//! - Only a verified email becomes an `Identity`.

use crate::config::OAuthConfig;
use async_trait::async_trait;
use duet_core::{Identity, IdentityError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const SCOPES: &str = "openid email";

#[derive(Debug)]
pub enum AuthenticationError {
    /// Transport failure, timeout, or non-2xx status from the provider.
    Provider { stage: &'static str, details: String },
    MissingEmail,
    UnverifiedEmail,
    InvalidIdentity(IdentityError),
}

impl Display for AuthenticationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provider { stage, details } => write!(f, "{stage} failed: {details}"),
            Self::MissingEmail => write!(f, "provider returned no email"),
            Self::UnverifiedEmail => write!(f, "provider email is not verified"),
            Self::InvalidIdentity(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthenticationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidIdentity(err) => Some(err),
            _ => None,
        }
    }
}

/// Verifies who is logging in.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Consent URL carrying the CSRF `state` the callback must echo back.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchanges an authorization code for the caller's verified email.
    async fn resolve(&self, code: &str) -> Result<Identity, AuthenticationError>;
}

/// Authorization-code flow against a standard OAuth 2.0 / OIDC provider.
pub struct OAuthIdentityProvider {
    http_client: reqwest::Client,
    config: OAuthConfig,
    redirect_uri: String,
}

impl OAuthIdentityProvider {
    pub fn new(config: OAuthConfig, redirect_uri: String) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http_client,
            config,
            redirect_uri,
        })
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AuthenticationError> {
        #[derive(Serialize)]
        struct TokenRequest<'a> {
            grant_type: &'a str,
            code: &'a str,
            client_id: &'a str,
            client_secret: &'a str,
            redirect_uri: &'a str,
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let request = TokenRequest {
            grant_type: "authorization_code",
            code,
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
            redirect_uri: &self.redirect_uri,
        };

        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&request)
            .send()
            .await
            .map_err(|err| provider_error("token exchange", err))?;

        if !response.status().is_success() {
            return Err(AuthenticationError::Provider {
                stage: "token exchange",
                details: format!("status {}", response.status()),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| provider_error("token exchange", err))?;
        if token.access_token.trim().is_empty() {
            return Err(AuthenticationError::Provider {
                stage: "token exchange",
                details: "empty access_token".to_string(),
            });
        }
        Ok(token.access_token)
    }

    async fn fetch_email(&self, access_token: &str) -> Result<Identity, AuthenticationError> {
        #[derive(Deserialize)]
        struct UserInfo {
            email: Option<String>,
            email_verified: Option<bool>,
        }

        let response = self
            .http_client
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| provider_error("userinfo", err))?;

        if !response.status().is_success() {
            return Err(AuthenticationError::Provider {
                stage: "userinfo",
                details: format!("status {}", response.status()),
            });
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|err| provider_error("userinfo", err))?;
        verified_identity(info.email, info.email_verified)
    }
}

#[async_trait]
impl IdentityProvider for OAuthIdentityProvider {
    fn authorize_url(&self, state: &str) -> String {
        let params = [
            ("response_type", "code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", SCOPES),
            ("state", state),
        ];
        let query = serde_urlencoded::to_string(params).unwrap_or_default();
        format!("{}?{query}", self.config.authorize_url)
    }

    async fn resolve(&self, code: &str) -> Result<Identity, AuthenticationError> {
        let access_token = self.exchange_code(code).await?;
        self.fetch_email(&access_token).await
    }
}

fn provider_error(stage: &'static str, err: reqwest::Error) -> AuthenticationError {
    AuthenticationError::Provider {
        stage,
        details: err.to_string(),
    }
}

/// Providers that omit `email_verified` are trusted; an explicit `false` is not.
fn verified_identity(
    email: Option<String>,
    email_verified: Option<bool>,
) -> Result<Identity, AuthenticationError> {
    let email = email.ok_or(AuthenticationError::MissingEmail)?;
    if email_verified == Some(false) {
        return Err(AuthenticationError::UnverifiedEmail);
    }
    Identity::parse(&email).map_err(AuthenticationError::InvalidIdentity)
}
