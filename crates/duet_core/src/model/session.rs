//! Per-browser-session state machine.
//!
//! # Responsibility
//! - Carry the caller's identity and resolved couple id across requests.
//! - Make every transition explicit so handlers never mutate session fields ad hoc.
//!
//! # Invariants
//! - `Anonymous -> Authenticated` only through `authenticate`.
//! - `Authenticated -> Paired` only through `pair`, which keeps the identity.
//! - `logout` discards every cached field, including a pending OAuth state.

use crate::model::couple::CoupleId;
use crate::model::identity::Identity;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionContext {
    /// No verified identity. May hold the CSRF `state` of an in-flight OAuth login.
    Anonymous { pending_oauth_state: Option<String> },
    /// Identity verified, couple not resolved yet.
    Authenticated { identity: Identity },
    /// Identity verified and couple id cached for the rest of the session.
    Paired {
        identity: Identity,
        couple_id: CoupleId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    NotAuthenticated,
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "session has no verified identity"),
        }
    }
}

impl Error for SessionError {}

impl Default for SessionContext {
    fn default() -> Self {
        Self::Anonymous {
            pending_oauth_state: None,
        }
    }
}

impl SessionContext {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Anonymous { .. } => None,
            Self::Authenticated { identity } | Self::Paired { identity, .. } => Some(identity),
        }
    }

    pub fn couple_id(&self) -> Option<CoupleId> {
        match self {
            Self::Paired { couple_id, .. } => Some(*couple_id),
            _ => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous { .. })
    }

    /// Records the OAuth `state` sent to the provider. Any previous identity is dropped.
    pub fn begin_login(&mut self, oauth_state: impl Into<String>) {
        *self = Self::Anonymous {
            pending_oauth_state: Some(oauth_state.into()),
        };
    }

    /// Removes and returns the pending OAuth `state`, if any.
    pub fn take_pending_oauth_state(&mut self) -> Option<String> {
        match self {
            Self::Anonymous {
                pending_oauth_state,
            } => pending_oauth_state.take(),
            _ => None,
        }
    }

    pub fn authenticate(&mut self, identity: Identity) {
        *self = Self::Authenticated { identity };
    }

    /// Caches the resolved couple id.
    pub fn pair(&mut self, couple_id: CoupleId) -> Result<(), SessionError> {
        let identity = self
            .identity()
            .cloned()
            .ok_or(SessionError::NotAuthenticated)?;
        *self = Self::Paired {
            identity,
            couple_id,
        };
        Ok(())
    }

    /// Drops the cached couple id so the next gated request re-resolves it.
    pub fn unpair(&mut self) {
        if let Self::Paired { identity, .. } = self {
            *self = Self::Authenticated {
                identity: identity.clone(),
            };
        }
    }

    pub fn logout(&mut self) {
        *self = Self::default();
    }
}
