//! Browser sessions and login gating.
//!
//! # Responsibility
//! - Keep one `SessionContext` per browser, keyed by a random id in a cookie.
//! - Gate couple-scoped routes and hand handlers a resolved `CoupleScope`.
//!
//! # Invariants
//! - Session state lives only in this process; a restart logs everyone out.
//! - Entries idle longer than the TTL are treated as absent.
//! - The store lock is never held across an `.await`.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use duet_core::{
    CoupleId, CoupleService, CoupleServiceError, Identity, SessionContext,
    SqliteCoupleRepository,
};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "duet_session";

/// Opaque 128-bit random session key, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accepts only the shape `generate` produces.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == 32 && raw.bytes().all(|byte| byte.is_ascii_hexdigit());
        valid.then(|| Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct SessionEntry {
    context: SessionContext,
    last_seen: Instant,
}

pub struct SessionStore {
    entries: Mutex<HashMap<SessionId, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SessionId, SessionEntry>>, AppError> {
        self.entries
            .lock()
            .map_err(|_| AppError::Internal("session store lock poisoned".to_string()))
    }

    /// Stores `context` under a fresh id.
    pub fn create(&self, context: SessionContext) -> Result<SessionId, AppError> {
        let session_id = SessionId::generate();
        self.lock()?.insert(
            session_id.clone(),
            SessionEntry {
                context,
                last_seen: Instant::now(),
            },
        );
        Ok(session_id)
    }

    /// Returns the live context and refreshes its idle timer.
    pub fn load(&self, session_id: &SessionId) -> Result<Option<SessionContext>, AppError> {
        self.update(session_id, |context| context.clone())
    }

    /// Runs `transition` on the live context while the store lock is held,
    /// so concurrent requests on one session never overwrite each other.
    /// Returns `None` when the session is unknown or has expired.
    pub fn update<T>(
        &self,
        session_id: &SessionId,
        transition: impl FnOnce(&mut SessionContext) -> T,
    ) -> Result<Option<T>, AppError> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        match entries.get_mut(session_id) {
            Some(entry) if now.duration_since(entry.last_seen) <= self.ttl => {
                entry.last_seen = now;
                Ok(Some(transition(&mut entry.context)))
            }
            Some(_) => {
                entries.remove(session_id);
                debug!("event=session_expired module=session status=ok");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn remove(&self, session_id: &SessionId) -> Result<(), AppError> {
        self.lock()?.remove(session_id);
        Ok(())
    }

    /// Drops idle entries; returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, AppError> {
        let mut entries = self.lock()?;
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, entry| now.duration_since(entry.last_seen) <= self.ttl);
        let purged = before - entries.len();
        if purged > 0 {
            info!("event=session_purge module=session status=ok purged={purged}");
        }
        Ok(purged)
    }

    pub fn active_count(&self) -> Result<usize, AppError> {
        Ok(self.lock()?.len())
    }

    /// Session named by the request cookie, if it is still live.
    pub fn from_headers(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<(SessionId, SessionContext)>, AppError> {
        let Some(session_id) = session_id_from_headers(headers) else {
            return Ok(None);
        };
        Ok(self
            .load(&session_id)?
            .map(|context| (session_id, context)))
    }
}

pub fn session_id_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| SessionId::parse(value.trim()))
}

/// `Set-Cookie` value binding the browser to `session_id`.
pub fn session_cookie(session_id: &SessionId, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={}; HttpOnly; SameSite=Lax; Path=/",
        session_id.as_str()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Resolved caller of a couple-scoped route.
#[derive(Debug, Clone)]
pub struct CoupleScope {
    pub session_id: SessionId,
    pub identity: Identity,
    pub couple_id: CoupleId,
}

/// Lets the request through only with a verified identity, resolving and
/// caching its couple on the first gated request of the session.
///
/// A cached couple is re-checked on every request. Once the caller no longer
/// occupies a member slot (removed or replaced as partner) the session is
/// re-resolved instead of keeping access to the old couple.
pub async fn require_couple(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (session_id, context) = state
        .sessions
        .from_headers(request.headers())?
        .ok_or(AppError::Unauthenticated)?;

    let (identity, cached) = match context {
        SessionContext::Paired {
            identity,
            couple_id,
        } => (identity, Some(couple_id)),
        SessionContext::Authenticated { identity } => (identity, None),
        SessionContext::Anonymous { .. } => return Err(AppError::Unauthenticated),
    };

    let couple_id = state.with_conn(|conn| {
        let couples = CoupleService::new(SqliteCoupleRepository::try_new(conn)?);
        if let Some(couple_id) = cached {
            let still_member = match couples.get_couple(couple_id) {
                Ok(couple) => couple.has_member(&identity),
                Err(CoupleServiceError::CoupleNotFound(_)) => false,
                Err(err) => return Err(err.into()),
            };
            if still_member {
                return Ok(couple_id);
            }
            info!(
                "event=session_repair module=session status=ok stale_couple_id={} identity_domain={}",
                couple_id,
                identity.domain()
            );
        }
        Ok(couples.resolve_or_create(&identity)?)
    })?;

    if cached != Some(couple_id) {
        // A logout that landed meanwhile wins over the upgrade.
        let upgraded = state
            .sessions
            .update(&session_id, |current| {
                current.identity() == Some(&identity) && current.pair(couple_id).is_ok()
            })?
            .unwrap_or(false);
        if !upgraded {
            return Err(AppError::Unauthenticated);
        }
    }

    request.extensions_mut().insert(CoupleScope {
        session_id,
        identity,
        couple_id,
    });
    Ok(next.run(request).await)
}
