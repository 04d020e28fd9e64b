use crate::error::AppError;
use crate::identity::IdentityProvider;
use crate::invitation::ImageGenerator;
use crate::session::SessionStore;
use duet_core::UploadStore;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// Shared handler state.
///
/// One SQLite connection per process; cross-process writers are serialized by
/// `IMMEDIATE` transactions in the repositories.
pub struct AppState {
    db: Mutex<Connection>,
    pub files: UploadStore,
    pub sessions: SessionStore,
    pub identity: Arc<dyn IdentityProvider>,
    pub images: Arc<dyn ImageGenerator>,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(
        conn: Connection,
        files: UploadStore,
        sessions: SessionStore,
        identity: Arc<dyn IdentityProvider>,
        images: Arc<dyn ImageGenerator>,
        secure_cookies: bool,
    ) -> Self {
        Self {
            db: Mutex::new(conn),
            files,
            sessions,
            identity,
            images,
            secure_cookies,
        }
    }

    /// Runs synchronous DB work under the connection lock.
    ///
    /// Callers must not `.await` inside `f`.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let conn = self
            .db
            .lock()
            .map_err(|_| AppError::Internal("database lock poisoned".to_string()))?;
        f(&conn)
    }
}
