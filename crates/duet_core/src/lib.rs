//! Core domain logic for Duet, a shared gallery and notes space for couples.
//! This crate is the single source of truth for pairing and data-scoping rules.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod upload;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::content::{GalleryItem, GalleryItemId, WordId, WordItem};
pub use model::couple::{Couple, CoupleId};
pub use model::identity::{Identity, IdentityError};
pub use model::proposal::{Answer, Proposal};
pub use model::session::{SessionContext, SessionError};
pub use repo::couple_repo::{
    CoupleRepository, CoupleResolution, DissolveReport, SqliteCoupleRepository,
};
pub use repo::gallery_repo::{GalleryRepository, SqliteGalleryRepository};
pub use repo::words_repo::{SqliteWordsRepository, WordsRepository};
pub use repo::{RepoError, RepoResult};
pub use service::couple_service::{CoupleService, CoupleServiceError};
pub use service::gallery_service::{
    GalleryService, GalleryServiceError, GALLERY_CAPACITY, GALLERY_PAGE_SIZE,
};
pub use service::words_service::{WordsService, WordsServiceError, WORDS_PAGE_SIZE};
pub use upload::{UploadError, UploadStore, ALLOWED_EXTENSIONS};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
