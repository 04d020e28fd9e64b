//! Gallery use-case service.
//!
//! # Responsibility
//! - Validate uploads, persist the file, then record it for the couple.
//! - List and delete a couple's photos.
//!
//! # Invariants
//! - A couple never holds more than `GALLERY_CAPACITY` items.
//! - The file is on disk before its record is visible.
//! - A rejected upload leaves no file behind.

use crate::model::content::{GalleryItem, GalleryItemId};
use crate::model::couple::CoupleId;
use crate::repo::gallery_repo::GalleryRepository;
use crate::repo::RepoError;
use crate::upload::{UploadError, UploadStore};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Live items allowed per couple.
pub const GALLERY_CAPACITY: u32 = 10;
/// Items returned by one listing.
pub const GALLERY_PAGE_SIZE: u32 = 10;

/// Service error for gallery use-cases.
#[derive(Debug)]
pub enum GalleryServiceError {
    /// Bad file type or empty upload; nothing was stored.
    Validation(UploadError),
    /// The couple already holds `limit` items; nothing was stored.
    Capacity { limit: u32 },
    ItemNotFound(GalleryItemId),
    /// Storage failure while writing or removing the file.
    Upload(UploadError),
    Repo(RepoError),
}

impl Display for GalleryServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Capacity { limit } => write!(
                f,
                "the gallery is full ({limit} photos); delete one before uploading another"
            ),
            Self::ItemNotFound(item_id) => write!(f, "photo not found: {item_id}"),
            Self::Upload(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GalleryServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) | Self::Upload(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<UploadError> for GalleryServiceError {
    fn from(value: UploadError) -> Self {
        match value {
            UploadError::EmptyFile | UploadError::UnsupportedExtension(_) => {
                Self::Validation(value)
            }
            other => Self::Upload(other),
        }
    }
}

impl From<RepoError> for GalleryServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::ItemNotFound(id),
            RepoError::CapacityExceeded { limit } => Self::Capacity { limit },
            RepoError::Upload(err) => Self::Upload(err),
            other => Self::Repo(other),
        }
    }
}

/// Gallery service over a repository and the upload directory.
pub struct GalleryService<'files, R: GalleryRepository> {
    repo: R,
    files: &'files UploadStore,
}

impl<'files, R: GalleryRepository> GalleryService<'files, R> {
    pub fn new(repo: R, files: &'files UploadStore) -> Self {
        Self { repo, files }
    }

    /// Newest photos of the couple, at most `GALLERY_PAGE_SIZE`.
    pub fn list(&self, couple_id: CoupleId) -> Result<Vec<GalleryItem>, GalleryServiceError> {
        Ok(self.repo.list_items(couple_id, GALLERY_PAGE_SIZE)?)
    }

    /// Stores an uploaded photo for the couple.
    ///
    /// Order: validate, capacity pre-check, write file, guarded insert. If the
    /// guarded insert fails the file is removed again.
    pub fn upload(
        &self,
        couple_id: CoupleId,
        original_name: &str,
        bytes: &[u8],
        note: &str,
    ) -> Result<GalleryItem, GalleryServiceError> {
        UploadStore::validate(original_name, bytes)?;
        if self.repo.count_items(couple_id)? >= GALLERY_CAPACITY {
            return Err(GalleryServiceError::Capacity {
                limit: GALLERY_CAPACITY,
            });
        }

        let stored_name = self.files.persist(original_name, bytes)?;
        match self
            .repo
            .insert_within_capacity(couple_id, &stored_name, note, GALLERY_CAPACITY)
        {
            Ok(item) => {
                info!(
                    "event=gallery_upload module=gallery status=ok couple_id={} item_id={} bytes={}",
                    couple_id,
                    item.id,
                    bytes.len()
                );
                Ok(item)
            }
            Err(err) => {
                if let Err(cleanup_err) = self.files.remove(&stored_name) {
                    warn!(
                        "event=gallery_upload module=gallery status=error couple_id={} error_code=orphan_cleanup_failed error={}",
                        couple_id, cleanup_err
                    );
                }
                Err(err.into())
            }
        }
    }

    /// Deletes one photo of the couple, file first.
    pub fn delete(
        &self,
        couple_id: CoupleId,
        item_id: GalleryItemId,
    ) -> Result<GalleryItem, GalleryServiceError> {
        let item = self.repo.delete_item(couple_id, item_id, self.files)?;
        info!(
            "event=gallery_delete module=gallery status=ok couple_id={} item_id={}",
            couple_id, item.id
        );
        Ok(item)
    }

    /// Returns whether the stored `filename` belongs to the couple.
    pub fn owns_file(&self, couple_id: CoupleId, filename: &str) -> Result<bool, GalleryServiceError> {
        Ok(self.repo.owns_file(couple_id, filename)?)
    }

    pub fn get(
        &self,
        couple_id: CoupleId,
        item_id: GalleryItemId,
    ) -> Result<GalleryItem, GalleryServiceError> {
        self.repo
            .get_item(couple_id, item_id)?
            .ok_or(GalleryServiceError::ItemNotFound(item_id))
    }
}
