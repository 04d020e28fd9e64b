//! Couple-scoped content records.

use crate::model::couple::CoupleId;
use serde::{Deserialize, Serialize};

pub type GalleryItemId = i64;
pub type WordId = i64;

/// One uploaded photo and its caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryItem {
    /// Monotonic row id; doubles as creation order.
    pub id: GalleryItemId,
    pub couple_id: CoupleId,
    /// Stored file name inside the upload directory, never the user-supplied name.
    pub filename: String,
    pub note: String,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// One short text note ("words together").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordItem {
    pub id: WordId,
    pub couple_id: CoupleId,
    /// Exactly as submitted; only the emptiness check trims.
    pub text: String,
    pub created_at: i64,
}
