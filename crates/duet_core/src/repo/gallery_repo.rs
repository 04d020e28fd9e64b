//! Gallery repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist couple-scoped image records.
//! - Enforce the per-couple item ceiling at insert time.
//! - Delete a record together with its stored file.
//!
//! # Invariants
//! - All queries are constrained to one `couple_id`.
//! - `insert_within_capacity` counts and inserts in one `IMMEDIATE` transaction.
//! - `delete_item` stages the file before the row delete and purges it only
//!   after commit.

use crate::db::now_epoch_ms;
use crate::model::content::{GalleryItem, GalleryItemId};
use crate::model::couple::CoupleId;
use crate::repo::{ensure_table, RepoError, RepoResult};
use crate::upload::UploadStore;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const IMAGE_SELECT_SQL: &str = "SELECT id, couple_id, filename, note, created_at FROM images";

/// Repository interface for gallery records.
pub trait GalleryRepository {
    fn count_items(&self, couple_id: CoupleId) -> RepoResult<u32>;
    /// Newest first, at most `limit` rows.
    fn list_items(&self, couple_id: CoupleId, limit: u32) -> RepoResult<Vec<GalleryItem>>;
    fn get_item(&self, couple_id: CoupleId, item_id: GalleryItemId)
        -> RepoResult<Option<GalleryItem>>;
    /// Returns whether `filename` is a stored image of the couple.
    fn owns_file(&self, couple_id: CoupleId, filename: &str) -> RepoResult<bool>;
    /// Inserts a record unless the couple already holds `capacity` items.
    fn insert_within_capacity(
        &self,
        couple_id: CoupleId,
        filename: &str,
        note: &str,
        capacity: u32,
    ) -> RepoResult<GalleryItem>;
    /// Deletes the record and its stored file.
    fn delete_item(
        &self,
        couple_id: CoupleId,
        item_id: GalleryItemId,
        files: &UploadStore,
    ) -> RepoResult<GalleryItem>;
}

/// SQLite-backed gallery repository.
pub struct SqliteGalleryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGalleryRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table(
            conn,
            "images",
            &["id", "filename", "note", "couple_id", "created_at"],
        )?;
        Ok(Self { conn })
    }
}

impl GalleryRepository for SqliteGalleryRepository<'_> {
    fn count_items(&self, couple_id: CoupleId) -> RepoResult<u32> {
        count_in(self.conn, couple_id)
    }

    fn list_items(&self, couple_id: CoupleId, limit: u32) -> RepoResult<Vec<GalleryItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{IMAGE_SELECT_SQL}
             WHERE couple_id = ?1
             ORDER BY id DESC
             LIMIT ?2;"
        ))?;
        let mut rows = stmt.query(params![couple_id, i64::from(limit)])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_image_row(row)?);
        }
        Ok(items)
    }

    fn get_item(
        &self,
        couple_id: CoupleId,
        item_id: GalleryItemId,
    ) -> RepoResult<Option<GalleryItem>> {
        get_in(self.conn, couple_id, item_id)
    }

    fn owns_file(&self, couple_id: CoupleId, filename: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM images WHERE couple_id = ?1 AND filename = ?2
            );",
            params![couple_id, filename],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn insert_within_capacity(
        &self,
        couple_id: CoupleId,
        filename: &str,
        note: &str,
        capacity: u32,
    ) -> RepoResult<GalleryItem> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if count_in(&tx, couple_id)? >= capacity {
            return Err(RepoError::CapacityExceeded { limit: capacity });
        }

        let created_at = now_epoch_ms();
        tx.execute(
            "INSERT INTO images (filename, note, couple_id, created_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![filename, note, couple_id, created_at],
        )?;
        let item = GalleryItem {
            id: tx.last_insert_rowid(),
            couple_id,
            filename: filename.to_string(),
            note: note.to_string(),
            created_at,
        };
        tx.commit()?;

        Ok(item)
    }

    fn delete_item(
        &self,
        couple_id: CoupleId,
        item_id: GalleryItemId,
        files: &UploadStore,
    ) -> RepoResult<GalleryItem> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let item = get_in(&tx, couple_id, item_id)?.ok_or(RepoError::NotFound {
            entity: "gallery item",
            id: item_id,
        })?;

        let staged = files.stage_removal(&[item.filename.as_str()])?;
        tx.execute(
            "DELETE FROM images WHERE id = ?1 AND couple_id = ?2;",
            params![item_id, couple_id],
        )?;
        tx.commit()?;
        staged.purge();

        Ok(item)
    }
}

fn count_in(conn: &Connection, couple_id: CoupleId) -> RepoResult<u32> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM images WHERE couple_id = ?1;",
        [couple_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn get_in(
    conn: &Connection,
    couple_id: CoupleId,
    item_id: GalleryItemId,
) -> RepoResult<Option<GalleryItem>> {
    let item = conn
        .query_row(
            &format!("{IMAGE_SELECT_SQL} WHERE id = ?1 AND couple_id = ?2;"),
            params![item_id, couple_id],
            |row| Ok(parse_image_row(row)),
        )
        .optional()?;
    item.transpose()
}

fn parse_image_row(row: &Row<'_>) -> RepoResult<GalleryItem> {
    let item = GalleryItem {
        id: row.get("id")?,
        couple_id: row.get("couple_id")?,
        filename: row.get("filename")?,
        note: row.get("note")?,
        created_at: row.get("created_at")?,
    };
    if item.filename.is_empty() {
        return Err(RepoError::InvalidData(format!(
            "empty filename in images.id={}",
            item.id
        )));
    }
    Ok(item)
}
