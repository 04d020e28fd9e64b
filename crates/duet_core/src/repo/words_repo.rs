//! "Words together" repository contracts and SQLite implementation.
//!
//! # Invariants
//! - All queries are constrained to one `couple_id`.
//! - Text is stored exactly as given.

use crate::db::now_epoch_ms;
use crate::model::content::{WordId, WordItem};
use crate::model::couple::CoupleId;
use crate::repo::{ensure_table, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

/// Repository interface for couple notes.
pub trait WordsRepository {
    /// Newest first, at most `limit` rows.
    fn list_words(&self, couple_id: CoupleId, limit: u32) -> RepoResult<Vec<WordItem>>;
    fn insert_word(&self, couple_id: CoupleId, text: &str) -> RepoResult<WordItem>;
    fn delete_word(&self, couple_id: CoupleId, word_id: WordId) -> RepoResult<()>;
}

/// SQLite-backed words repository.
pub struct SqliteWordsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteWordsRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table(conn, "words", &["id", "text", "couple_id", "created_at"])?;
        Ok(Self { conn })
    }
}

impl WordsRepository for SqliteWordsRepository<'_> {
    fn list_words(&self, couple_id: CoupleId, limit: u32) -> RepoResult<Vec<WordItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, couple_id, text, created_at
             FROM words
             WHERE couple_id = ?1
             ORDER BY id DESC
             LIMIT ?2;",
        )?;
        let mut rows = stmt.query(params![couple_id, i64::from(limit)])?;
        let mut words = Vec::new();
        while let Some(row) = rows.next()? {
            words.push(parse_word_row(row)?);
        }
        Ok(words)
    }

    fn insert_word(&self, couple_id: CoupleId, text: &str) -> RepoResult<WordItem> {
        let created_at = now_epoch_ms();
        self.conn.execute(
            "INSERT INTO words (text, couple_id, created_at) VALUES (?1, ?2, ?3);",
            params![text, couple_id, created_at],
        )?;

        Ok(WordItem {
            id: self.conn.last_insert_rowid(),
            couple_id,
            text: text.to_string(),
            created_at,
        })
    }

    fn delete_word(&self, couple_id: CoupleId, word_id: WordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM words WHERE id = ?1 AND couple_id = ?2;",
            params![word_id, couple_id],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "word",
                id: word_id,
            });
        }

        Ok(())
    }
}

fn parse_word_row(row: &Row<'_>) -> RepoResult<WordItem> {
    Ok(WordItem {
        id: row.get("id")?,
        couple_id: row.get("couple_id")?,
        text: row.get("text")?,
        created_at: row.get("created_at")?,
    })
}
