//! Couple repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Map identities to couple rows and manage the two member slots.
//! - Run the dissolve cascade (rows + backing files) as one logical operation.
//!
//! # Invariants
//! - `resolve_or_create` never produces two rows for one identity: the lookup
//!   and insert share an `IMMEDIATE` transaction and `user1_email` is `UNIQUE`.
//! - A couple where the identity is `member_a` takes precedence over any couple
//!   naming it as `member_b`, which keeps resolution stable once created.
//! - `dissolve` keeps the couple row and `member_a`.

use crate::db::now_epoch_ms;
use crate::model::couple::{Couple, CoupleId};
use crate::model::identity::Identity;
use crate::repo::{ensure_table, is_unique_violation, RepoError, RepoResult};
use crate::upload::UploadStore;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const COUPLE_SELECT_SQL: &str = "SELECT id, user1_email, user2_email FROM couples";

/// Outcome of `resolve_or_create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoupleResolution {
    pub couple: Couple,
    /// `true` when this call inserted the row.
    pub created: bool,
}

/// Rows removed by a dissolve cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DissolveReport {
    pub images_removed: usize,
    pub words_removed: usize,
    pub files_removed: usize,
}

/// Repository interface for couple pairing operations.
pub trait CoupleRepository {
    /// Finds the couple `identity` belongs to, if any.
    fn find_by_identity(&self, identity: &Identity) -> RepoResult<Option<Couple>>;
    /// Returns the existing couple for `identity` or creates one with it as `member_a`.
    fn resolve_or_create(&self, identity: &Identity) -> RepoResult<CoupleResolution>;
    fn get_couple(&self, couple_id: CoupleId) -> RepoResult<Option<Couple>>;
    /// Overwrites `member_b`.
    fn set_partner(&self, couple_id: CoupleId, partner: &Identity) -> RepoResult<()>;
    /// Clears `member_b` and deletes every image/word row and stored file of the couple.
    fn dissolve(&self, couple_id: CoupleId, files: &UploadStore) -> RepoResult<DissolveReport>;
}

/// SQLite-backed couple repository.
pub struct SqliteCoupleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCoupleRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table(conn, "couples", &["id", "user1_email", "user2_email"])?;
        ensure_table(conn, "images", &["id", "filename", "couple_id"])?;
        ensure_table(conn, "words", &["id", "text", "couple_id"])?;
        Ok(Self { conn })
    }
}

impl CoupleRepository for SqliteCoupleRepository<'_> {
    fn find_by_identity(&self, identity: &Identity) -> RepoResult<Option<Couple>> {
        find_by_identity_in(self.conn, identity)
    }

    fn resolve_or_create(&self, identity: &Identity) -> RepoResult<CoupleResolution> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if let Some(couple) = find_by_identity_in(&tx, identity)? {
            return Ok(CoupleResolution {
                couple,
                created: false,
            });
        }

        let inserted = tx.execute(
            "INSERT INTO couples (user1_email, user2_email, created_at)
             VALUES (?1, NULL, ?2);",
            params![identity.as_str(), now_epoch_ms()],
        );
        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                // Another writer won between our read and insert.
                drop(tx);
                let couple = find_by_identity_in(self.conn, identity)?.ok_or_else(|| {
                    RepoError::InvalidData(
                        "couple insert conflicted but no row matches the identity".to_string(),
                    )
                })?;
                return Ok(CoupleResolution {
                    couple,
                    created: false,
                });
            }
            Err(err) => return Err(err.into()),
        }

        let couple = Couple {
            id: tx.last_insert_rowid(),
            member_a: identity.clone(),
            member_b: None,
        };
        tx.commit()?;

        Ok(CoupleResolution {
            couple,
            created: true,
        })
    }

    fn get_couple(&self, couple_id: CoupleId) -> RepoResult<Option<Couple>> {
        let couple = self
            .conn
            .query_row(
                &format!("{COUPLE_SELECT_SQL} WHERE id = ?1;"),
                [couple_id],
                |row| Ok(parse_couple_row(row)),
            )
            .optional()?;
        couple.transpose()
    }

    fn set_partner(&self, couple_id: CoupleId, partner: &Identity) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE couples SET user2_email = ?2 WHERE id = ?1;",
            params![couple_id, partner.as_str()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "couple",
                id: couple_id,
            });
        }

        Ok(())
    }

    fn dissolve(&self, couple_id: CoupleId, files: &UploadStore) -> RepoResult<DissolveReport> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM couples WHERE id = ?1);",
            [couple_id],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::NotFound {
                entity: "couple",
                id: couple_id,
            });
        }

        let filenames = image_filenames_in(&tx, couple_id)?;
        let staged = files.stage_removal(&filenames)?;

        let images_removed = tx.execute("DELETE FROM images WHERE couple_id = ?1;", [couple_id])?;
        let words_removed = tx.execute("DELETE FROM words WHERE couple_id = ?1;", [couple_id])?;
        tx.execute(
            "UPDATE couples SET user2_email = NULL WHERE id = ?1;",
            [couple_id],
        )?;
        // On any `?` above, `staged` drops first and moves the files back.
        tx.commit()?;

        let files_removed = staged.len();
        staged.purge();

        Ok(DissolveReport {
            images_removed,
            words_removed,
            files_removed,
        })
    }
}

fn find_by_identity_in(conn: &Connection, identity: &Identity) -> RepoResult<Option<Couple>> {
    let couple = conn
        .query_row(
            &format!(
                "{COUPLE_SELECT_SQL}
                 WHERE user1_email = ?1 OR user2_email = ?1
                 ORDER BY (user1_email = ?1) DESC, id ASC
                 LIMIT 1;"
            ),
            [identity.as_str()],
            |row| Ok(parse_couple_row(row)),
        )
        .optional()?;
    couple.transpose()
}

fn image_filenames_in(conn: &Connection, couple_id: CoupleId) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT filename FROM images WHERE couple_id = ?1;")?;
    let mut rows = stmt.query([couple_id])?;
    let mut filenames = Vec::new();
    while let Some(row) = rows.next()? {
        filenames.push(row.get(0)?);
    }
    Ok(filenames)
}

fn parse_couple_row(row: &Row<'_>) -> RepoResult<Couple> {
    let member_a: String = row.get("user1_email")?;
    let member_b: Option<String> = row.get("user2_email")?;
    Ok(Couple {
        id: row.get("id")?,
        member_a: Identity::parse(&member_a)?,
        member_b: member_b.as_deref().map(Identity::parse).transpose()?,
    })
}
