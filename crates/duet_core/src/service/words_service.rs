//! "Words together" use-case service.
//!
//! # Invariants
//! - Text that is empty after trimming is rejected.
//! - Accepted text is stored and returned byte-for-byte.

use crate::model::content::{WordId, WordItem};
use crate::model::couple::CoupleId;
use crate::repo::words_repo::WordsRepository;
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Notes returned by one listing.
pub const WORDS_PAGE_SIZE: u32 = 20;

#[derive(Debug)]
pub enum WordsServiceError {
    EmptyText,
    WordNotFound(WordId),
    Repo(RepoError),
}

impl Display for WordsServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "please write something before saving"),
            Self::WordNotFound(word_id) => write!(f, "note not found: {word_id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WordsServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for WordsServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { id, .. } => Self::WordNotFound(id),
            other => Self::Repo(other),
        }
    }
}

pub struct WordsService<R: WordsRepository> {
    repo: R,
}

impl<R: WordsRepository> WordsService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Newest notes of the couple, at most `WORDS_PAGE_SIZE`.
    pub fn list(&self, couple_id: CoupleId) -> Result<Vec<WordItem>, WordsServiceError> {
        Ok(self.repo.list_words(couple_id, WORDS_PAGE_SIZE)?)
    }

    pub fn add(&self, couple_id: CoupleId, text: &str) -> Result<WordItem, WordsServiceError> {
        if text.trim().is_empty() {
            return Err(WordsServiceError::EmptyText);
        }

        let word = self.repo.insert_word(couple_id, text)?;
        info!(
            "event=words_add module=words status=ok couple_id={} word_id={} chars={}",
            couple_id,
            word.id,
            text.chars().count()
        );
        Ok(word)
    }

    pub fn delete(&self, couple_id: CoupleId, word_id: WordId) -> Result<(), WordsServiceError> {
        self.repo.delete_word(couple_id, word_id)?;
        info!(
            "event=words_delete module=words status=ok couple_id={} word_id={}",
            couple_id, word_id
        );
        Ok(())
    }
}
