//! Couple registry use-case service.
//!
//! # Responsibility
//! - Resolve identities to couple ids, creating couples on first login.
//! - Add and remove partners.
//!
//! # Invariants
//! - `resolve_or_create` is idempotent per identity.
//! - `add_partner` does not check whether the partner already belongs to
//!   another couple; the partner may end up in two couples.
//! - `dissolve` purges all shared content of the couple.

use crate::model::couple::{Couple, CoupleId};
use crate::model::identity::{Identity, IdentityError};
use crate::repo::couple_repo::{CoupleRepository, DissolveReport};
use crate::repo::{RepoError, RepoResult};
use crate::upload::UploadStore;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for couple use-cases.
#[derive(Debug)]
pub enum CoupleServiceError {
    /// Partner email failed to parse.
    InvalidPartner(IdentityError),
    /// Partner email equals the couple's own `member_a`.
    SelfPairing,
    CoupleNotFound(CoupleId),
    Repo(RepoError),
}

impl Display for CoupleServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPartner(err) => write!(f, "{err}"),
            Self::SelfPairing => write!(f, "you cannot add yourself as your partner"),
            Self::CoupleNotFound(couple_id) => write!(f, "couple not found: {couple_id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CoupleServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPartner(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CoupleServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "couple",
                id,
            } => Self::CoupleNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Couple registry facade over repository implementations.
pub struct CoupleService<R: CoupleRepository> {
    repo: R,
}

impl<R: CoupleRepository> CoupleService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Returns the couple id for `identity`, creating a couple on first sight.
    pub fn resolve_or_create(&self, identity: &Identity) -> Result<CoupleId, CoupleServiceError> {
        let resolution = self.repo.resolve_or_create(identity)?;
        info!(
            "event=couple_resolve module=couple status=ok couple_id={} created={} identity_domain={}",
            resolution.couple.id,
            resolution.created,
            identity.domain()
        );
        Ok(resolution.couple.id)
    }

    pub fn get_couple(&self, couple_id: CoupleId) -> Result<Couple, CoupleServiceError> {
        self.repo
            .get_couple(couple_id)?
            .ok_or(CoupleServiceError::CoupleNotFound(couple_id))
    }

    pub fn find_by_identity(&self, identity: &Identity) -> RepoResult<Option<Couple>> {
        self.repo.find_by_identity(identity)
    }

    /// Names `partner_email` as the couple's second member, replacing any previous one.
    pub fn add_partner(
        &self,
        couple_id: CoupleId,
        partner_email: &str,
    ) -> Result<Couple, CoupleServiceError> {
        let partner =
            Identity::parse(partner_email).map_err(CoupleServiceError::InvalidPartner)?;
        let couple = self.get_couple(couple_id)?;
        if couple.member_a == partner {
            return Err(CoupleServiceError::SelfPairing);
        }

        self.repo.set_partner(couple_id, &partner)?;
        info!(
            "event=couple_add_partner module=couple status=ok couple_id={} partner_domain={} replaced={}",
            couple_id,
            partner.domain(),
            couple.is_paired()
        );

        Ok(Couple {
            member_b: Some(partner),
            ..couple
        })
    }

    /// Clears the second member and purges the couple's images and words.
    pub fn dissolve(
        &self,
        couple_id: CoupleId,
        files: &UploadStore,
    ) -> Result<DissolveReport, CoupleServiceError> {
        match self.repo.dissolve(couple_id, files) {
            Ok(report) => {
                info!(
                    "event=couple_dissolve module=couple status=ok couple_id={} images={} words={} files={}",
                    couple_id, report.images_removed, report.words_removed, report.files_removed
                );
                Ok(report)
            }
            Err(err) => {
                error!(
                    "event=couple_dissolve module=couple status=error couple_id={} error={}",
                    couple_id, err
                );
                Err(err.into())
            }
        }
    }
}
