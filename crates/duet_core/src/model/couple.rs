//! Couple pairing record.
//!
//! # Invariants
//! - `member_a` is set at creation and never changes.
//! - `member_b` is empty until a partner is added, and cleared on dissolve.

use crate::model::identity::Identity;
use serde::{Deserialize, Serialize};

/// Row id of the `couples` table; the namespace every content record is tagged with.
pub type CoupleId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Couple {
    pub id: CoupleId,
    pub member_a: Identity,
    pub member_b: Option<Identity>,
}

impl Couple {
    /// Returns whether `identity` occupies either member slot.
    pub fn has_member(&self, identity: &Identity) -> bool {
        &self.member_a == identity || self.member_b.as_ref() == Some(identity)
    }

    /// The other member, seen from `identity`.
    pub fn partner_of(&self, identity: &Identity) -> Option<&Identity> {
        if &self.member_a == identity {
            self.member_b.as_ref()
        } else if self.member_b.as_ref() == Some(identity) {
            Some(&self.member_a)
        } else {
            None
        }
    }

    pub fn is_paired(&self) -> bool {
        self.member_b.is_some()
    }
}
