//! Domain model for couples, their shared content and browser sessions.
//!
//! # Responsibility
//! - Define the canonical records persisted by the repositories.
//! - Keep identity normalization and session transitions in one place.
//!
//! # Invariants
//! - Every content record belongs to exactly one `CoupleId`.
//! - Identities are compared in normalized (trimmed, lowercase) form.

pub mod content;
pub mod couple;
pub mod identity;
pub mod proposal;
pub mod session;
