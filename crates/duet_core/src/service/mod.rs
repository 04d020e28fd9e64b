//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Translate repository errors into the user-facing taxonomy
//!   (validation, capacity, not found, storage).
//! - Keep the HTTP layer decoupled from storage details.

pub mod couple_service;
pub mod gallery_service;
pub mod words_service;
