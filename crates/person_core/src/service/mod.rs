//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate enrichment and repository calls into use-case level APIs.
//! - Own transaction boundaries so callers never see partial writes.

pub mod person_service;
