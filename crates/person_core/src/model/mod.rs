//! Domain model for person records and their enrichment attributes.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Separate the in-memory draft (enrichment target) from the persisted row.
//!
//! # Invariants
//! - `name` and `surname` are non-blank once a draft exists.
//! - Store-assigned fields (`id`, timestamps) exist only on `Person`.

pub mod person;
