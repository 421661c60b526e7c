//! Core domain logic for the person enrichment service.
//!
//! A person is created from a bare name, enriched concurrently with age,
//! gender and nationality from external lookup sources, and persisted in a
//! single SQLite transaction that commits only when enrichment fully
//! succeeded.

pub mod config;
pub mod db;
pub mod enrich;
pub mod logging;
pub mod lookup;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, ServiceConfig};
pub use enrich::{EnrichError, Enricher, DEFAULT_ENRICH_BUDGET};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use lookup::{
    HttpLookupClient, LookupEndpoints, LookupError, LookupFailure, LookupResult, LookupSource,
};
pub use model::person::{
    Attribute, EnrichedValue, Person, PersonDraft, PersonId, PersonInput, PersonValidationError,
};
pub use repo::filter::{PageLimits, PersonFilter, PersonListQuery};
pub use repo::person_repo::{PersonRepository, RepoError, RepoResult, SqlitePersonRepository};
pub use service::person_service::{
    PersonService, ServiceError, ServiceResult, DEFAULT_OPERATION_TIMEOUT,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
