//! Person use-case service: enrichment plus transactional persistence.
//!
//! # Responsibility
//! - Validate caller input before any lookup starts.
//! - Treat enrichment plus the row write as one unit of work.
//! - Map repository failures onto caller-facing outcomes.
//!
//! # Invariants
//! - The enriched draft reaches SQL only after all three lookups succeeded;
//!   on any other exit (error return, deadline, panic) it is discarded.
//! - The SQLite transaction wraps only the synchronous write, so it is never
//!   open across an `.await` and overlapping calls on one connection never
//!   join each other's transaction.
//! - Commit happens only on the single success path; a failed or panicking
//!   write drops the transaction, which rolls back.
//! - Update overwrites every mutable column with freshly enriched values.
//!
//! Futures returned by the write operations borrow the connection and are
//! not `Send`; drive them on a current-thread runtime or a `LocalSet`.

use crate::enrich::{EnrichError, Enricher};
use crate::lookup::LookupSource;
use crate::model::person::{
    validate_id, Person, PersonDraft, PersonId, PersonInput, PersonValidationError,
};
use crate::repo::filter::{PageLimits, PersonFilter};
use crate::repo::person_repo::{PersonRepository, RepoError, RepoResult, SqlitePersonRepository};
use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Overall budget of one create/update call, enrichment included.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Caller-facing error for person use-cases.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid person input: {0}")]
    Validation(#[from] PersonValidationError),
    #[error("failed to enrich person: {0}")]
    Enrichment(#[from] EnrichError),
    #[error("person not found: {0}")]
    NotFound(PersonId),
    #[error("failed to persist person: {0}")]
    Persistence(RepoError),
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Persistence(other),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Persistence(RepoError::from(value))
    }
}

/// Person service over one SQLite connection and one lookup source.
pub struct PersonService<'conn, S> {
    conn: &'conn Connection,
    enricher: Enricher<S>,
    operation_timeout: Duration,
    page_limits: PageLimits,
}

impl<'conn, S: LookupSource> PersonService<'conn, S> {
    /// Creates a service with default operation timeout and page limits.
    pub fn new(conn: &'conn Connection, enricher: Enricher<S>) -> Self {
        Self {
            conn,
            enricher,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            page_limits: PageLimits::default(),
        }
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_page_limits(mut self, limits: PageLimits) -> Self {
        self.page_limits = limits;
        self
    }

    /// Creates one enriched person.
    ///
    /// # Errors
    /// - `Validation` before any lookup when name or surname is blank.
    /// - `Enrichment` when any lookup fails or the deadline passes; nothing
    ///   is stored.
    /// - `Persistence` when the insert or commit fails.
    pub async fn create_person(&self, input: &PersonInput) -> ServiceResult<Person> {
        let draft = PersonDraft::from_input(input)?;
        self.write_enriched("person_create", draft, |repo, draft| {
            repo.insert_person(draft)
        })
        .await
    }

    /// Re-enriches and fully overwrites an existing person.
    ///
    /// # Errors
    /// - `NotFound` when no row has `id`; the store is left unchanged.
    /// - Otherwise same as [`PersonService::create_person`].
    pub async fn update_person(&self, id: PersonId, input: &PersonInput) -> ServiceResult<Person> {
        validate_id(id)?;
        let draft = PersonDraft::from_input(input)?;
        self.write_enriched("person_update", draft, move |repo, draft| {
            repo.update_person(id, draft)
        })
        .await
    }

    /// Deletes one person by id.
    pub fn delete_person(&self, id: PersonId) -> ServiceResult<()> {
        validate_id(id)?;
        let repo = SqlitePersonRepository::try_new(self.conn)?;
        match repo.delete_person(id) {
            Ok(()) => {
                info!("event=person_delete module=service status=ok id={id}");
                Ok(())
            }
            Err(RepoError::NotFound(id)) => {
                warn!("event=person_delete module=service status=not_found id={id}");
                Err(ServiceError::NotFound(id))
            }
            Err(err) => {
                error!("event=person_delete module=service status=error id={id} error={err}");
                Err(err.into())
            }
        }
    }

    /// Gets one person by id.
    pub fn get_person(&self, id: PersonId) -> ServiceResult<Option<Person>> {
        validate_id(id)?;
        let repo = SqlitePersonRepository::try_new(self.conn)?;
        Ok(repo.get_person(id)?)
    }

    /// Lists persons newest first, with page size clamped to the limits.
    pub fn list_persons(&self, filter: PersonFilter) -> ServiceResult<Vec<Person>> {
        let query = filter.into_list_query(self.page_limits);
        let repo = SqlitePersonRepository::try_new(self.conn)?;
        let persons = repo.list_persons(&query)?;
        info!(
            "event=person_list module=service status=ok count={} limit={} offset={}",
            persons.len(),
            query.limit,
            query.offset
        );
        Ok(persons)
    }

    async fn write_enriched<W>(
        &self,
        operation: &'static str,
        mut draft: PersonDraft,
        write: W,
    ) -> ServiceResult<Person>
    where
        W: FnOnce(&SqlitePersonRepository<'_>, &PersonDraft) -> RepoResult<Person>,
    {
        let started_at = Instant::now();
        let deadline = started_at + self.operation_timeout;
        info!("event={operation} module=service status=start");

        if let Err(err) = self.enricher.enrich(&mut draft, deadline).await {
            warn!(
                "event={operation} module=service status=discarded duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            );
            return Err(err.into());
        }

        // No await below this point: the transaction never spans a suspension.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let outcome = SqlitePersonRepository::try_new(&tx)
            .and_then(|repo| write(&repo, &draft))
            .map_err(ServiceError::from);

        match outcome {
            Ok(person) => {
                tx.commit()?;
                info!(
                    "event={operation} module=service status=ok id={} duration_ms={}",
                    person.id,
                    started_at.elapsed().as_millis()
                );
                Ok(person)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    error!(
                        "event={operation} module=service status=error error_code=rollback_failed error={rollback_err}"
                    );
                }
                warn!(
                    "event={operation} module=service status=rolled_back duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }
}
