//! Concurrent enrichment of person drafts from external lookup sources.
//!
//! # Responsibility
//! - Fan out one lookup task per attribute and fan their outcomes back in.
//! - Enforce one shared sub-deadline across all lookups of a call.
//! - Merge values into the draft as they arrive.
//!
//! # Invariants
//! - Only the coordinating task mutates the draft; workers only send outcomes.
//! - Values merged before a failure or the deadline stay on the draft.
//! - The call never waits past the sub-deadline; unfinished workers are
//!   aborted when the call returns.
//! - When several lookups fail, the last failure to arrive is reported.
//! - A panicking worker re-raises on the coordinator as soon as it is
//!   received, without waiting for slower siblings.

use crate::lookup::{LookupError, LookupFailure, LookupResult, LookupSource};
use crate::model::person::{Attribute, EnrichedValue, PersonDraft};
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

/// Upper bound for one enrichment call, independent of the caller deadline.
pub const DEFAULT_ENRICH_BUDGET: Duration = Duration::from_secs(3);

/// Why an enrichment call did not complete cleanly.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("enrichment deadline exceeded after {budget_ms} ms with {pending} lookup(s) pending")]
    DeadlineExceeded { budget_ms: u64, pending: usize },
    #[error("lookup worker stopped without reporting an outcome")]
    WorkerLost,
}

/// Transient per-attribute result delivered through the fan-in channel.
///
/// `Err` carries the payload of a panicking lookup.
#[derive(Debug)]
struct LookupOutcome {
    attribute: Attribute,
    result: std::thread::Result<LookupResult<Option<EnrichedValue>>>,
}

/// Spawned lookup tasks of one call; dropping the set aborts stragglers.
struct LookupWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl Drop for LookupWorkers {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// Enrichment coordinator bound to one lookup source.
pub struct Enricher<S> {
    source: Arc<S>,
    budget: Duration,
}

impl<S> Clone for Enricher<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            budget: self.budget,
        }
    }
}

impl<S: LookupSource> Enricher<S> {
    pub fn new(source: S) -> Self {
        Self::from_shared(Arc::new(source))
    }

    pub fn from_shared(source: Arc<S>) -> Self {
        Self {
            source,
            budget: DEFAULT_ENRICH_BUDGET,
        }
    }

    /// Overrides the per-call sub-deadline budget.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Fills `age`, `gender` and `nationality` on `draft` concurrently.
    ///
    /// The effective deadline is `min(now + budget, parent_deadline)`.
    ///
    /// # Errors
    /// - `Lookup` with the last failure seen, after all three outcomes arrived.
    ///   A value answered for a different attribute than requested counts as
    ///   a failure of the requested one.
    /// - `DeadlineExceeded` when the deadline fires first.
    /// - `WorkerLost` when a worker was cancelled without reporting.
    ///
    /// A panicking worker re-raises its panic on the calling task.
    pub async fn enrich(
        &self,
        draft: &mut PersonDraft,
        parent_deadline: Instant,
    ) -> Result<(), EnrichError> {
        let started_at = Instant::now();
        let deadline = (started_at + self.budget).min(parent_deadline);
        let expected = Attribute::ALL.len();

        let (sender, mut receiver) = mpsc::channel::<LookupOutcome>(expected);
        let mut workers = LookupWorkers {
            handles: Vec::with_capacity(expected),
        };
        for attribute in Attribute::ALL {
            let source = Arc::clone(&self.source);
            let sender = sender.clone();
            let name = draft.name.clone();
            workers.handles.push(tokio::spawn(async move {
                let result = AssertUnwindSafe(source.fetch(attribute, &name, deadline))
                    .catch_unwind()
                    .await;
                // The receiver is gone once the coordinator gave up.
                let _ = sender.send(LookupOutcome { attribute, result }).await;
            }));
        }
        drop(sender);

        debug!(
            "event=enrich module=enrich status=start lookups={expected} budget_ms={}",
            deadline.saturating_duration_since(started_at).as_millis()
        );

        let mut last_error = None;
        let mut received = 0;
        while received < expected {
            match timeout_at(deadline, receiver.recv()).await {
                Ok(Some(outcome)) => {
                    received += 1;
                    let result = match outcome.result {
                        Ok(result) => result,
                        Err(payload) => {
                            error!(
                                "event=enrich_merge module=enrich status=panic attribute={}",
                                outcome.attribute
                            );
                            std::panic::resume_unwind(payload);
                        }
                    };
                    match checked(outcome.attribute, result) {
                        Ok(Some(value)) => {
                            debug!(
                                "event=enrich_merge module=enrich status=ok attribute={}",
                                outcome.attribute
                            );
                            draft.merge(value);
                        }
                        Ok(None) => {
                            debug!(
                                "event=enrich_merge module=enrich status=absent attribute={}",
                                outcome.attribute
                            );
                        }
                        Err(err) => {
                            warn!(
                                "event=enrich_merge module=enrich status=error attribute={} error={err}",
                                outcome.attribute
                            );
                            last_error = Some(err);
                        }
                    }
                }
                Ok(None) => {
                    warn!(
                        "event=enrich module=enrich status=error error_code=worker_lost received={received}"
                    );
                    return Err(EnrichError::WorkerLost);
                }
                Err(_) => {
                    let budget_ms =
                        u64::try_from(deadline.saturating_duration_since(started_at).as_millis())
                            .unwrap_or(u64::MAX);
                    warn!(
                        "event=enrich module=enrich status=timeout budget_ms={budget_ms} pending={}",
                        expected - received
                    );
                    return Err(EnrichError::DeadlineExceeded {
                        budget_ms,
                        pending: expected - received,
                    });
                }
            }
        }

        match last_error {
            Some(err) => {
                warn!(
                    "event=enrich module=enrich status=partial duration_ms={} failed_attribute={}",
                    started_at.elapsed().as_millis(),
                    err.attribute
                );
                Err(EnrichError::Lookup(err))
            }
            None => {
                info!(
                    "event=enrich module=enrich status=ok duration_ms={} age={} gender={} nationality={}",
                    started_at.elapsed().as_millis(),
                    draft.age.is_some(),
                    draft.gender.is_some(),
                    draft.nationality.is_some()
                );
                Ok(())
            }
        }
    }
}

/// Rejects a value that answers a different attribute than was requested.
fn checked(
    requested: Attribute,
    result: LookupResult<Option<EnrichedValue>>,
) -> LookupResult<Option<EnrichedValue>> {
    match result {
        Ok(Some(value)) if value.attribute() != requested => Err(LookupError::new(
            requested,
            LookupFailure::MismatchedValue(value.attribute()),
        )),
        other => other,
    }
}
