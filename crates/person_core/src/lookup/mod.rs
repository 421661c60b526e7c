//! External attribute lookup contracts.
//!
//! # Responsibility
//! - Define the seam between enrichment orchestration and lookup transports.
//! - Classify lookup failures, always tagged with the attribute that failed.
//!
//! # Invariants
//! - A lookup performs at most one outbound call and never retries.
//! - Implementations are stateless with respect to individual calls and safe
//!   to share across concurrently enriched records.

use crate::model::person::{Attribute, EnrichedValue};
use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

pub mod http;

pub use http::{HttpLookupClient, LookupEndpoints};

pub type LookupResult<T> = Result<T, LookupError>;

/// One attribute lookup that did not produce a usable answer.
#[derive(Debug, Error)]
#[error("{attribute} lookup failed: {failure}")]
pub struct LookupError {
    pub attribute: Attribute,
    pub failure: LookupFailure,
}

impl LookupError {
    pub fn new(attribute: Attribute, failure: LookupFailure) -> Self {
        Self { attribute, failure }
    }
}

/// Why a lookup failed.
#[derive(Debug, Error)]
pub enum LookupFailure {
    #[error("cannot build request: {0}")]
    Request(String),
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("undecodable response body: {0}")]
    Decode(serde_json::Error),
    #[error("deadline elapsed before the request was sent")]
    DeadlineElapsed,
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("source answered with a {0} value")]
    MismatchedValue(Attribute),
}

/// Source of enrichment values for a single attribute at a time.
///
/// `deadline` is shared by all lookups of one enrichment call; an
/// implementation must give up on its outbound call once it passes.
#[async_trait]
pub trait LookupSource: Send + Sync + 'static {
    async fn fetch(
        &self,
        attribute: Attribute,
        name: &str,
        deadline: Instant,
    ) -> LookupResult<Option<EnrichedValue>>;
}
