//! HTTP lookup client for the age, gender and nationality sources.
//!
//! # Invariants
//! - Every request carries the caller's name as the `name` query parameter.
//! - Each request is bounded by the time left until the shared deadline.
//! - Non-2xx responses and malformed bodies are errors, never empty values.

use super::{LookupError, LookupFailure, LookupResult, LookupSource};
use crate::model::person::{Attribute, EnrichedValue};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_AGE_URL: &str = "https://api.agify.io";
pub const DEFAULT_GENDER_URL: &str = "https://api.genderize.io";
pub const DEFAULT_NATIONALITY_URL: &str = "https://api.nationalize.io";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Base URLs of the three lookup sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupEndpoints {
    pub age: String,
    pub gender: String,
    pub nationality: String,
}

impl Default for LookupEndpoints {
    fn default() -> Self {
        Self {
            age: DEFAULT_AGE_URL.to_string(),
            gender: DEFAULT_GENDER_URL.to_string(),
            nationality: DEFAULT_NATIONALITY_URL.to_string(),
        }
    }
}

impl LookupEndpoints {
    pub fn url_for(&self, attribute: Attribute) -> &str {
        match attribute {
            Attribute::Age => &self.age,
            Attribute::Gender => &self.gender,
            Attribute::Nationality => &self.nationality,
        }
    }
}

/// `reqwest`-backed lookup source.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpLookupClient {
    http: Client,
    endpoints: LookupEndpoints,
}

impl HttpLookupClient {
    /// Builds a client with its own connection pool.
    pub fn new(endpoints: LookupEndpoints) -> reqwest::Result<Self> {
        let http = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self::with_client(http, endpoints))
    }

    /// Wraps an existing `reqwest::Client`.
    pub fn with_client(http: Client, endpoints: LookupEndpoints) -> Self {
        Self { http, endpoints }
    }

    async fn fetch_body(
        &self,
        attribute: Attribute,
        name: &str,
        deadline: Instant,
    ) -> Result<Vec<u8>, LookupFailure> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(LookupFailure::DeadlineElapsed);
        }

        let url = Url::parse_with_params(self.endpoints.url_for(attribute), &[("name", name)])
            .map_err(|err| LookupFailure::Request(err.to_string()))?;
        debug!(
            "event=lookup_request module=lookup status=start attribute={attribute} url={url} budget_ms={}",
            remaining.as_millis()
        );

        let response = self
            .http
            .get(url)
            .timeout(remaining)
            .send()
            .await
            .map_err(LookupFailure::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupFailure::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(LookupFailure::Transport)?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl LookupSource for HttpLookupClient {
    async fn fetch(
        &self,
        attribute: Attribute,
        name: &str,
        deadline: Instant,
    ) -> LookupResult<Option<EnrichedValue>> {
        let started_at = Instant::now();
        let decoded = match self.fetch_body(attribute, name, deadline).await {
            Ok(body) => decode_body(attribute, &body).map_err(LookupFailure::Decode),
            Err(failure) => Err(failure),
        };

        match decoded {
            Ok(value) => {
                info!(
                    "event=lookup_fetch module=lookup status=ok attribute={attribute} present={} duration_ms={}",
                    value.is_some(),
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(failure) => {
                warn!(
                    "event=lookup_fetch module=lookup status=error attribute={attribute} duration_ms={} error={failure}",
                    started_at.elapsed().as_millis()
                );
                Err(LookupError::new(attribute, failure))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct AgeBody {
    age: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenderBody {
    gender: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NationalityBody {
    #[serde(default)]
    country: Vec<CountryCandidate>,
}

#[derive(Debug, Deserialize)]
struct CountryCandidate {
    country_id: String,
}

/// Decodes one source body into its attribute value.
///
/// Nationality takes the first listed country; sources order candidates by
/// descending probability.
pub fn decode_body(
    attribute: Attribute,
    body: &[u8],
) -> Result<Option<EnrichedValue>, serde_json::Error> {
    let value = match attribute {
        Attribute::Age => serde_json::from_slice::<AgeBody>(body)?
            .age
            .map(EnrichedValue::Age),
        Attribute::Gender => serde_json::from_slice::<GenderBody>(body)?
            .gender
            .filter(|gender| !gender.is_empty())
            .map(EnrichedValue::Gender),
        Attribute::Nationality => serde_json::from_slice::<NationalityBody>(body)?
            .country
            .into_iter()
            .next()
            .map(|candidate| candidate.country_id)
            .filter(|code| !code.is_empty())
            .map(EnrichedValue::Nationality),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::decode_body;
    use crate::model::person::{Attribute, EnrichedValue};

    #[test]
    fn age_null_is_absent() {
        let value = decode_body(Attribute::Age, br#"{"count":0,"name":"x","age":null}"#).unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn negative_age_is_a_decode_error() {
        assert!(decode_body(Attribute::Age, br#"{"age":-3}"#).is_err());
    }

    #[test]
    fn empty_gender_is_absent() {
        let value = decode_body(Attribute::Gender, br#"{"gender":""}"#).unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn nationality_takes_first_candidate() {
        let body = br#"{"country":[{"country_id":"RU","probability":0.8},{"country_id":"UA","probability":0.2}]}"#;
        let value = decode_body(Attribute::Nationality, body).unwrap();
        assert_eq!(value, Some(EnrichedValue::Nationality("RU".to_string())));
    }

    #[test]
    fn nationality_empty_or_missing_list_is_absent() {
        assert_eq!(
            decode_body(Attribute::Nationality, br#"{"country":[]}"#).unwrap(),
            None
        );
        assert_eq!(decode_body(Attribute::Nationality, br#"{}"#).unwrap(), None);
    }

    #[test]
    fn non_json_body_is_an_error() {
        assert!(decode_body(Attribute::Gender, b"<html>busy</html>").is_err());
    }
}
