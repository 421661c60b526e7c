//! Person domain model.
//!
//! # Responsibility
//! - Define caller input, the in-memory draft and the persisted record.
//! - Validate required name fields before any enrichment work starts.
//!
//! # Invariants
//! - `PersonDraft::from_input` never yields blank `name`/`surname`.
//! - Blank optional patronymic input is normalized to `None`.
//! - Enriched fields (`age`, `gender`, `nationality`) are only written by the
//!   enrichment coordinator.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Store-assigned identity of a persisted person row.
pub type PersonId = i64;

/// Attribute filled from an external lookup source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Age,
    Gender,
    Nationality,
}

impl Attribute {
    /// All enrichable attributes, in dispatch order.
    pub const ALL: [Attribute; 3] = [Attribute::Age, Attribute::Gender, Attribute::Nationality];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Gender => "gender",
            Self::Nationality => "nationality",
        }
    }
}

impl Display for Attribute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value produced by one successful attribute lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichedValue {
    Age(u32),
    Gender(String),
    Nationality(String),
}

impl EnrichedValue {
    pub fn attribute(&self) -> Attribute {
        match self {
            Self::Age(_) => Attribute::Age,
            Self::Gender(_) => Attribute::Gender,
            Self::Nationality(_) => Attribute::Nationality,
        }
    }
}

/// Validation errors raised before enrichment or persistence starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersonValidationError {
    #[error("name is required")]
    MissingName,
    #[error("surname is required")]
    MissingSurname,
    #[error("person id must be positive, got {0}")]
    InvalidId(PersonId),
}

/// Caller input for create and update use-cases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonInput {
    pub name: String,
    pub surname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patronymic: Option<String>,
}

impl PersonInput {
    pub fn new(name: impl Into<String>, surname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            surname: surname.into(),
            patronymic: None,
        }
    }

    pub fn with_patronymic(mut self, patronymic: impl Into<String>) -> Self {
        self.patronymic = Some(patronymic.into());
        self
    }
}

/// In-memory person record that enrichment mutates before it is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonDraft {
    pub name: String,
    pub surname: String,
    pub patronymic: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
}

impl PersonDraft {
    /// Builds a bare draft from caller input.
    ///
    /// # Errors
    /// - `MissingName` / `MissingSurname` when the trimmed value is empty.
    pub fn from_input(input: &PersonInput) -> Result<Self, PersonValidationError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(PersonValidationError::MissingName);
        }
        let surname = input.surname.trim();
        if surname.is_empty() {
            return Err(PersonValidationError::MissingSurname);
        }
        let patronymic = input
            .patronymic
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(Self {
            name: name.to_string(),
            surname: surname.to_string(),
            patronymic,
            ..Self::default()
        })
    }

    /// Writes one lookup value into its matching field.
    pub fn merge(&mut self, value: EnrichedValue) {
        match value {
            EnrichedValue::Age(age) => self.age = Some(age),
            EnrichedValue::Gender(gender) => self.gender = Some(gender),
            EnrichedValue::Nationality(code) => self.nationality = Some(code),
        }
    }
}

/// Persisted person row with store-assigned identity and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub surname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patronymic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    /// Unix epoch milliseconds, assigned by the store on insert.
    pub created_at: i64,
    /// Unix epoch milliseconds, refreshed by the store on every update.
    pub updated_at: i64,
}

impl Person {
    /// Combines a persisted draft with the columns the store generated.
    pub fn from_draft(id: PersonId, created_at: i64, updated_at: i64, draft: PersonDraft) -> Self {
        Self {
            id,
            name: draft.name,
            surname: draft.surname,
            patronymic: draft.patronymic,
            age: draft.age,
            gender: draft.gender,
            nationality: draft.nationality,
            created_at,
            updated_at,
        }
    }
}

/// Rejects ids the store can never have assigned.
pub fn validate_id(id: PersonId) -> Result<(), PersonValidationError> {
    if id <= 0 {
        return Err(PersonValidationError::InvalidId(id));
    }
    Ok(())
}
