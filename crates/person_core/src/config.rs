//! Environment-driven service configuration.
//!
//! # Responsibility
//! - Resolve database, lookup endpoint, logging, timeout and paging
//!   settings from process environment (optionally seeded from `.env`).
//!
//! # Invariants
//! - Unset variables fall back to defaults; set-but-malformed values are
//!   errors naming the offending variable.
//! - Timeouts and page sizes are strictly positive.

use crate::enrich::DEFAULT_ENRICH_BUDGET;
use crate::logging::default_log_level;
use crate::lookup::LookupEndpoints;
use crate::repo::filter::{PageLimits, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::service::person_service::DEFAULT_OPERATION_TIMEOUT;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DB_PATH: &str = "persons.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must not be empty")]
    Empty { key: &'static str },
    #[error("{key} must be a positive integer, got `{value}`")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} must be an absolute path, got `{value}`")]
    RelativePath { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub db_path: PathBuf,
    pub endpoints: LookupEndpoints,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub enrich_timeout: Duration,
    pub operation_timeout: Duration,
    pub page_limits: PageLimits,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            endpoints: LookupEndpoints::default(),
            log_level: default_log_level().to_string(),
            log_dir: None,
            enrich_timeout: DEFAULT_ENRICH_BUDGET,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            page_limits: PageLimits::default(),
        }
    }
}

impl ServiceConfig {
    /// Loads `.env` when present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is the normal production case.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &'static str| lookup(key).map(|value| value.trim().to_string());

        let db_path = match get("PERSON_DB_PATH") {
            Some(value) => PathBuf::from(non_empty("PERSON_DB_PATH", value)?),
            None => defaults.db_path,
        };

        let mut endpoints = defaults.endpoints;
        if let Some(value) = get("AGE_API_URL") {
            endpoints.age = non_empty("AGE_API_URL", value)?;
        }
        if let Some(value) = get("GENDER_API_URL") {
            endpoints.gender = non_empty("GENDER_API_URL", value)?;
        }
        if let Some(value) = get("NATIONALITY_API_URL") {
            endpoints.nationality = non_empty("NATIONALITY_API_URL", value)?;
        }

        let log_level = match get("LOG_LEVEL") {
            Some(value) if !value.is_empty() => value.to_ascii_lowercase(),
            _ => defaults.log_level,
        };

        let log_dir = match get("LOG_DIR") {
            Some(value) if !value.is_empty() => {
                let path = PathBuf::from(&value);
                if !path.is_absolute() {
                    return Err(ConfigError::RelativePath {
                        key: "LOG_DIR",
                        value,
                    });
                }
                Some(path)
            }
            _ => None,
        };

        let enrich_timeout = match get("ENRICH_TIMEOUT_MS") {
            Some(value) => Duration::from_millis(positive("ENRICH_TIMEOUT_MS", value)?),
            None => defaults.enrich_timeout,
        };
        let operation_timeout = match get("OPERATION_TIMEOUT_MS") {
            Some(value) => Duration::from_millis(positive("OPERATION_TIMEOUT_MS", value)?),
            None => defaults.operation_timeout,
        };

        let max_page_size = match get("MAX_PAGE_SIZE") {
            Some(value) => positive_u32("MAX_PAGE_SIZE", value)?,
            None => MAX_PAGE_SIZE,
        };
        let default_page_size = match get("DEFAULT_PAGE_SIZE") {
            Some(value) => positive_u32("DEFAULT_PAGE_SIZE", value)?,
            None => DEFAULT_PAGE_SIZE,
        };

        Ok(Self {
            db_path,
            endpoints,
            log_level,
            log_dir,
            enrich_timeout,
            operation_timeout,
            page_limits: PageLimits {
                default_page_size: default_page_size.min(max_page_size),
                max_page_size,
            },
        })
    }
}

fn non_empty(key: &'static str, value: String) -> Result<String, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Empty { key });
    }
    Ok(value)
}

fn positive(key: &'static str, value: String) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::InvalidNumber { key, value }),
    }
}

fn positive_u32(key: &'static str, value: String) -> Result<u32, ConfigError> {
    match value.parse::<u32>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::InvalidNumber { key, value }),
    }
}
