//! Person listing filter and pagination normalization.
//!
//! # Invariants
//! - Effective page is always >= 1.
//! - Effective page size is in `1..=max_page_size`; oversized requests are
//!   clamped, never rejected.
//! - Substring predicates escape `%`, `_` and `\` so caller text is matched
//!   literally.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Caller-facing list filter with optional predicates and pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonFilter {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub patronymic: Option<String>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    /// 1-based page number; `0` is treated as the first page.
    #[serde(default)]
    pub page: u32,
    /// `0` selects the configured default page size.
    #[serde(default)]
    pub page_size: u32,
}

/// Page size bounds applied to every listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

/// Normalized listing query consumed by the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonListQuery {
    pub filter: PersonFilter,
    pub limit: u32,
    pub offset: u64,
}

impl PersonFilter {
    /// Resolves pagination against `limits` into a repository query.
    pub fn into_list_query(self, limits: PageLimits) -> PersonListQuery {
        let max_page_size = limits.max_page_size.max(1);
        let limit = match self.page_size {
            0 => limits.default_page_size.clamp(1, max_page_size),
            value => value.min(max_page_size),
        };
        let page = self.page.max(1);
        let offset = u64::from(page - 1) * u64::from(limit);

        PersonListQuery {
            filter: self,
            limit,
            offset,
        }
    }
}

/// Builds the `WHERE` clause body and its bind values for `filter`.
///
/// Returns `1 = 1` when no predicate is set so callers can always append.
pub(crate) fn build_predicate(filter: &PersonFilter) -> (String, Vec<Value>) {
    let mut clauses = vec!["1 = 1".to_string()];
    let mut binds = Vec::new();

    for (column, value) in [
        ("name", &filter.name),
        ("surname", &filter.surname),
        ("patronymic", &filter.patronymic),
    ] {
        if let Some(value) = non_blank(value) {
            clauses.push(format!("{column} LIKE ? ESCAPE '\\'"));
            binds.push(Value::Text(format!("%{}%", escape_like(value))));
        }
    }

    for (column, value) in [
        ("gender", &filter.gender),
        ("nationality", &filter.nationality),
    ] {
        if let Some(value) = non_blank(value) {
            clauses.push(format!("{column} = ?"));
            binds.push(Value::Text(value.to_string()));
        }
    }

    if let Some(min_age) = filter.min_age {
        clauses.push("age >= ?".to_string());
        binds.push(Value::Integer(i64::from(min_age)));
    }
    if let Some(max_age) = filter.max_age {
        clauses.push("age <= ?".to_string());
        binds.push(Value::Integer(i64::from(max_age)));
    }

    (clauses.join(" AND "), binds)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
