//! Person repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over the canonical `persons` table.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Writes read store-generated columns back with `RETURNING`.
//! - Update and delete report `NotFound` when zero rows are affected.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::person::{Person, PersonDraft, PersonId};
use crate::repo::filter::{build_predicate, PersonListQuery};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use thiserror::Error;

const PERSON_SELECT_SQL: &str = "SELECT
    id,
    name,
    surname,
    patronymic,
    age,
    gender,
    nationality,
    created_at,
    updated_at
FROM persons";

const NOW_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

const REQUIRED_COLUMNS: [&str; 9] = [
    "id",
    "name",
    "surname",
    "patronymic",
    "age",
    "gender",
    "nationality",
    "created_at",
    "updated_at",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for person persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("person not found: {0}")]
    NotFound(PersonId),
    #[error("invalid persisted person data: {0}")]
    InvalidData(String),
    #[error(
        "connection is not initialized: expected schema version {expected_version}, found {actual_version}"
    )]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("required table `{0}` is missing")]
    MissingRequiredTable(&'static str),
    #[error("required column `{table}.{column}` is missing")]
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for person CRUD operations.
pub trait PersonRepository {
    fn insert_person(&self, draft: &PersonDraft) -> RepoResult<Person>;
    fn update_person(&self, id: PersonId, draft: &PersonDraft) -> RepoResult<Person>;
    fn get_person(&self, id: PersonId) -> RepoResult<Option<Person>>;
    fn list_persons(&self, query: &PersonListQuery) -> RepoResult<Vec<Person>>;
    fn delete_person(&self, id: PersonId) -> RepoResult<()>;
}

/// SQLite-backed person repository.
///
/// Accepts any `Connection`, including the one a `Transaction` derefs to,
/// so writes can join an outer unit of work.
pub struct SqlitePersonRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePersonRepository<'conn> {
    /// Wraps a migrated connection after checking the schema it exposes.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_person_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl PersonRepository for SqlitePersonRepository<'_> {
    fn insert_person(&self, draft: &PersonDraft) -> RepoResult<Person> {
        let (id, created_at, updated_at) = self.conn.query_row(
            "INSERT INTO persons (
                name,
                surname,
                patronymic,
                age,
                gender,
                nationality
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING id, created_at, updated_at;",
            params![
                draft.name.as_str(),
                draft.surname.as_str(),
                draft.patronymic.as_deref(),
                draft.age,
                draft.gender.as_deref(),
                draft.nationality.as_deref(),
            ],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(Person::from_draft(id, created_at, updated_at, draft.clone()))
    }

    fn update_person(&self, id: PersonId, draft: &PersonDraft) -> RepoResult<Person> {
        let returned: Option<(i64, i64)> = self
            .conn
            .query_row(
                &format!(
                    "UPDATE persons
                     SET
                        name = ?1,
                        surname = ?2,
                        patronymic = ?3,
                        age = ?4,
                        gender = ?5,
                        nationality = ?6,
                        updated_at = max({NOW_MS_SQL}, created_at)
                     WHERE id = ?7
                     RETURNING created_at, updated_at;"
                ),
                params![
                    draft.name.as_str(),
                    draft.surname.as_str(),
                    draft.patronymic.as_deref(),
                    draft.age,
                    draft.gender.as_deref(),
                    draft.nationality.as_deref(),
                    id,
                ],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (created_at, updated_at) = returned.ok_or(RepoError::NotFound(id))?;
        Ok(Person::from_draft(id, created_at, updated_at, draft.clone()))
    }

    fn get_person(&self, id: PersonId) -> RepoResult<Option<Person>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PERSON_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_person_row(row)?));
        }

        Ok(None)
    }

    fn list_persons(&self, query: &PersonListQuery) -> RepoResult<Vec<Person>> {
        let (predicate, mut bind_values) = build_predicate(&query.filter);
        let sql = format!(
            "{PERSON_SELECT_SQL} WHERE {predicate}
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?;"
        );
        bind_values.push(Value::Integer(i64::from(query.limit)));
        bind_values.push(Value::Integer(
            i64::try_from(query.offset).unwrap_or(i64::MAX),
        ));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut persons = Vec::new();

        while let Some(row) = rows.next()? {
            persons.push(parse_person_row(row)?);
        }

        Ok(persons)
    }

    fn delete_person(&self, id: PersonId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM persons WHERE id = ?1;", [id])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }
}

fn parse_person_row(row: &Row<'_>) -> RepoResult<Person> {
    let id: PersonId = row.get("id")?;

    let age = match row.get::<_, Option<i64>>("age")? {
        Some(value) => Some(u32::try_from(value).map_err(|_| {
            RepoError::InvalidData(format!("invalid age `{value}` in persons.age for id {id}"))
        })?),
        None => None,
    };

    let name: String = row.get("name")?;
    let surname: String = row.get("surname")?;
    if name.trim().is_empty() || surname.trim().is_empty() {
        return Err(RepoError::InvalidData(format!(
            "blank required name fields for id {id}"
        )));
    }

    Ok(Person {
        id,
        name,
        surname,
        patronymic: row.get("patronymic")?,
        age,
        gender: row.get("gender")?,
        nationality: row.get("nationality")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn ensure_person_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "persons")? {
        return Err(RepoError::MissingRequiredTable("persons"));
    }

    for column in REQUIRED_COLUMNS {
        if !table_has_column(conn, "persons", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "persons",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
