//! Repository layer: data access contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define find/insert/update/delete and aggregate contracts per table.
//! - Isolate SQL text and row mapping from the lifecycle services.
//!
//! # Invariants
//! - Write paths validate model input before SQL mutations.
//! - Generated ids are written back onto the in-memory object only after the
//!   insert succeeded.
//! - `UNIQUE` violations surface as `RepoError::DuplicateKey`, not as opaque
//!   SQLite errors.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::blog_post::BlogPostId;
use crate::model::order::OrderId;
use crate::model::user::{ProfileId, UserId};
use crate::model::validation::ValidationError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod blog_post_repo;
pub mod order_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Identity of one stored record, used in not-found reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    User(UserId),
    Profile(ProfileId),
    Order(OrderId),
    BlogPost(BlogPostId),
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user {id}"),
            Self::Profile(id) => write!(f, "user profile {id}"),
            Self::Order(id) => write!(f, "order {id}"),
            Self::BlogPost(id) => write!(f, "blog post {id}"),
        }
    }
}

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound(EntityRef),
    /// A unique constraint rejected the write, e.g. `users.username`.
    DuplicateKey {
        table: String,
        column: String,
    },
    /// Insert was asked for a record that already has an id.
    AlreadyPersisted(EntityRef),
    /// Update was asked for a record that was never inserted.
    Unpersisted(&'static str),
    /// Order insert without an owning user.
    DetachedOrder(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(entity) => write!(f, "{entity} not found"),
            Self::DuplicateKey { table, column } => {
                write!(f, "duplicate value for unique key {table}.{column}")
            }
            Self::AlreadyPersisted(entity) => write!(f, "{entity} is already persisted"),
            Self::Unpersisted(kind) => write!(f, "{kind} has not been persisted yet"),
            Self::DetachedOrder(order_number) => {
                write!(f, "order `{order_number}` is not attached to a user")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "repository requires column `{column}` in table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => err.into(),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match unique_violation(&value) {
            Some((table, column)) => Self::DuplicateKey { table, column },
            None => Self::Db(DbError::Sqlite(value)),
        }
    }
}

/// Extracts `(table, column)` from a SQLite `UNIQUE` failure.
fn unique_violation(err: &rusqlite::Error) -> Option<(String, String)> {
    let rusqlite::Error::SqliteFailure(code, message) = err else {
        return None;
    };
    if code.extended_code != rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
        return None;
    }

    // Message shape: "UNIQUE constraint failed: users.username"
    let target = message
        .as_deref()
        .and_then(|text| text.strip_prefix("UNIQUE constraint failed: "))
        .and_then(|rest| rest.split(',').next())
        .and_then(|first| first.trim().split_once('.'));
    Some(match target {
        Some((table, column)) => (table.to_string(), column.to_string()),
        None => ("unknown".to_string(), "unknown".to_string()),
    })
}

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    (
        "user_profiles",
        &[
            "id",
            "first_name",
            "last_name",
            "date_of_birth",
            "bio",
            "phone_number",
        ],
    ),
    (
        "users",
        &[
            "id",
            "username",
            "email",
            "profile_id",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "orders",
        &[
            "id",
            "order_number",
            "total_amount_cents",
            "order_date",
            "status",
            "user_id",
        ],
    ),
    (
        "blog_posts",
        &[
            "id",
            "title",
            "content",
            "author",
            "created_at",
            "updated_at",
        ],
    ),
];

/// Rejects connections that were not opened through `db::open_db*`.
pub fn ensure_schema_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in REQUIRED_COLUMNS {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
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

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` substring match.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}
