//! SQLite persistence for users, lists and tasks.
//!
//! One connection behind an async mutex. Every operation that repositions
//! rows runs in a single transaction and leaves the affected sequences
//! numbered `0..n-1`, so the server never exposes gaps or duplicates.
//!
//! All queries are scoped by owner: a list or task belonging to someone else
//! is reported as [`StoreError::NotFound`], exactly like a missing one.

mod lists;
mod migrations;
mod tasks;
mod users;

pub use users::User;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Transaction};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("email already registered: {0}")]
    EmailTaken(String),

    #[error("database schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Handle to the Taskflow database.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database file and apply pending migrations.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let store = Self::bootstrap(conn)?;
        tracing::info!("Opened database at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(mut conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::apply(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Column conversions
// ─────────────────────────────────────────────────────────────────────────────

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

pub(crate) fn uuid_column(column: usize, raw: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&raw).map_err(|e| conversion_error(column, e))
}

pub(crate) fn time_column(column: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

pub(crate) fn timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339()
}

/// Clamp a requested order to an insert index in `0..=len`.
pub(crate) fn insert_index(order: Option<i64>, len: usize) -> usize {
    match order {
        Some(order) if order <= 0 => 0,
        Some(order) => usize::try_from(order).map_or(len, |o| o.min(len)),
        None => len,
    }
}

/// Which table a sequence lives in.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Sequence {
    Lists,
    Tasks,
}

impl Sequence {
    fn update_sql(self) -> &'static str {
        match self {
            Self::Lists => "UPDATE lists SET sort_order = ?1 WHERE id = ?2",
            Self::Tasks => "UPDATE tasks SET sort_order = ?1 WHERE id = ?2",
        }
    }
}

/// Write `sort_order = index` for each id, in order.
pub(crate) fn write_sequence(tx: &Transaction<'_>, seq: Sequence, ids: &[Uuid]) -> StoreResult<()> {
    let mut stmt = tx.prepare_cached(seq.update_sql())?;
    for (index, id) in ids.iter().enumerate() {
        stmt.execute(params![index as i64, id.to_string()])?;
    }
    Ok(())
}
