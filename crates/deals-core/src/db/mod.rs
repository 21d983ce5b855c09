//! SQLite persistence for stages, opportunities and activities.
//!
//! Connections run with:
//! - `journal_mode = WAL` so readers never block the single writer
//! - `busy_timeout = 5s` so concurrent CLI invocations wait instead of failing
//! - `foreign_keys = ON` so activities cannot outlive their opportunity
//!
//! Writes to opportunities and activities are conditional on the
//! `updated_at` value the caller read; a mismatch is reported as
//! [`StoreError::ConcurrentModification`] and nothing is written.

pub mod activities;
pub mod migrations;
pub mod opportunities;
pub mod schema;
pub mod stages;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, types::Type};
use rust_decimal::Decimal;
use std::{path::Path, str::FromStr, time::Duration};

use crate::error::ErrorCode;

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database file name inside the project directory.
pub const DB_FILE: &str = "deals.sqlite3";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} '{id}' was changed by someone else since it was read")]
    ConcurrentModification { entity: &'static str, id: String },

    #[error("storage failure: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::ConcurrentModification { .. } => ErrorCode::ConcurrentModification,
            Self::Sqlite(_) => ErrorCode::StorageFailure,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Handle on a migrated deals database.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Wrap an open connection, configuring and migrating it.
    ///
    /// # Errors
    ///
    /// Returns an error if pragmas or migrations fail.
    pub fn from_connection(mut conn: Connection) -> Result<Self, StoreError> {
        configure_connection(&conn)?;
        migrations::migrate(&mut conn)?;
        Ok(Self { conn })
    }

    /// Fresh in-memory store, used by tests and dry runs.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Open (or create) the store at `path` and migrate it to the latest schema.
///
/// # Errors
///
/// Returns an error if the directory, connection, pragmas or migrations fail.
pub fn open_store(path: &Path) -> Result<Store> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create store directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("open deals database {}", path.display()))?;

    Store::from_connection(conn).with_context(|| format!("prepare deals database {}", path.display()))
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Column codecs
// ---------------------------------------------------------------------------

pub(crate) fn to_micros(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_micros()
}

pub(crate) fn from_micros(column: usize, micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, micros))
}

pub(crate) fn from_micros_opt(column: usize, micros: Option<i64>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    micros.map(|us| from_micros(column, us)).transpose()
}

/// Parse a text column with `FromStr`, reporting failures against `column`.
pub(crate) fn parse_text<T>(column: usize, text: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    text.parse::<T>()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(error)))
}

pub(crate) fn parse_decimal(column: usize, text: Option<String>) -> rusqlite::Result<Option<Decimal>> {
    text.map(|t| parse_text::<Decimal>(column, &t)).transpose()
}

pub(crate) fn parse_date(column: usize, text: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    text.map(|t| parse_text::<NaiveDate>(column, &t)).transpose()
}

#[cfg(test)]
mod tests {
    use super::{DB_FILE, DEFAULT_BUSY_TIMEOUT, migrations, open_store};
    use crate::model::stage::SystemRole;
    use crate::model::stage::tests::stage;
    use tempfile::TempDir;

    fn temp_db_path() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(".deals").join(DB_FILE);
        (dir, path)
    }

    #[test]
    fn open_store_sets_wal_busy_timeout_and_fk() {
        let (_dir, path) = temp_db_path();
        let store = open_store(&path).expect("open store");
        let conn = store.connection();

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(u128::from(busy_timeout_ms), DEFAULT_BUSY_TIMEOUT.as_millis());

        let foreign_keys: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("query foreign_keys");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn open_store_creates_parent_and_migrates() {
        let (_dir, path) = temp_db_path();
        let store = open_store(&path).expect("open store");
        assert!(path.exists());
        let version = migrations::current_schema_version(store.connection()).expect("version");
        assert_eq!(version, migrations::LATEST_SCHEMA_VERSION);
    }

    #[test]
    fn reopening_keeps_data() {
        let (_dir, path) = temp_db_path();
        {
            let store = open_store(&path).expect("first open");
            store
                .insert_stage(&stage("lead", 1, SystemRole::Normal))
                .expect("insert");
        }
        let store = open_store(&path).expect("reopen");
        assert_eq!(store.list_stages("sales").expect("list").len(), 1);
    }
}
