#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use rusqlite::{Connection, Error as SqliteError, OptionalExtension, params};
use thiserror::Error;

use super::{KeyValueStore, StoreError, entry_size};

/// Errors raised while opening a [`SqliteStore`].
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}")]
    Open {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Creating the key-value table failed.
    #[error("failed to create key-value schema")]
    CreateSchema {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// [`KeyValueStore`] persisted in a single SQLite table.
///
/// # Examples
/// ```
/// use pointzero_core::store::{KeyValueStore, SqliteStore};
///
/// let mut store = SqliteStore::open_in_memory().expect("open in-memory store");
/// store.set("greeting", "hello").expect("write entry");
/// assert_eq!(store.get("greeting").expect("read entry").as_deref(), Some("hello"));
/// ```
#[derive(Debug)]
pub struct SqliteStore {
    connection: Connection,
    quota: Option<usize>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SqliteStoreError> {
        let path = path.as_ref();
        let connection = Connection::open(path).map_err(|source| SqliteStoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(connection)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let connection =
            Connection::open_in_memory().map_err(|source| SqliteStoreError::Open {
                path: PathBuf::from(":memory:"),
                source,
            })?;
        Self::from_connection(connection)
    }

    /// Refuse writes that would grow the table beyond `quota` bytes.
    #[must_use]
    pub const fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    fn from_connection(connection: Connection) -> Result<Self, SqliteStoreError> {
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS kv_entries (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL
                ) WITHOUT ROWID",
                [],
            )
            .map_err(|source| SqliteStoreError::CreateSchema { source })?;
        Ok(Self {
            connection,
            quota: None,
        })
    }

    fn used_bytes_excluding(&self, key: &str) -> Result<usize, StoreError> {
        let used: i64 = self
            .connection
            .query_row(
                "SELECT COALESCE(SUM(length(CAST(key AS BLOB)) + length(CAST(value AS BLOB))), 0)
                 FROM kv_entries WHERE key <> ?1",
                [key],
                |row| row.get(0),
            )
            .map_err(|source| backend("measure usage", source))?;
        Ok(usize::try_from(used).unwrap_or(usize::MAX))
    }
}

fn backend(operation: &'static str, source: SqliteError) -> StoreError {
    StoreError::Backend {
        operation,
        source: Box::new(source),
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.connection
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|source| backend("read entry", source))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(quota) = self.quota {
            let required = self.used_bytes_excluding(key)? + entry_size(key, value);
            if required > quota {
                return Err(StoreError::QuotaExceeded { quota, required });
            }
        }
        self.connection
            .execute(
                "INSERT INTO kv_entries (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(|source| backend("write entry", source))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.connection
            .execute("DELETE FROM kv_entries WHERE key = ?1", [key])
            .map_err(|source| backend("remove entry", source))?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut statement = self
            .connection
            .prepare_cached("SELECT key FROM kv_entries WHERE substr(key, 1, ?2) = ?1 ORDER BY key")
            .map_err(|source| backend("prepare key scan", source))?;
        let prefix_len = i64::try_from(prefix.chars().count()).unwrap_or(i64::MAX);
        let rows = statement
            .query_map(params![prefix, prefix_len], |row| row.get::<_, String>(0))
            .map_err(|source| backend("scan keys", source))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|source| backend("read key", source))
    }
}
