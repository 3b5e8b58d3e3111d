//! Persistence abstraction and SQLite implementation.

/// SQLite-backed log database.
pub mod sqlite;

use thiserror::Error;

use crate::{
    query::KeyRange,
    record::LogRecord,
    types::{Direction, IndexName},
};

/// Failure inside the embedded database.
#[derive(Debug, Error)]
pub enum PersistError {
    /// SQLite rejected a statement or the file.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored payload could not be encoded or decoded.
    #[error("record payload: {0}")]
    Serde(#[from] serde_json::Error),
    /// Failure around a backend call, such as a panicked blocking task.
    #[error("{0}")]
    Message(String),
    /// Schema version 0 was requested.
    #[error("schema version must be at least 1")]
    InvalidVersion,
    /// The file was written by a newer schema.
    #[error("stored schema version {stored} is newer than requested version {requested}")]
    VersionDowngrade {
        /// Version found in the file.
        stored: u32,
        /// Version asked for by the caller.
        requested: u32,
    },
}

/// Result alias for backend calls.
pub type PersistResult<T> = Result<T, PersistError>;

/// Synchronous access to the embedded database. Each call is one transaction.
pub trait LogBackend: Send {
    /// Inserts or replaces the record keyed by its id.
    fn put(&mut self, record: &LogRecord) -> PersistResult<()>;
    /// Removes the record; absent ids are not an error.
    fn delete(&mut self, id: &str) -> PersistResult<()>;
    /// Point lookup by primary key.
    fn get(&self, id: &str) -> PersistResult<Option<LogRecord>>;
    /// Returns true when a record with `id` exists.
    fn contains(&self, id: &str) -> PersistResult<bool> {
        Ok(self.get(id)?.is_some())
    }
    /// Visits every record in primary key order.
    fn scan(&self, visit: &mut dyn FnMut(LogRecord)) -> PersistResult<()>;
    /// Visits records whose `index` keys fall in `range`, ordered by key then id.
    fn scan_index(
        &self,
        index: IndexName,
        range: &KeyRange,
        direction: Direction,
        visit: &mut dyn FnMut(LogRecord),
    ) -> PersistResult<()>;
    /// Deletes every record with at least one `index` key in `range`.
    fn delete_range(&mut self, index: IndexName, range: &KeyRange) -> PersistResult<usize>;
    /// Releases the underlying connection.
    fn close(self: Box<Self>) -> PersistResult<()> {
        Ok(())
    }
}
