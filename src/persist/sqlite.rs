//! SQLite-backed log database with secondary key index.

use std::path::Path;

use rusqlite::{
    Connection, OptionalExtension, ToSql, Transaction, params,
    types::ToSqlOutput,
};
use tracing::{info, warn};

use crate::{
    core::indices::all_index_keys,
    query::KeyRange,
    record::LogRecord,
    types::{Direction, IndexKey, IndexName},
};

use super::{LogBackend, PersistError, PersistResult};

const DROP_SCHEMA: &str = "DROP TABLE IF EXISTS log_keys; DROP TABLE IF EXISTS logs;";

/// SQLite implementation of [`crate::persist::LogBackend`].
pub struct SqliteLogDb {
    conn: Connection,
}

impl SqliteLogDb {
    /// Opens or creates the database at `path` at schema `version`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`. A file at an older
    /// version is wiped and recreated; a newer one is refused.
    pub fn open(path: impl AsRef<Path>, version: u32) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init_connection(conn, version)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory(version: u32) -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn, version)
    }

    fn init_connection(mut conn: Connection, version: u32) -> PersistResult<Self> {
        if version == 0 {
            return Err(PersistError::InvalidVersion);
        }

        let stored: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if stored > version {
            return Err(PersistError::VersionDowngrade {
                stored,
                requested: version,
            });
        }

        let tx = conn.transaction()?;
        if stored < version {
            if stored > 0 {
                warn!(stored, requested = version, "log schema changed, dropping stored entries");
            } else {
                info!(version, "creating log schema");
            }
            tx.execute_batch(DROP_SCHEMA)?;
            tx.execute_batch(include_str!("schema.sql"))?;
            tx.pragma_update(None, "user_version", version)?;
        } else {
            tx.execute_batch(include_str!("schema.sql"))?;
        }
        tx.commit()?;

        Ok(Self { conn })
    }

    /// Schema version recorded in the file.
    pub fn schema_version(&self) -> PersistResult<u32> {
        let version = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version)
    }
}

impl LogBackend for SqliteLogDb {
    fn put(&mut self, record: &LogRecord) -> PersistResult<()> {
        let payload = serde_json::to_vec(record)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO logs(id, payload) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET payload = excluded.payload",
            params![record.id(), payload],
        )?;
        tx.execute("DELETE FROM log_keys WHERE log_id = ?1", params![record.id()])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO log_keys(idx, key, log_id) VALUES (?1, ?2, ?3)")?;
            for (index, key) in all_index_keys(record) {
                stmt.execute(params![index.as_str(), key, record.id()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&mut self, id: &str) -> PersistResult<()> {
        let tx = self.conn.transaction()?;
        delete_in(&tx, id)?;
        tx.commit()?;
        Ok(())
    }

    fn get(&self, id: &str) -> PersistResult<Option<LogRecord>> {
        let payload: Option<Vec<u8>> = self
            .conn
            .query_row("SELECT payload FROM logs WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;

        payload.map(|p| decode_record(&p)).transpose()
    }

    fn contains(&self, id: &str) -> PersistResult<bool> {
        let hit: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM logs WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(hit.is_some())
    }

    fn scan(&self, visit: &mut dyn FnMut(LogRecord)) -> PersistResult<()> {
        let mut stmt = self.conn.prepare("SELECT payload FROM logs ORDER BY id ASC")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let payload: Vec<u8> = row.get(0)?;
            visit(decode_record(&payload)?);
        }
        Ok(())
    }

    fn scan_index(
        &self,
        index: IndexName,
        range: &KeyRange,
        direction: Direction,
        visit: &mut dyn FnMut(LogRecord),
    ) -> PersistResult<()> {
        let (predicate, bounds) = range_predicate(range);
        let sql = format!(
            "SELECT l.payload FROM log_keys k JOIN logs l ON l.id = k.log_id
             WHERE k.idx = ?1{predicate}
             ORDER BY k.key {dir}, k.log_id {dir}",
            dir = order_keyword(direction),
        );

        let name = index.as_str();
        let mut bind: Vec<&dyn ToSql> = vec![&name];
        bind.extend(bounds.iter().map(|k| *k as &dyn ToSql));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(bind.as_slice())?;
        while let Some(row) = rows.next()? {
            let payload: Vec<u8> = row.get(0)?;
            visit(decode_record(&payload)?);
        }
        Ok(())
    }

    fn delete_range(&mut self, index: IndexName, range: &KeyRange) -> PersistResult<usize> {
        let (predicate, bounds) = range_predicate(range);
        let sql = format!("SELECT DISTINCT k.log_id FROM log_keys k WHERE k.idx = ?1{predicate}");

        let name = index.as_str();
        let mut bind: Vec<&dyn ToSql> = vec![&name];
        bind.extend(bounds.iter().map(|k| *k as &dyn ToSql));

        let tx = self.conn.transaction()?;
        let ids: Vec<String> = {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(bind.as_slice(), |row| row.get(0))?;
            let ids = rows.collect::<Result<Vec<String>, _>>()?;
            ids
        };
        for id in &ids {
            delete_in(&tx, id)?;
        }
        tx.commit()?;
        Ok(ids.len())
    }

    fn close(self: Box<Self>) -> PersistResult<()> {
        self.conn.close().map_err(|(_, err)| PersistError::from(err))
    }
}

impl ToSql for IndexKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            IndexKey::Int(v) => ToSqlOutput::from(*v),
            IndexKey::Text(v) => ToSqlOutput::from(v.as_str()),
        })
    }
}

fn order_keyword(direction: Direction) -> &'static str {
    match direction {
        Direction::Next => "ASC",
        Direction::Prev => "DESC",
    }
}

fn range_predicate(range: &KeyRange) -> (&'static str, Vec<&IndexKey>) {
    match range {
        KeyRange::All => ("", Vec::new()),
        KeyRange::Only(key) => (" AND k.key = ?2", vec![key]),
        KeyRange::Bound { lower, upper } => (" AND k.key >= ?2 AND k.key <= ?3", vec![lower, upper]),
        KeyRange::UpperBound(upper) => (" AND k.key <= ?2", vec![upper]),
        KeyRange::LowerBound(lower) => (" AND k.key >= ?2", vec![lower]),
    }
}

fn delete_in(tx: &Transaction<'_>, id: &str) -> PersistResult<()> {
    tx.execute("DELETE FROM log_keys WHERE log_id = ?1", params![id])?;
    tx.execute("DELETE FROM logs WHERE id = ?1", params![id])?;
    Ok(())
}

fn decode_record(payload: &[u8]) -> PersistResult<LogRecord> {
    Ok(serde_json::from_slice(payload)?)
}
