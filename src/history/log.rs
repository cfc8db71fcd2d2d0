use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, params};

use crate::foundation::error::{FramelabError, FramelabResult};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS operations (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id   TEXT NOT NULL,
    operation   TEXT NOT NULL,
    timestamp   TEXT NOT NULL
);
";

/// One immutable history record.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct LogEntry {
    pub id: i64,
    pub source_id: String,
    pub operation: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only history of `(source, operation, timestamp)` records.
///
/// Implementations must make each call atomic with respect to every other call: concurrent
/// appends are neither lost nor duplicated, and `recent` sees every append that returned
/// before it was called.
pub trait OperationLog: Send + Sync {
    fn append_at(
        &self,
        source_id: &str,
        operation: &str,
        timestamp: DateTime<Utc>,
    ) -> FramelabResult<LogEntry>;

    /// At most `limit` entries, newest first.
    fn recent(&self, limit: usize) -> FramelabResult<Vec<LogEntry>>;

    fn append(&self, source_id: &str, operation: &str) -> FramelabResult<LogEntry> {
        self.append_at(source_id, operation, Utc::now())
    }
}

/// SQLite-backed [`OperationLog`]. One connection, serialized behind a mutex.
pub struct SqliteLog {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteLog {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> FramelabResult<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                FramelabError::log_write(format!(
                    "failed to create database directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path).map_err(|e| {
            FramelabError::log_write(format!(
                "failed to open database '{}': {e}",
                path.display()
            ))
        })?;
        let log = Self::with_connection(conn, Some(path.to_path_buf()))?;
        tracing::debug!(path = %path.display(), "operation log opened");
        Ok(log)
    }

    pub fn in_memory() -> FramelabResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FramelabError::log_write(format!("failed to open in-memory db: {e}")))?;
        Self::with_connection(conn, None)
    }

    fn with_connection(conn: Connection, db_path: Option<PathBuf>) -> FramelabResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| FramelabError::log_write(format!("failed to create schema: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn count(&self) -> FramelabResult<i64> {
        self.lock()
            .query_row("SELECT COUNT(*) FROM operations", [], |row| row.get(0))
            .map_err(|e| FramelabError::log_query(format!("count failed: {e}")))
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave a half-applied statement behind.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl OperationLog for SqliteLog {
    fn append_at(
        &self,
        source_id: &str,
        operation: &str,
        timestamp: DateTime<Utc>,
    ) -> FramelabResult<LogEntry> {
        // Stored with microsecond precision; hand back exactly what a later read returns.
        let timestamp = timestamp.trunc_subsecs(6);
        let stamp = timestamp.to_rfc3339_opts(SecondsFormat::Micros, true);
        let conn = self.lock();
        conn.execute(
            "INSERT INTO operations (source_id, operation, timestamp) VALUES (?1, ?2, ?3)",
            params![source_id, operation, stamp],
        )
        .map_err(|e| FramelabError::log_write(format!("insert failed: {e}")))?;
        Ok(LogEntry {
            id: conn.last_insert_rowid(),
            source_id: source_id.to_string(),
            operation: operation.to_string(),
            timestamp,
        })
    }

    fn recent(&self, limit: usize) -> FramelabResult<Vec<LogEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, source_id, operation, timestamp FROM operations
                 ORDER BY id DESC LIMIT ?1",
            )
            .map_err(|e| FramelabError::log_query(format!("prepare failed: {e}")))?;

        let rows = stmt
            .query_map([limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| FramelabError::log_query(format!("query failed: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, source_id, operation, stamp) =
                row.map_err(|e| FramelabError::log_query(format!("row decode failed: {e}")))?;
            let timestamp = DateTime::parse_from_rfc3339(&stamp)
                .map_err(|e| {
                    FramelabError::log_query(format!(
                        "entry {id} has a bad timestamp '{stamp}': {e}"
                    ))
                })?
                .with_timezone(&Utc);
            entries.push(LogEntry {
                id,
                source_id,
                operation,
                timestamp,
            });
        }
        Ok(entries)
    }
}

impl std::fmt::Debug for SqliteLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLog")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn recent_is_newest_first_and_bounded() {
        let log = SqliteLog::in_memory().unwrap();
        for op in ["grayscale", "blur", "edge"] {
            log.append("drone", op).unwrap();
        }
        let got = log.recent(2).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].operation, "edge");
        assert_eq!(got[1].operation, "blur");
        assert!(got[0].id > got[1].id);
        assert_eq!(log.recent(10).unwrap().len(), 3);
        assert!(log.recent(0).unwrap().is_empty());
    }

    #[test]
    fn timestamps_round_trip_through_storage() {
        let log = SqliteLog::in_memory().unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let written = log.append_at("drone", "grayscale", ts).unwrap();
        let read = log.recent(1).unwrap();
        assert_eq!(read, vec![written]);
    }

    #[test]
    fn recent_does_not_see_later_appends() {
        let log = SqliteLog::in_memory().unwrap();
        log.append("a", "blur").unwrap();
        let snapshot = log.recent(5).unwrap();
        log.append("a", "edge").unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.recent(5).unwrap().len(), 2);
    }

    #[test]
    fn concurrent_appends_are_neither_lost_nor_duplicated() {
        let log = Arc::new(SqliteLog::in_memory().unwrap());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for i in 0..25 {
                        log.append(&format!("src{t}"), &format!("op{i}")).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let all = log.recent(1000).unwrap();
        assert_eq!(all.len(), 200);
        assert_eq!(log.count().unwrap(), 200);
        let mut ids: Vec<_> = all.iter().map(|e| e.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 200);
        assert!(all.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");
        {
            let log = SqliteLog::open(&path).unwrap();
            log.append("drone", "sharpen").unwrap();
        }
        let log = SqliteLog::open(&path).unwrap();
        let got = log.recent(1).unwrap();
        assert_eq!(got[0].source_id, "drone");
        assert_eq!(got[0].operation, "sharpen");
        assert_eq!(log.path(), Some(path.as_path()));
    }
}
