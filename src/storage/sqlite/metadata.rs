//! `SQLite`-backed memory metadata store.

use super::{acquire_lock, configure_connection, record_operation_metrics, status_of};
use crate::models::{IndexedMemory, MemoryId, MemoryMetadata, MemoryType};
use crate::storage::traits::MetadataStore;
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const SELECT_COLUMNS: &str =
    "SELECT id, memory_type, timestamp, importance, document, content, related_entities FROM memories";

/// Stores memory rows in a single `memories` table keyed by id.
///
/// Timestamps are stored as fixed-width RFC 3339 text with nanoseconds, so
/// they round-trip exactly and sort chronologically.
pub struct SqliteMetadataStore {
    /// Protected by Mutex because `rusqlite::Connection` is not `Sync`.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteMetadataStore {
    /// Opens or creates a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::index("create_index_dir", e))?;
        }
        let conn = Connection::open(&db_path).map_err(|e| Error::index("open_sqlite", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| Error::index("open_sqlite_in_memory", e))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                memory_type TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                importance INTEGER NOT NULL,
                document TEXT NOT NULL,
                content TEXT NOT NULL,
                related_entities TEXT NOT NULL DEFAULT '[]'
            );
            CREATE INDEX IF NOT EXISTS idx_memories_timestamp ON memories(timestamp DESC);",
        )
        .map_err(|e| Error::index("create_memories_table", e))
    }

    fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
        Ok(RawRow {
            id: row.get(0)?,
            memory_type: row.get(1)?,
            timestamp: row.get(2)?,
            importance: row.get(3)?,
            document: row.get(4)?,
            content: row.get(5)?,
            related_entities: row.get(6)?,
        })
    }
}

/// A row as stored, before decoding.
struct RawRow {
    id: String,
    memory_type: String,
    timestamp: String,
    importance: i64,
    document: String,
    content: String,
    related_entities: String,
}

impl RawRow {
    fn decode(self) -> Result<IndexedMemory> {
        let memory_type: MemoryType = self
            .memory_type
            .parse()
            .map_err(|e| Error::index("decode_memory_row", e))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| Error::index("decode_memory_row", e))?
            .with_timezone(&Utc);
        let related_entities: Vec<String> = serde_json::from_str(&self.related_entities)
            .map_err(|e| Error::index("decode_memory_row", e))?;

        Ok(IndexedMemory {
            id: MemoryId::new(self.id),
            document: self.document,
            content: self.content,
            metadata: MemoryMetadata {
                memory_type,
                timestamp,
                importance: self.importance,
            },
            related_entities,
        })
    }
}

fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl MetadataStore for SqliteMetadataStore {
    #[instrument(skip(self, rows), fields(operation = "upsert_batch", backend = "sqlite", count = rows.len()))]
    fn upsert_batch(&self, rows: &[IndexedMemory]) -> Result<()> {
        let start = Instant::now();
        let result = (|| {
            let mut conn = acquire_lock(&self.conn);
            let tx = conn
                .transaction()
                .map_err(|e| Error::index("begin_transaction", e))?;

            for row in rows {
                let entities = serde_json::to_string(&row.related_entities)
                    .map_err(|e| Error::index("encode_memory_row", e))?;
                tx.execute(
                    "INSERT OR REPLACE INTO memories
                        (id, memory_type, timestamp, importance, document, content, related_entities)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        row.id.as_str(),
                        row.metadata.memory_type.as_str(),
                        encode_timestamp(&row.metadata.timestamp),
                        row.metadata.importance,
                        row.document,
                        row.content,
                        entities,
                    ],
                )
                .map_err(|e| Error::index("insert_memory", e))?;
            }

            tx.commit()
                .map_err(|e| Error::index("commit_transaction", e))
        })();

        record_operation_metrics("sqlite", "upsert", start, status_of(&result));
        result
    }

    #[instrument(skip(self), fields(operation = "get", backend = "sqlite", memory.id = %id.as_str()))]
    fn get(&self, id: &MemoryId) -> Result<Option<IndexedMemory>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let raw = conn
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                    params![id.as_str()],
                    Self::read_row,
                )
                .optional()
                .map_err(|e| Error::index("get_memory", e))?;
            raw.map(RawRow::decode).transpose()
        })();

        record_operation_metrics("sqlite", "get", start, status_of(&result));
        result
    }

    fn recent(&self, limit: usize) -> Result<Vec<IndexedMemory>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare(&format!(
                    "{SELECT_COLUMNS} ORDER BY timestamp DESC, rowid DESC LIMIT ?1"
                ))
                .map_err(|e| Error::index("recent_memories", e))?;
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows = stmt
                .query_map(params![limit], Self::read_row)
                .map_err(|e| Error::index("recent_memories", e))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| Error::index("recent_memories", e))?;
            rows.into_iter().map(RawRow::decode).collect()
        })();

        record_operation_metrics("sqlite", "recent", start, status_of(&result));
        result
    }

    #[instrument(skip(self), fields(operation = "remove", backend = "sqlite", memory.id = %id.as_str()))]
    fn remove(&self, id: &MemoryId) -> Result<bool> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let deleted = conn
                .execute("DELETE FROM memories WHERE id = ?1", params![id.as_str()])
                .map_err(|e| Error::index("delete_memory", e))?;
            Ok(deleted > 0)
        })();

        record_operation_metrics("sqlite", "remove", start, status_of(&result));
        result
    }

    fn count(&self) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
            .map_err(|e| Error::index("count_memories", e))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn clear(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute("DELETE FROM memories", [])
            .map_err(|e| Error::index("clear_memories", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn row(id: &str, content: &str, minutes: i64) -> IndexedMemory {
        IndexedMemory {
            id: MemoryId::new(id),
            document: content.to_string(),
            content: content.to_string(),
            metadata: MemoryMetadata {
                memory_type: MemoryType::Observation,
                timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
                    + Duration::minutes(minutes),
                importance: 3,
            },
            related_entities: vec!["Mira".to_string()],
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let store = SqliteMetadataStore::in_memory().expect("open");
        let original = row("a", "first", 0);
        store
            .upsert_batch(std::slice::from_ref(&original))
            .expect("upsert");

        let fetched = store
            .get(&MemoryId::new("a"))
            .expect("get")
            .expect("row present");
        assert_eq!(fetched, original);
    }

    #[test]
    fn test_timestamp_round_trips_with_nanos() {
        let store = SqliteMetadataStore::in_memory().expect("open");
        let mut original = row("n", "precise", 0);
        original.metadata.timestamp = Utc::now();
        store
            .upsert_batch(std::slice::from_ref(&original))
            .expect("upsert");
        let fetched = store.get(&original.id).expect("get").expect("present");
        assert_eq!(fetched.metadata.timestamp, original.metadata.timestamp);
    }

    #[test]
    fn test_upsert_same_id_overwrites() {
        let store = SqliteMetadataStore::in_memory().expect("open");
        store.upsert_batch(&[row("a", "old", 0)]).expect("upsert");
        store.upsert_batch(&[row("a", "new", 1)]).expect("upsert");

        assert_eq!(store.count().expect("count"), 1);
        let fetched = store.get(&MemoryId::new("a")).expect("get").expect("present");
        assert_eq!(fetched.content, "new");
    }

    #[test]
    fn test_recent_newest_first() {
        let store = SqliteMetadataStore::in_memory().expect("open");
        store
            .upsert_batch(&[row("a", "a", 0), row("b", "b", 10), row("c", "c", 5)])
            .expect("upsert");

        let ids: Vec<String> = store
            .recent(2)
            .expect("recent")
            .into_iter()
            .map(|r| r.id.to_string())
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_remove() {
        let store = SqliteMetadataStore::in_memory().expect("open");
        store.upsert_batch(&[row("a", "a", 0)]).expect("upsert");
        assert!(store.remove(&MemoryId::new("a")).expect("remove"));
        assert!(!store.remove(&MemoryId::new("a")).expect("remove"));
        assert_eq!(store.count().expect("count"), 0);
    }

    #[test]
    fn test_get_many_preserves_order() {
        let store = SqliteMetadataStore::in_memory().expect("open");
        store
            .upsert_batch(&[row("a", "a", 0), row("b", "b", 1)])
            .expect("upsert");
        let rows = store
            .get_many(&[MemoryId::new("b"), MemoryId::new("ghost"), MemoryId::new("a")])
            .expect("get_many");
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_file_backed_persists() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("memory").join("memories.db");
        {
            let store = SqliteMetadataStore::open(&path).expect("open");
            store.upsert_batch(&[row("kept", "kept", 0)]).expect("upsert");
        }
        let store = SqliteMetadataStore::open(&path).expect("reopen");
        assert_eq!(store.count().expect("count"), 1);
        assert_eq!(store.db_path(), Some(path.as_path()));
    }
}
