use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::sync::Mutex;

use super::RecordStore;
use crate::record::{parse_timestamp, PredictionRecord, RecordId};

/// Local SQLite history. One connection, serialized behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn: Mutex::new(conn) };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "BEGIN;
                CREATE TABLE IF NOT EXISTS predictions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    subject_label TEXT NOT NULL,
                    probability REAL NOT NULL,
                    recorded_at TEXT NOT NULL,
                    feedback TEXT
                );
                COMMIT;",
            )?;
            Ok(())
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))?;
        f(&mut *conn)
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn append(&self, record: &PredictionRecord) -> Result<RecordId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO predictions (subject_label, probability, recorded_at, feedback)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.subject_label,
                    record.probability(),
                    record.recorded_at_text(),
                    record.feedback
                ],
            )?;
            Ok(RecordId(conn.last_insert_rowid()))
        })
    }

    async fn list_all(&self) -> Result<Vec<PredictionRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, subject_label, probability, recorded_at, feedback
                 FROM predictions ORDER BY recorded_at ASC, id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?;
            let mut out = Vec::new();
            for row in rows {
                let (id, subject, probability, recorded_at, feedback) = row?;
                let ts = parse_timestamp(&recorded_at)?;
                out.push(
                    PredictionRecord::new(subject, probability, ts)
                        .with_id(RecordId(id))
                        .with_feedback(feedback),
                );
            }
            Ok(out)
        })
    }

    async fn update_feedback(&self, id: RecordId, text: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE predictions SET feedback = ?1 WHERE id = ?2",
                params![text, id.0],
            )?;
            Ok(n > 0)
        })
    }

    async fn clear_all(&self) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM predictions", [])?;
            Ok(true)
        })
    }

    async fn delete(&self, id: RecordId) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM predictions WHERE id = ?1", params![id.0])?;
            Ok(n > 0)
        })
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
