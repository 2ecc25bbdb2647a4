//! SQLite-based persistence.
//!
//! Provides storage for:
//! - the single persisted sleep record (key-value table)
//! - completed/abandoned session history, for diagnostics

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::StorageError;
use crate::session::SleepRecord;

const RECORD_KEY: &str = "sleep_record";

/// History entry outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    /// The alarm fired at the deadline.
    Completed,
    /// The grace window expired without sleep returning.
    Abandoned,
}

impl SessionOutcome {
    fn as_str(self) -> &'static str {
        match self {
            SessionOutcome::Completed => "completed",
            SessionOutcome::Abandoned => "abandoned",
        }
    }

    fn parse(s: &str) -> Result<Self, StorageError> {
        match s {
            "completed" => Ok(SessionOutcome::Completed),
            "abandoned" => Ok(SessionOutcome::Abandoned),
            other => Err(StorageError::CorruptRecord(format!(
                "unknown session outcome: {other}"
            ))),
        }
    }
}

/// One row of session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: i64,
    pub session_no: u64,
    pub outcome: SessionOutcome,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
}

/// SQLite database holding the persisted record and session history.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/somnia/somnia.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self, StorageError> {
        Self::open_at(&data_dir()?.join("somnia.db"))
    }

    /// Open a database at an explicit path.
    pub fn open_at(path: &std::path::Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (tests, dry runs).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::OpenFailed {
            path: ":memory:".into(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS sessions (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_no INTEGER NOT NULL,
                    outcome    TEXT NOT NULL,
                    started_at TEXT,
                    ended_at   TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_ended_at ON sessions(ended_at);",
            )
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))
    }

    // ── Persisted record ─────────────────────────────────────────────

    /// Load the persisted sleep record, or `None` on first use.
    pub fn load_record(&self) -> Result<Option<SleepRecord>, StorageError> {
        let Some(json) = self.kv_get(RECORD_KEY)? else {
            return Ok(None);
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| StorageError::CorruptRecord(e.to_string()))
    }

    /// Persist the sleep record. Fire-and-forget from the state machine's
    /// perspective; callers write the record before registering deadlines.
    pub fn save_record(&self, record: &SleepRecord) -> Result<(), StorageError> {
        let json =
            serde_json::to_string(record).map_err(|e| StorageError::CorruptRecord(e.to_string()))?;
        self.kv_set(RECORD_KEY, &json)
    }

    // ── Session history ──────────────────────────────────────────────

    /// Append one finished session to the history.
    pub fn record_session(
        &self,
        session_no: u64,
        outcome: SessionOutcome,
        started_at: Option<DateTime<Utc>>,
        ended_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO sessions (session_no, outcome, started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session_no as i64,
                outcome.as_str(),
                started_at.map(|t| t.to_rfc3339()),
                ended_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent history rows, newest first.
    pub fn recent_sessions(&self, limit: u32) -> Result<Vec<SessionRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_no, outcome, started_at, ended_at
             FROM sessions ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, session_no, outcome, started_at, ended_at) = row?;
            sessions.push(SessionRow {
                id,
                session_no: session_no as u64,
                outcome: SessionOutcome::parse(&outcome)?,
                started_at: started_at.map(|s| parse_ts(&s)).transpose()?,
                ended_at: parse_ts(&ended_at)?,
            });
        }
        Ok(sessions)
    }

    // ── Key-value store ──────────────────────────────────────────────

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::CorruptRecord(format!("bad timestamp {s}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Activity;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn kv_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_set("test", "replaced").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "replaced");
    }

    #[test]
    fn record_absent_on_first_use() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_record().unwrap().is_none());
    }

    #[test]
    fn record_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let record = SleepRecord {
            start_time: Some(ts(1000)),
            original_start_time: Some(ts(1000)),
            scheduled_alarm_time: Some(ts(1000 + 8 * 3600)),
            session_count: 4,
            last_activity: Some(Activity::Asleep),
            monitoring_active: true,
            ..Default::default()
        };
        db.save_record(&record).unwrap();
        assert_eq!(db.load_record().unwrap().unwrap(), record);
    }

    #[test]
    fn session_history_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.record_session(1, SessionOutcome::Abandoned, Some(ts(100)), ts(200))
            .unwrap();
        db.record_session(2, SessionOutcome::Completed, Some(ts(300)), ts(400))
            .unwrap();
        db.record_session(3, SessionOutcome::Completed, None, ts(500))
            .unwrap();

        let rows = db.recent_sessions(2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].session_no, 3);
        assert_eq!(rows[0].started_at, None);
        assert_eq!(rows[1].session_no, 2);
        assert_eq!(rows[1].outcome, SessionOutcome::Completed);
        assert_eq!(rows[1].started_at, Some(ts(300)));
    }
}
