//! Transcript history storage
//!
//! Append-only log of completed sessions in a local SQLite database. The
//! schema is created lazily and idempotently on open; from the core's
//! perspective records are immutable once written.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection};
use tracing::info;

/// Timestamp format stored with each record (local time, second precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Row id assigned by the store on append
pub type SessionId = i64;

/// One persisted session as returned by history queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Start timestamp in [`TIMESTAMP_FORMAT`]
    pub started_at: String,
    /// Transcript text; may be empty or diagnostic
    pub text: String,
}

/// Durable append-and-read log of session records
pub trait HistoryStore {
    /// Append one completed session and return its assigned id
    fn append(&self, started_at: &str, stopped_at: &str, text: &str)
        -> Result<SessionId, StorageError>;

    /// All records, ascending by start timestamp
    fn list_all(&self) -> Result<Vec<HistoryEntry>, StorageError>;
}

/// Storage errors with contextual information
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to create history directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("History database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("History store lock poisoned")]
    LockPoisoned,
}

/// SQLite-backed history store
pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    /// Open (or create) the history database at `path`
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        info!("History database ready at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS transcriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                start_time TEXT,
                stop_time TEXT,
                transcription TEXT
            );
            ",
        )
    }
}

impl HistoryStore for SqliteHistory {
    fn append(
        &self,
        started_at: &str,
        stopped_at: &str,
        text: &str,
    ) -> Result<SessionId, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        conn.execute(
            "INSERT INTO transcriptions (start_time, stop_time, transcription) VALUES (?1, ?2, ?3)",
            params![started_at, stopped_at, text],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn list_all(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let mut stmt = conn
            .prepare("SELECT start_time, transcription FROM transcriptions ORDER BY start_time ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(HistoryEntry {
                started_at: row.get(0)?,
                text: row.get(1)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
