//! Event persistence: an append-only SQLite store and an in-memory twin.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use thiserror::Error;

use crate::record::EventRecord;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to write crop image {path}: {source}")]
    ImageWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Append-only persistence for detection events.
///
/// `append_event` returns the assigned row id. `store_crop` places the
/// JPEG bytes under a unique name and returns the path; callers decide
/// whether the path ends up on the record.
pub trait EventStore: Send {
    fn append_event(&mut self, record: &EventRecord) -> Result<i64, StorageError>;
    fn store_crop(&mut self, jpeg: &[u8]) -> Result<PathBuf, StorageError>;
}

/// SQLite-backed store: one `detections` table plus a crop directory.
pub struct SqliteEventStore {
    conn: Connection,
    crops_dir: PathBuf,
}

impl SqliteEventStore {
    /// Open (or create) the database and the crop directory.
    pub fn open(db_path: &Path, crops_dir: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::ImageWrite {
                path: parent.display().to_string(),
                source,
            })?;
        }
        std::fs::create_dir_all(crops_dir).map_err(|source| StorageError::ImageWrite {
            path: crops_dir.display().to_string(),
            source,
        })?;

        let conn = Connection::open(db_path)?;
        let store = Self {
            conn,
            crops_dir: crops_dir.to_path_buf(),
        };
        store.ensure_schema()?;
        tracing::info!(
            db = %db_path.display(),
            crops = %crops_dir.display(),
            "event store opened"
        );
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS detections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                identity TEXT NOT NULL,
                detail TEXT NOT NULL,
                date TEXT NOT NULL,
                time TEXT NOT NULL,
                image_path TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_detections_date ON detections(date, time);
            "#,
        )?;
        Ok(())
    }

    /// Number of stored events. Diagnostics only.
    pub fn event_count(&self) -> Result<i64, StorageError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM detections", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl EventStore for SqliteEventStore {
    fn append_event(&mut self, record: &EventRecord) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO detections (identity, detail, date, time, image_path)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.identity,
                record.detail,
                record.date,
                record.time,
                record.image_path
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn store_crop(&mut self, jpeg: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.crops_dir.join(crop_file_name());
        std::fs::write(&path, jpeg).map_err(|source| StorageError::ImageWrite {
            path: path.display().to_string(),
            source,
        })?;
        Ok(path)
    }
}

/// Unique crop file name: local timestamp plus a short random suffix so
/// several faces within the same second cannot collide.
fn crop_file_name() -> String {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("detection_{stamp}_{}.jpg", &uuid[..8])
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryEventStore {
    pub events: Vec<EventRecord>,
    pub crops: Vec<Vec<u8>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for MemoryEventStore {
    fn append_event(&mut self, record: &EventRecord) -> Result<i64, StorageError> {
        let id = self.events.len() as i64 + 1;
        let mut stored = record.clone();
        stored.id = Some(id);
        self.events.push(stored);
        Ok(id)
    }

    fn store_crop(&mut self, jpeg: &[u8]) -> Result<PathBuf, StorageError> {
        self.crops.push(jpeg.to_vec());
        Ok(PathBuf::from(format!("memory://crop/{}", self.crops.len())))
    }
}
