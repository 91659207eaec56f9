//! Database handle — opens the SQLite file and runs migrations.

use herald_core::error::{HeraldError, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::jobs::JobStore;
use crate::subscribers::SubscriberDirectory;

/// Shared SQLite database. One long-lived connection guarded by a mutex,
/// scoped-acquired per call (no per-request open/close).
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database file and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| HeraldError::Store(format!("DB open: {e}")))?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        tracing::info!("Database ready at {}", path.display());
        Ok(db)
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| HeraldError::Store(format!("DB open: {e}")))?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS subscribers (
                user_id INTEGER PRIMARY KEY,
                username TEXT,
                first_name TEXT,
                last_name TEXT,
                subscribed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS scheduled_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_type TEXT NOT NULL,        -- 'text', 'photo', 'video'
                message_content TEXT,              -- body for text payloads
                media_id TEXT,                     -- file_id or file://path
                caption TEXT,
                scheduled_time TEXT NOT NULL,
                created_at TEXT NOT NULL,
                created_by INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'  -- pending, sent, failed
            );
            ",
        )
        .map_err(|e| HeraldError::Store(format!("Migration: {e}")))?;
        Ok(())
    }

    /// Job store handle over this database.
    pub fn jobs(&self) -> JobStore {
        JobStore::new(self.conn.clone())
    }

    /// Subscriber directory handle over this database.
    pub fn subscribers(&self) -> SubscriberDirectory {
        SubscriberDirectory::new(self.conn.clone())
    }

    pub(crate) fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| HeraldError::Store(format!("DB lock poisoned: {e}")))
    }
}

pub(crate) fn lock_conn(
    conn: &Arc<Mutex<Connection>>,
) -> Result<std::sync::MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| HeraldError::Store(format!("DB lock poisoned: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_migrate() {
        let dir = std::env::temp_dir().join("herald-db-test");
        std::fs::create_dir_all(&dir).ok();
        let db = Database::open(&dir.join("test.db")).unwrap();
        assert!(db.jobs().list_pending().unwrap().is_empty());
        assert_eq!(db.subscribers().count().unwrap(), 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db.migrate().unwrap();
    }
}
