//! Subscriber directory — the single source of truth for who receives
//! broadcasts. Mutated by subscribe/unsubscribe independently of job flow;
//! each dispatch re-reads the current set.

use chrono::{DateTime, Utc};
use herald_core::error::{HeraldError, Result};
use herald_core::types::Subscriber;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::database::lock_conn;

/// Handle over the `subscribers` table.
#[derive(Clone)]
pub struct SubscriberDirectory {
    conn: Arc<Mutex<Connection>>,
}

impl SubscriberDirectory {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Add or refresh a subscriber. Re-subscribing updates display metadata.
    pub fn add(&self, subscriber: &Subscriber) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO subscribers (user_id, username, first_name, last_name, subscribed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                subscriber.user_id,
                subscriber.username,
                subscriber.first_name,
                subscriber.last_name,
                subscriber.subscribed_at.to_rfc3339(),
            ],
        )
        .map_err(|e| HeraldError::Store(format!("Add subscriber: {e}")))?;
        tracing::info!(
            "Subscriber {} ({}) joined",
            subscriber.user_id,
            subscriber.username.as_deref().unwrap_or("-")
        );
        Ok(())
    }

    /// Remove a subscriber. No-op if absent.
    pub fn remove(&self, user_id: i64) -> Result<()> {
        let conn = lock_conn(&self.conn)?;
        conn.execute("DELETE FROM subscribers WHERE user_id = ?1", [user_id])
            .map_err(|e| HeraldError::Store(format!("Remove subscriber: {e}")))?;
        tracing::info!("Subscriber {user_id} left");
        Ok(())
    }

    /// Membership check.
    pub fn contains(&self, user_id: i64) -> Result<bool> {
        let conn = lock_conn(&self.conn)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM subscribers WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .map_err(|e| HeraldError::Store(format!("Contains: {e}")))?;
        Ok(count > 0)
    }

    /// Snapshot of all recipient ids at call time.
    pub fn list_all(&self) -> Result<Vec<i64>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn
            .prepare("SELECT user_id FROM subscribers ORDER BY user_id")
            .map_err(|e| HeraldError::Store(format!("List subscribers: {e}")))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .map_err(|e| HeraldError::Store(format!("List subscribers: {e}")))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(|e| HeraldError::Store(format!("List subscribers: {e}")))?);
        }
        Ok(ids)
    }

    /// Current subscriber count.
    pub fn count(&self) -> Result<usize> {
        let conn = lock_conn(&self.conn)?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM subscribers", [], |row| row.get(0))
            .map_err(|e| HeraldError::Store(format!("Count: {e}")))?;
        Ok(count as usize)
    }

    /// Join timestamp for a subscriber, if subscribed.
    pub fn subscribed_at(&self, user_id: i64) -> Result<Option<DateTime<Utc>>> {
        let conn = lock_conn(&self.conn)?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT subscribed_at FROM subscribers WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .ok();
        Ok(stored
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)))
    }
}
