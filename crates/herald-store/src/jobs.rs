//! Durable record of scheduled and completed broadcast jobs.

use chrono::{DateTime, Utc};
use herald_core::error::{HeraldError, Result};
use herald_core::types::{BroadcastJob, BroadcastPayload, JobStatus, MediaRef};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::database::lock_conn;

/// Handle over the `scheduled_messages` table.
///
/// The store is the single source of truth for job state; the scheduler's
/// timers are rebuilt from [`list_pending`](JobStore::list_pending) on
/// recovery.
#[derive(Clone)]
pub struct JobStore {
    conn: Arc<Mutex<Connection>>,
}

impl JobStore {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Insert a new pending job and return its fresh id.
    /// The write is committed before this returns.
    pub fn insert(
        &self,
        payload: &BroadcastPayload,
        scheduled_at: DateTime<Utc>,
        created_by: i64,
    ) -> Result<i64> {
        let (content, media_id, caption) = payload_columns(payload);
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "INSERT INTO scheduled_messages
             (message_type, message_content, media_id, caption, scheduled_time, created_at, created_by, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending')",
            rusqlite::params![
                payload.kind(),
                content,
                media_id,
                caption,
                scheduled_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
                created_by,
            ],
        )
        .map_err(|e| HeraldError::Store(format!("Insert job: {e}")))?;
        let id = conn.last_insert_rowid();
        tracing::info!("Job #{id} scheduled for {scheduled_at}");
        Ok(id)
    }

    /// Load a single job, or None if absent.
    pub fn load(&self, id: i64) -> Result<Option<BroadcastJob>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, message_type, message_content, media_id, caption,
                        scheduled_time, created_at, created_by, status
                 FROM scheduled_messages WHERE id = ?1",
            )
            .map_err(|e| HeraldError::Store(format!("Load job: {e}")))?;
        let job = stmt
            .query_row([id], job_from_row)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(HeraldError::Store(format!("Load job: {other}"))),
            })?;
        Ok(job)
    }

    /// All pending jobs, earliest `scheduled_time` first. Used both for
    /// recovery and for the operator-facing "next N" view.
    pub fn list_pending(&self) -> Result<Vec<BroadcastJob>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, message_type, message_content, media_id, caption,
                        scheduled_time, created_at, created_by, status
                 FROM scheduled_messages
                 WHERE status = 'pending'
                 ORDER BY scheduled_time",
            )
            .map_err(|e| HeraldError::Store(format!("List pending: {e}")))?;
        let rows = stmt
            .query_map([], job_from_row)
            .map_err(|e| HeraldError::Store(format!("List pending: {e}")))?;
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row.map_err(|e| HeraldError::Store(format!("List pending: {e}")))?);
        }
        Ok(jobs)
    }

    /// Record a terminal outcome for a job.
    ///
    /// Exactly one terminal write per job: a second call is a programmer
    /// error and is rejected rather than silently overwriting.
    pub fn set_status(&self, id: i64, status: JobStatus) -> Result<()> {
        if !status.is_terminal() {
            return Err(HeraldError::Store(format!(
                "refusing non-terminal status write for job {id}"
            )));
        }
        let conn = lock_conn(&self.conn)?;
        let changed = conn
            .execute(
                "UPDATE scheduled_messages SET status = ?1 WHERE id = ?2 AND status = 'pending'",
                rusqlite::params![status.as_str(), id],
            )
            .map_err(|e| HeraldError::Store(format!("Set status: {e}")))?;
        if changed == 0 {
            // Distinguish "no such job" from "already terminal".
            let current: Option<String> = conn
                .query_row(
                    "SELECT status FROM scheduled_messages WHERE id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .ok();
            return match current {
                Some(s) => Err(HeraldError::AlreadyTerminal(id, s)),
                None => Err(HeraldError::JobNotFound(id)),
            };
        }
        tracing::info!("Job #{id} status set to {status}");
        Ok(())
    }
}

fn payload_columns(payload: &BroadcastPayload) -> (Option<String>, Option<String>, Option<String>) {
    match payload {
        BroadcastPayload::Text { body } => (Some(body.clone()), None, None),
        BroadcastPayload::Photo { media, caption } | BroadcastPayload::Video { media, caption } => {
            (None, Some(media.to_stored()), Some(caption.clone()))
        }
    }
}

fn job_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BroadcastJob> {
    let id: i64 = row.get(0)?;
    let kind: String = row.get(1)?;
    let content: Option<String> = row.get(2)?;
    let media_id: Option<String> = row.get(3)?;
    let caption: Option<String> = row.get(4)?;
    let scheduled_str: String = row.get(5)?;
    let created_str: String = row.get(6)?;
    let created_by: i64 = row.get(7)?;
    let status_str: String = row.get(8)?;

    let media = media_id.as_deref().map(MediaRef::from_stored);
    let payload = match (kind.as_str(), media) {
        ("photo", Some(media)) => BroadcastPayload::Photo {
            media,
            caption: caption.unwrap_or_default(),
        },
        ("video", Some(media)) => BroadcastPayload::Video {
            media,
            caption: caption.unwrap_or_default(),
        },
        _ => BroadcastPayload::Text {
            body: content.unwrap_or_default(),
        },
    };

    Ok(BroadcastJob {
        id,
        payload,
        scheduled_at: parse_rfc3339(&scheduled_str),
        created_at: parse_rfc3339(&created_str),
        created_by,
        status: JobStatus::parse(&status_str).unwrap_or(JobStatus::Pending),
    })
}

fn parse_rfc3339(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
