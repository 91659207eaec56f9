//! Broadcast data model — jobs, payloads, subscribers, delivery outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Reference to deliverable media content.
///
/// Either an opaque token the transport already knows (a Telegram `file_id`)
/// or a local file that needs uploading. The stored form uses a `file://`
/// prefix for local paths, matching the `media_id` column format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaRef {
    /// Remote file token, resolvable by the transport without upload.
    FileId(String),
    /// Local file path, uploaded on send.
    LocalFile(PathBuf),
}

impl MediaRef {
    /// Parse the stored `media_id` column value.
    pub fn from_stored(value: &str) -> Self {
        match value.strip_prefix("file://") {
            Some(path) => Self::LocalFile(PathBuf::from(path)),
            None => Self::FileId(value.to_string()),
        }
    }

    /// Serialize for the `media_id` column.
    pub fn to_stored(&self) -> String {
        match self {
            Self::FileId(id) => id.clone(),
            Self::LocalFile(path) => format!("file://{}", path.display()),
        }
    }
}

/// What a broadcast delivers to each recipient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum BroadcastPayload {
    Text { body: String },
    Photo { media: MediaRef, caption: String },
    Video { media: MediaRef, caption: String },
}

impl BroadcastPayload {
    /// Payload kind as stored in the `message_type` column.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Photo { .. } => "photo",
            Self::Video { .. } => "video",
        }
    }

    /// Short human-readable summary for confirmation prompts and logs.
    pub fn summary(&self) -> String {
        match self {
            Self::Text { body } => {
                if body.chars().count() > 60 {
                    let head: String = body.chars().take(60).collect();
                    format!("text: {head}…")
                } else {
                    format!("text: {body}")
                }
            }
            Self::Photo { caption, .. } => format!("photo ({caption})"),
            Self::Video { caption, .. } => format!("video ({caption})"),
        }
    }
}

/// Broadcast job status. Transitions exactly once from Pending to a
/// terminal state; terminal jobs are never re-armed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Sent,
    Failed,
}

impl JobStatus {
    /// Stored form for the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    /// Parse the stored `status` column value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted broadcast job — the central entity of the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastJob {
    /// Unique id, assigned by the store (SQLite rowid, monotonic).
    pub id: i64,
    pub payload: BroadcastPayload,
    /// Target delivery time. Equals `created_at` for immediate sends.
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Operator user id that created the job.
    pub created_by: i64,
    pub status: JobStatus,
}

impl BroadcastJob {
    /// Whether the target time has already elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }
}

/// A broadcast recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub subscribed_at: DateTime<Utc>,
}

impl Subscriber {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            username: None,
            first_name: None,
            last_name: None,
            subscribed_at: Utc::now(),
        }
    }

    pub fn with_names(
        user_id: i64,
        username: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Self {
        Self {
            user_id,
            username,
            first_name,
            last_name,
            subscribed_at: Utc::now(),
        }
    }
}

/// Per-broadcast aggregate result. Ephemeral — reported to the operator
/// and logged, never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryOutcome {
    pub sent: usize,
    pub failed: usize,
    /// Recipient ids that failed this run, for observability.
    pub failed_recipients: Vec<i64>,
}

impl DeliveryOutcome {
    pub fn record_sent(&mut self) {
        self.sent += 1;
    }

    pub fn record_failure(&mut self, recipient: i64) {
        self.failed += 1;
        self.failed_recipients.push(recipient);
    }

    pub fn total(&self) -> usize {
        self.sent + self.failed
    }
}
