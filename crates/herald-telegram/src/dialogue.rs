//! Operator compose dialogue — a small explicit state machine.
//!
//! `/send_message` walks an admin through: choose send mode → provide
//! content (text/photo/video) → optionally pick a schedule time → confirm.
//! State lives per chat in memory; an abandoned dialogue simply gets
//! replaced the next time the command runs.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use herald_core::types::{BroadcastPayload, MediaRef};

use crate::api::TelegramMessage;

/// Whether the composed broadcast goes out immediately or on a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    Now,
    Schedule,
}

/// Where a chat currently is in the compose flow.
#[derive(Debug, Clone)]
pub enum ComposeState {
    /// Inline keyboard shown, waiting for "send now" / "schedule".
    AwaitingMode,
    /// Waiting for the message to broadcast.
    AwaitingContent { mode: SendMode },
    /// Content captured, waiting for a `DD.MM.YYYY HH:MM` time.
    AwaitingScheduleTime { payload: BroadcastPayload },
    /// Waiting for the final confirm/cancel tap.
    Confirming {
        payload: BroadcastPayload,
        schedule_at: Option<DateTime<Utc>>,
    },
}

/// Why a schedule time string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleTimeError {
    InvalidFormat,
    InPast,
}

impl std::fmt::Display for ScheduleTimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat => write!(f, "invalid format, expected DD.MM.YYYY HH:MM"),
            Self::InPast => write!(f, "time is in the past"),
        }
    }
}

/// Parse an operator-entered schedule time (`DD.MM.YYYY HH:MM`, local
/// time). Past times are rejected here, at the front-end boundary — the
/// scheduler itself still tolerates an elapsed time after recovery.
pub fn parse_schedule_time(
    input: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleTimeError> {
    let naive = NaiveDateTime::parse_from_str(input.trim(), "%d.%m.%Y %H:%M")
        .map_err(|_| ScheduleTimeError::InvalidFormat)?;
    let at = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or(ScheduleTimeError::InvalidFormat)?
        .with_timezone(&Utc);
    if at <= now {
        return Err(ScheduleTimeError::InPast);
    }
    Ok(at)
}

/// Extract a broadcastable payload from an operator message.
/// Photos use the last (largest) size, like any Telegram client would.
pub fn extract_payload(msg: &TelegramMessage) -> Option<BroadcastPayload> {
    if let Some(photo) = msg.photo.as_ref().and_then(|sizes| sizes.last()) {
        return Some(BroadcastPayload::Photo {
            media: MediaRef::FileId(photo.file_id.clone()),
            caption: msg.caption.clone().unwrap_or_default(),
        });
    }
    if let Some(video) = &msg.video {
        return Some(BroadcastPayload::Video {
            media: MediaRef::FileId(video.file_id.clone()),
            caption: msg.caption.clone().unwrap_or_default(),
        });
    }
    match &msg.text {
        Some(text) if !text.trim().is_empty() => Some(BroadcastPayload::Text {
            body: text.clone(),
        }),
        _ => None,
    }
}
