//! Unified error types for Herald.

use thiserror::Error;

/// Result type alias using HeraldError.
pub type Result<T> = std::result::Result<T, HeraldError>;

#[derive(Error, Debug)]
pub enum HeraldError {
    // Storage errors — fatal to the operation that hit them, never swallowed
    #[error("Store error: {0}")]
    Store(String),

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Job {0} is already terminal ({1})")]
    AlreadyTerminal(i64, String),

    // Scheduler errors
    #[error("Job {0} is already armed")]
    AlreadyArmed(i64),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Telegram API error: {0}")]
    Api(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl HeraldError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HeraldError::Store("disk full".into());
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(HeraldError::store("x"), HeraldError::Store(_)));
        assert!(matches!(
            HeraldError::transport("x"),
            HeraldError::Transport(_)
        ));
        assert!(matches!(HeraldError::config("x"), HeraldError::Config(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: HeraldError = io_err.into();
        assert!(matches!(err, HeraldError::Io(_)));
    }
}
