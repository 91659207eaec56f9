//! # Herald Core
//!
//! Shared foundation for the Herald broadcast scheduler: the job and
//! subscriber data model, the unified error type, configuration, and the
//! outbound transport trait that the dispatcher fans out through.

pub mod config;
pub mod error;
pub mod transport;
pub mod types;

pub use config::HeraldConfig;
pub use error::{HeraldError, Result};
pub use transport::Transport;
pub use types::{
    BroadcastJob, BroadcastPayload, DeliveryOutcome, JobStatus, MediaRef, Subscriber,
};
