//! # Herald Store
//!
//! SQLite persistence — survives restarts, supports concurrent access.
//! Two tables, two handles over one long-lived connection:
//! [`JobStore`] owns `scheduled_messages`, [`SubscriberDirectory`] owns
//! `subscribers`. Every mutating call commits before returning, so a crash
//! immediately after a successful call never loses that write.

pub mod database;
pub mod jobs;
pub mod subscribers;

pub use database::Database;
pub use jobs::JobStore;
pub use subscribers::SubscriberDirectory;
