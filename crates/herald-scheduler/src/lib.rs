//! # Herald Scheduler
//!
//! The delivery core: accepts a broadcast job, persists it, fires it at the
//! right time exactly once, and fans it out to every subscriber.
//!
//! ## Architecture
//! ```text
//! BroadcastController.create_and_schedule
//!   ├── JobStore.insert          (durable before arming)
//!   └── BroadcastScheduler.arm   (one tokio sleep per job)
//!         └── on fire → mpsc → controller loop
//!               └── BroadcastController.execute(job_id)
//!                     ├── JobStore.load          (terminal? → no-op)
//!                     ├── SubscriberDirectory.list_all  (fresh snapshot)
//!                     ├── Dispatcher.broadcast   (rate-limited fan-out)
//!                     └── JobStore.set_status    (single terminal write)
//!
//! On process start: BroadcastController.recover()
//!   └── JobStore.list_pending → re-arm future jobs, run past-due ones now
//! ```
//!
//! Timers are a cache of "work to do at time T" — the job row is the source
//! of truth, and timers are rebuilt from it after a restart.

pub mod controller;
pub mod dispatcher;
pub mod timer;

pub use controller::{BroadcastController, RecoveryReport, spawn_controller};
pub use dispatcher::Dispatcher;
pub use timer::BroadcastScheduler;
