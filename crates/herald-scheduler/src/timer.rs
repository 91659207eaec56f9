//! One-shot job timers.
//!
//! One tokio sleep task per armed job. The timer handle is transient state;
//! the job row is authoritative and timers are re-armed from it on recovery.
//!
//! Duplicate arming is the highest-risk bug class here (it means duplicate
//! delivery), so arming an already-armed job id is rejected outright, and a
//! fire consumes its map entry under the lock — a double wake finds the
//! entry gone and emits nothing.

use chrono::{DateTime, Utc};
use herald_core::error::{HeraldError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Fired job ids, consumed by the controller loop.
pub type FireReceiver = mpsc::UnboundedReceiver<i64>;

/// Holds the set of pending one-shot timers and fires each exactly once.
#[derive(Clone)]
pub struct BroadcastScheduler {
    timers: Arc<Mutex<HashMap<i64, JoinHandle<()>>>>,
    fire_tx: mpsc::UnboundedSender<i64>,
}

impl BroadcastScheduler {
    /// Create a scheduler and the receiving end of its fire events.
    pub fn new() -> (Self, FireReceiver) {
        let (fire_tx, fire_rx) = mpsc::unbounded_channel();
        (
            Self {
                timers: Arc::new(Mutex::new(HashMap::new())),
                fire_tx,
            },
            fire_rx,
        )
    }

    /// Schedule a one-shot fire at `fire_at`. A time at or before now fires
    /// immediately. Arming an already-armed id is a programmer error.
    pub async fn arm(&self, job_id: i64, fire_at: DateTime<Utc>) -> Result<()> {
        let mut timers = self.timers.lock().await;
        if timers.contains_key(&job_id) {
            return Err(HeraldError::AlreadyArmed(job_id));
        }

        let delay = (fire_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        tracing::info!("Job #{job_id} armed, fires in {}s", delay.as_secs());

        let timers_ref = self.timers.clone();
        let fire_tx = self.fire_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Consume the entry under the lock: only the task that removes
            // it gets to emit, so a stray double wake fires nothing.
            let mut timers = timers_ref.lock().await;
            if timers.remove(&job_id).is_some() && fire_tx.send(job_id).is_err() {
                tracing::warn!("Job #{job_id} fired but the controller loop is gone");
            }
        });

        // The map lock is still held, so the spawned task cannot consume
        // its entry before we insert it.
        timers.insert(job_id, handle);
        Ok(())
    }

    /// Remove a pending timer. Returns false if the job already fired or
    /// was never armed.
    pub async fn cancel(&self, job_id: i64) -> bool {
        let mut timers = self.timers.lock().await;
        match timers.remove(&job_id) {
            Some(handle) => {
                handle.abort();
                tracing::info!("Job #{job_id} timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Number of currently armed timers.
    pub async fn armed_count(&self) -> usize {
        self.timers.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_past_due_fires_immediately() {
        let (scheduler, mut rx) = BroadcastScheduler::new();
        scheduler
            .arm(1, Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();
        let fired = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(fired, Some(1));
        assert_eq!(scheduler.armed_count().await, 0);
    }

    #[tokio::test]
    async fn test_double_arm_rejected() {
        let (scheduler, _rx) = BroadcastScheduler::new();
        let at = Utc::now() + chrono::Duration::hours(1);
        scheduler.arm(7, at).await.unwrap();
        let err = scheduler.arm(7, at).await.unwrap_err();
        assert!(matches!(err, HeraldError::AlreadyArmed(7)));
        assert_eq!(scheduler.armed_count().await, 1);
    }

    #[tokio::test]
    async fn test_rearm_allowed_after_fire() {
        let (scheduler, mut rx) = BroadcastScheduler::new();
        scheduler.arm(3, Utc::now()).await.unwrap();
        assert_eq!(
            timeout(Duration::from_secs(1), rx.recv()).await.unwrap(),
            Some(3)
        );
        // Entry consumed on fire, so the id is free again.
        scheduler
            .arm(3, Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_before_fire() {
        let (scheduler, mut rx) = BroadcastScheduler::new();
        scheduler
            .arm(5, Utc::now() + chrono::Duration::milliseconds(50))
            .await
            .unwrap();
        assert!(scheduler.cancel(5).await);
        assert!(
            timeout(Duration::from_millis(200), rx.recv())
                .await
                .is_err(),
            "cancelled timer must not fire"
        );
    }

    #[tokio::test]
    async fn test_cancel_absent_is_noop() {
        let (scheduler, _rx) = BroadcastScheduler::new();
        assert!(!scheduler.cancel(99).await);
    }

    #[tokio::test]
    async fn test_two_jobs_fire_independently() {
        let (scheduler, mut rx) = BroadcastScheduler::new();
        scheduler.arm(1, Utc::now()).await.unwrap();
        scheduler.arm(2, Utc::now()).await.unwrap();
        let mut fired = vec![
            timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap(),
            timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap(),
        ];
        fired.sort();
        assert_eq!(fired, vec![1, 2]);
    }
}
