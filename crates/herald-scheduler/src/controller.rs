//! Job lifecycle controller — orchestrates store, timers, and dispatch.
//!
//! Create is store-then-arm: if the process dies between the two steps,
//! recovery still finds the job pending and re-arms it. Arming first could
//! produce a fire event for a job that was never persisted.

use chrono::Utc;
use herald_core::error::{HeraldError, Result};
use herald_core::types::{BroadcastPayload, DeliveryOutcome, JobStatus};
use herald_store::{JobStore, SubscriberDirectory};
use std::sync::Arc;

use crate::dispatcher::Dispatcher;
use crate::timer::{BroadcastScheduler, FireReceiver};

/// What recovery found and did at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryReport {
    /// Pending jobs with a future target time, re-armed.
    pub rearmed: usize,
    /// Pending jobs whose time elapsed while the process was down,
    /// executed immediately.
    pub executed: usize,
}

/// Orchestrates the broadcast flow: create → arm → fire → dispatch → record.
pub struct BroadcastController {
    jobs: JobStore,
    directory: SubscriberDirectory,
    dispatcher: Dispatcher,
    scheduler: BroadcastScheduler,
}

impl BroadcastController {
    pub fn new(
        jobs: JobStore,
        directory: SubscriberDirectory,
        dispatcher: Dispatcher,
        scheduler: BroadcastScheduler,
    ) -> Self {
        Self {
            jobs,
            directory,
            dispatcher,
            scheduler,
        }
    }

    /// Persist a job and arm its timer. Returns the job id.
    pub async fn create_and_schedule(
        &self,
        payload: BroadcastPayload,
        fire_at: chrono::DateTime<Utc>,
        created_by: i64,
    ) -> Result<i64> {
        let id = self.jobs.insert(&payload, fire_at, created_by)?;
        self.scheduler.arm(id, fire_at).await?;
        Ok(id)
    }

    /// Persist and execute a job right now, returning its aggregate outcome
    /// for the operator's confirmation message.
    pub async fn send_now(
        &self,
        payload: BroadcastPayload,
        created_by: i64,
    ) -> Result<(i64, DeliveryOutcome)> {
        let id = self.jobs.insert(&payload, Utc::now(), created_by)?;
        let outcome = self
            .execute(id)
            .await?
            .ok_or_else(|| HeraldError::Scheduler(format!("fresh job {id} was not executable")))?;
        Ok((id, outcome))
    }

    /// Run one job's broadcast and record its terminal status.
    ///
    /// Absent or already-terminal jobs are a safe no-op (`Ok(None)`) — this
    /// is the backstop against a duplicate fire event. `Sent` means the
    /// batch ran, even with per-recipient failures; `Failed` is reserved
    /// for the mechanism itself not running.
    pub async fn execute(&self, job_id: i64) -> Result<Option<DeliveryOutcome>> {
        let Some(job) = self.jobs.load(job_id)? else {
            tracing::warn!("Fire for unknown job #{job_id}, ignoring");
            return Ok(None);
        };
        if job.status.is_terminal() {
            tracing::info!("Job #{job_id} already {}, ignoring fire", job.status);
            return Ok(None);
        }

        let recipients = match self.directory.list_all() {
            Ok(recipients) => recipients,
            Err(e) => {
                tracing::error!("Job #{job_id}: directory unreadable: {e}");
                if let Err(status_err) = self.jobs.set_status(job_id, JobStatus::Failed) {
                    tracing::error!("Job #{job_id}: failed to record failure: {status_err}");
                }
                return Err(e);
            }
        };

        tracing::info!(
            "Executing job #{job_id} ({}) for {} recipients",
            job.payload.kind(),
            recipients.len()
        );
        let outcome = self.dispatcher.broadcast(&job.payload, &recipients).await;

        match self.jobs.set_status(job_id, JobStatus::Sent) {
            Ok(()) => Ok(Some(outcome)),
            Err(HeraldError::AlreadyTerminal(_, status)) => {
                // Lost a race with another terminal write; the first stands.
                tracing::warn!("Job #{job_id} was already {status} after broadcast");
                Ok(Some(outcome))
            }
            Err(e) => Err(e),
        }
    }

    /// Rebuild timers from the store after a restart. Future jobs are
    /// re-armed; jobs whose time passed while the process was down run
    /// immediately instead of being dropped.
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let pending = self.jobs.list_pending()?;
        let now = Utc::now();
        let mut report = RecoveryReport::default();

        for job in pending {
            if job.is_due(now) {
                tracing::info!(
                    "Job #{} was due {} while we were down, executing now",
                    job.id,
                    job.scheduled_at
                );
                if let Err(e) = self.execute(job.id).await {
                    tracing::error!("Recovery execution of job #{} failed: {e}", job.id);
                } else {
                    report.executed += 1;
                }
            } else {
                self.scheduler.arm(job.id, job.scheduled_at).await?;
                report.rearmed += 1;
            }
        }

        tracing::info!(
            "Recovery complete: {} re-armed, {} executed",
            report.rearmed,
            report.executed
        );
        Ok(report)
    }

    /// Drop a pending timer before it fires. The job row stays pending.
    pub async fn cancel(&self, job_id: i64) -> bool {
        self.scheduler.cancel(job_id).await
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    pub fn directory(&self) -> &SubscriberDirectory {
        &self.directory
    }
}

/// Consume fire events and execute each job. Fires are handled one at a
/// time, which also serializes the load/mark step per job id.
pub async fn spawn_controller(controller: Arc<BroadcastController>, mut fires: FireReceiver) {
    tracing::info!("Controller loop started");
    while let Some(job_id) = fires.recv().await {
        if let Err(e) = controller.execute(job_id).await {
            tracing::error!("Job #{job_id} execution failed: {e}");
        }
    }
    tracing::info!("Controller loop stopped (scheduler dropped)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use herald_core::transport::Transport;
    use herald_core::types::Subscriber;
    use herald_store::Database;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeTransport {
        failing: HashSet<i64>,
        attempts: Mutex<Vec<i64>>,
    }

    impl FakeTransport {
        fn new(failing: &[i64]) -> Arc<Self> {
            Arc::new(Self {
                failing: failing.iter().copied().collect(),
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn attempt_count(&self) -> usize {
            self.attempts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        fn name(&self) -> &str {
            "fake"
        }

        async fn send(&self, recipient: i64, _payload: &BroadcastPayload) -> Result<()> {
            self.attempts.lock().unwrap().push(recipient);
            if self.failing.contains(&recipient) {
                Err(HeraldError::Transport("simulated outage".into()))
            } else {
                Ok(())
            }
        }
    }

    struct Harness {
        controller: Arc<BroadcastController>,
        fires: Option<FireReceiver>,
        transport: Arc<FakeTransport>,
        db: Database,
    }

    fn harness(subscribers: &[i64], failing: &[i64]) -> Harness {
        let db = Database::open_in_memory().unwrap();
        let directory = db.subscribers();
        for &id in subscribers {
            directory.add(&Subscriber::new(id)).unwrap();
        }
        let transport = FakeTransport::new(failing);
        let (scheduler, fires) = BroadcastScheduler::new();
        let controller = Arc::new(BroadcastController::new(
            db.jobs(),
            directory,
            Dispatcher::new(transport.clone(), Duration::ZERO),
            scheduler,
        ));
        Harness {
            controller,
            fires: Some(fires),
            transport,
            db,
        }
    }

    fn text(body: &str) -> BroadcastPayload {
        BroadcastPayload::Text { body: body.into() }
    }

    async fn wait_for_status(jobs: &JobStore, id: i64, want: JobStatus) {
        for _ in 0..200 {
            if jobs.load(id).unwrap().map(|j| j.status) == Some(want) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never reached {want}");
    }

    #[tokio::test]
    async fn test_send_now_partial_failure() {
        let h = harness(&[1, 2, 3], &[2]);
        let (id, outcome) = h.controller.send_now(text("Hello"), 99).await.unwrap();
        assert_eq!(outcome.sent, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.failed_recipients, vec![2]);
        // "Sent" means the batch ran, failures and all.
        assert_eq!(
            h.db.jobs().load(id).unwrap().unwrap().status,
            JobStatus::Sent
        );
    }

    #[tokio::test]
    async fn test_send_now_empty_directory() {
        let h = harness(&[], &[]);
        let (id, outcome) = h.controller.send_now(text("anyone?"), 99).await.unwrap();
        assert_eq!(outcome.sent, 0);
        assert_eq!(outcome.failed, 0);
        assert_eq!(
            h.db.jobs().load(id).unwrap().unwrap().status,
            JobStatus::Sent
        );
    }

    #[tokio::test]
    async fn test_scheduled_job_fires_and_completes() {
        let mut h = harness(&[1, 2, 3], &[2]);
        tokio::spawn(spawn_controller(
            h.controller.clone(),
            h.fires.take().unwrap(),
        ));

        let fire_at = Utc::now() + chrono::Duration::milliseconds(50);
        let id = h
            .controller
            .create_and_schedule(text("Hello"), fire_at, 99)
            .await
            .unwrap();
        assert_eq!(
            h.db.jobs().load(id).unwrap().unwrap().status,
            JobStatus::Pending
        );

        wait_for_status(&h.db.jobs(), id, JobStatus::Sent).await;
        assert_eq!(h.transport.attempt_count(), 3);
    }

    #[tokio::test]
    async fn test_execute_terminal_job_is_noop() {
        let h = harness(&[1], &[]);
        let id = h.db.jobs().insert(&text("x"), Utc::now(), 1).unwrap();
        h.db.jobs().set_status(id, JobStatus::Sent).unwrap();

        let result = h.controller.execute(id).await.unwrap();
        assert!(result.is_none());
        assert_eq!(h.transport.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_unknown_job_is_noop() {
        let h = harness(&[1], &[]);
        assert!(h.controller.execute(404).await.unwrap().is_none());
        assert_eq!(h.transport.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_recover_runs_past_due_and_rearms_future() {
        let mut h = harness(&[1, 2], &[]);
        let jobs = h.db.jobs();
        // Simulated restart: both rows pending, no timers armed.
        let past = jobs
            .insert(&text("missed"), Utc::now() - chrono::Duration::hours(1), 1)
            .unwrap();
        let future = jobs
            .insert(
                &text("upcoming"),
                Utc::now() + chrono::Duration::milliseconds(80),
                1,
            )
            .unwrap();

        tokio::spawn(spawn_controller(
            h.controller.clone(),
            h.fires.take().unwrap(),
        ));
        let report = h.controller.recover().await.unwrap();
        assert_eq!(report.executed, 1);
        assert_eq!(report.rearmed, 1);

        // Past-due ran during recover; the future one fires on schedule.
        assert_eq!(jobs.load(past).unwrap().unwrap().status, JobStatus::Sent);
        wait_for_status(&jobs, future, JobStatus::Sent).await;
        // Two jobs, two subscribers each, exactly once.
        assert_eq!(h.transport.attempt_count(), 4);
    }

    #[tokio::test]
    async fn test_recover_fires_exactly_once() {
        let h = harness(&[1, 2, 3], &[]);
        let id =
            h.db.jobs()
                .insert(&text("once"), Utc::now() - chrono::Duration::minutes(5), 1)
                .unwrap();

        h.controller.recover().await.unwrap();
        assert_eq!(h.transport.attempt_count(), 3);

        // A second recovery pass finds nothing pending.
        let report = h.controller.recover().await.unwrap();
        assert_eq!(report.executed + report.rearmed, 0);
        assert_eq!(h.transport.attempt_count(), 3);
        assert_eq!(
            h.db.jobs().load(id).unwrap().unwrap().status,
            JobStatus::Sent
        );
    }

    #[tokio::test]
    async fn test_cancel_before_fire_keeps_pending() {
        let mut h = harness(&[1], &[]);
        tokio::spawn(spawn_controller(
            h.controller.clone(),
            h.fires.take().unwrap(),
        ));

        let id = h
            .controller
            .create_and_schedule(
                text("never"),
                Utc::now() + chrono::Duration::milliseconds(80),
                1,
            )
            .await
            .unwrap();
        assert!(h.controller.cancel(id).await);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(h.transport.attempt_count(), 0);
        assert_eq!(
            h.db.jobs().load(id).unwrap().unwrap().status,
            JobStatus::Pending
        );
    }
}
