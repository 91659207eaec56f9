//! Fan-out dispatch — delivers one job's payload to a recipient snapshot.
//!
//! One bad recipient never aborts the batch: failures are logged, counted,
//! and skipped. A fixed inter-send delay keeps us under the transport's
//! rate limits.

use herald_core::transport::Transport;
use herald_core::types::{BroadcastPayload, DeliveryOutcome};
use std::sync::Arc;
use std::time::Duration;

/// Sequential, rate-limited broadcast dispatcher.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    /// Minimum pause between consecutive sends. A tuning knob, not a
    /// correctness requirement.
    send_delay: Duration,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, send_delay: Duration) -> Self {
        Self {
            transport,
            send_delay,
        }
    }

    /// Attempt delivery to every recipient, once each, in the given order.
    ///
    /// Always produces an outcome: per-recipient failures are counted and
    /// the batch continues, even if the transport is down for everyone.
    /// No retries here — a failed recipient is failed for this run.
    pub async fn broadcast(
        &self,
        payload: &BroadcastPayload,
        recipients: &[i64],
    ) -> DeliveryOutcome {
        let mut outcome = DeliveryOutcome::default();

        for (i, &recipient) in recipients.iter().enumerate() {
            if i > 0 && !self.send_delay.is_zero() {
                tokio::time::sleep(self.send_delay).await;
            }
            match self.transport.send(recipient, payload).await {
                Ok(()) => outcome.record_sent(),
                Err(e) => {
                    tracing::error!(
                        "Delivery to {recipient} failed via {}: {e}",
                        self.transport.name()
                    );
                    outcome.record_failure(recipient);
                }
            }
        }

        tracing::info!(
            "Broadcast complete: {} sent, {} failed",
            outcome.sent,
            outcome.failed
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use herald_core::error::{HeraldError, Result};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Transport fake — fails for a configured set of recipients and
    /// records the order of attempts.
    struct FakeTransport {
        failing: HashSet<i64>,
        attempts: Mutex<Vec<i64>>,
    }

    impl FakeTransport {
        fn failing_for(ids: &[i64]) -> Self {
            Self {
                failing: ids.iter().copied().collect(),
                attempts: Mutex::new(Vec::new()),
            }
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
                Err(HeraldError::Transport(format!("rejected {recipient}")))
            } else {
                Ok(())
            }
        }
    }

    fn text() -> BroadcastPayload {
        BroadcastPayload::Text { body: "hi".into() }
    }

    fn dispatcher(transport: Arc<FakeTransport>) -> Dispatcher {
        Dispatcher::new(transport, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_partial_failure_accounting() {
        let transport = Arc::new(FakeTransport::failing_for(&[2, 4]));
        let outcome = dispatcher(transport.clone())
            .broadcast(&text(), &[1, 2, 3, 4, 5])
            .await;
        assert_eq!(outcome.sent, 3);
        assert_eq!(outcome.failed, 2);
        assert_eq!(outcome.failed_recipients, vec![2, 4]);
        // Failures never abort the batch: every recipient was attempted, in order.
        assert_eq!(*transport.attempts.lock().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_empty_recipient_set() {
        let transport = Arc::new(FakeTransport::failing_for(&[]));
        let outcome = dispatcher(transport).broadcast(&text(), &[]).await;
        assert_eq!(outcome.sent, 0);
        assert_eq!(outcome.failed, 0);
    }

    #[tokio::test]
    async fn test_transport_fully_down_still_returns_outcome() {
        let transport = Arc::new(FakeTransport::failing_for(&[1, 2, 3]));
        let outcome = dispatcher(transport).broadcast(&text(), &[1, 2, 3]).await;
        assert_eq!(outcome.sent, 0);
        assert_eq!(outcome.failed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_send_delay() {
        let transport = Arc::new(FakeTransport::failing_for(&[]));
        let dispatcher = Dispatcher::new(transport, Duration::from_millis(50));
        let start = tokio::time::Instant::now();
        dispatcher.broadcast(&text(), &[1, 2, 3]).await;
        // Two gaps between three sends.
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
