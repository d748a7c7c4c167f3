use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};

/// One reconnect attempt, abstracted away from the controller so it can
/// be retried without the controller knowing about transports, trees, or
/// peers. Implemented once per concrete teacher/learner wiring.
#[async_trait]
pub trait ReconnectExecutor: Send + Sync {
    async fn attempt(&self, cancel: watch::Receiver<bool>) -> SyncResult<()>;
}

/// Enforces `reconnect.max_consecutive_failures` and
/// `reconnect.min_time_between_reconnects` (§6) around repeated calls to
/// a [`ReconnectExecutor`].
pub struct ReconnectController {
    max_consecutive_failures: u32,
    min_time_between_reconnects: Duration,
    consecutive_failures: u32,
    last_attempt: Option<Instant>,
}

impl ReconnectController {
    pub fn new(max_consecutive_failures: u32, min_time_between_reconnects: Duration) -> Self {
        Self {
            max_consecutive_failures,
            min_time_between_reconnects,
            consecutive_failures: 0,
            last_attempt: None,
        }
    }

    /// Runs one attempt through `executor`, waiting out
    /// `min_time_between_reconnects` since the previous attempt first if
    /// needed. Returns [`SyncError::Refused`] without calling `executor`
    /// at all once `max_consecutive_failures` has been reached.
    pub async fn run_attempt(
        &mut self,
        executor: &dyn ReconnectExecutor,
        cancel: watch::Receiver<bool>,
    ) -> SyncResult<()> {
        if self.consecutive_failures >= self.max_consecutive_failures {
            return Err(SyncError::Refused {
                reason: "max_consecutive_failures reached",
            });
        }

        if let Some(last) = self.last_attempt {
            let elapsed = last.elapsed();
            if elapsed < self.min_time_between_reconnects {
                tokio::time::sleep(self.min_time_between_reconnects - elapsed).await;
            }
        }
        self.last_attempt = Some(Instant::now());

        match executor.attempt(cancel).await {
            Ok(()) => {
                info!("reconnect attempt succeeded");
                self.consecutive_failures = 0;
                Ok(())
            }
            Err(err) => {
                self.consecutive_failures += 1;
                warn!(
                    consecutive_failures = self.consecutive_failures,
                    error = %err,
                    "reconnect attempt failed"
                );
                Err(err)
            }
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Creates a cooperative-cancellation token: the sender side signals
/// `true` to ask every worker task watching the receiver side to stop at
/// its next suspension point.
pub fn cancellation_token() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyExecutor {
        calls: Arc<AtomicU32>,
        fail_first_n: u32,
    }

    #[async_trait]
    impl ReconnectExecutor for FlakyExecutor {
        async fn attempt(&self, _cancel: watch::Receiver<bool>) -> SyncResult<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n {
                Err(SyncError::StreamClosed)
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn refuses_once_consecutive_failures_reach_the_cap() {
        let mut controller = ReconnectController::new(2, Duration::from_millis(0));
        let executor = FlakyExecutor {
            calls: Arc::new(AtomicU32::new(0)),
            fail_first_n: 10,
        };
        let (_tx, rx) = cancellation_token();

        assert!(controller.run_attempt(&executor, rx.clone()).await.is_err());
        assert!(controller.run_attempt(&executor, rx.clone()).await.is_err());
        assert_eq!(controller.consecutive_failures(), 2);

        let result = controller.run_attempt(&executor, rx).await;
        assert!(matches!(result, Err(SyncError::Refused { .. })));
    }

    #[tokio::test]
    async fn success_resets_the_consecutive_failure_count() {
        let mut controller = ReconnectController::new(5, Duration::from_millis(0));
        let executor = FlakyExecutor {
            calls: Arc::new(AtomicU32::new(0)),
            fail_first_n: 1,
        };
        let (_tx, rx) = cancellation_token();

        assert!(controller.run_attempt(&executor, rx.clone()).await.is_err());
        assert_eq!(controller.consecutive_failures(), 1);
        assert!(controller.run_attempt(&executor, rx).await.is_ok());
        assert_eq!(controller.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn enforces_min_time_between_reconnects() {
        let min_gap = Duration::from_millis(30);
        let mut controller = ReconnectController::new(5, min_gap);
        let executor = FlakyExecutor {
            calls: Arc::new(AtomicU32::new(0)),
            fail_first_n: 0,
        };
        let (_tx, rx) = cancellation_token();

        let start = Instant::now();
        controller.run_attempt(&executor, rx.clone()).await.unwrap();
        controller.run_attempt(&executor, rx).await.unwrap();
        assert!(start.elapsed() >= min_gap);
    }
}
