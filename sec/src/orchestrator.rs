use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::outcome::CheckOutcome;

/// Check timeout when the harness provides no deadline
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(20);

/// Time reserved before the harness deadline to report gracefully
pub const SAFETY_MARGIN: Duration = Duration::from_secs(5);

/// Races a check against external cancellation and a local timeout
#[derive(Clone, Copy, Debug)]
pub struct Orchestrator {
    timeout: Duration,
}

impl Orchestrator {
    /// Compute the local timeout once, from the harness deadline minus
    /// [`SAFETY_MARGIN`], or [`DEFAULT_CHECK_TIMEOUT`] without a deadline.
    ///
    /// ```
    /// # use sec::Orchestrator;
    /// use chrono::{Duration, Utc};
    /// let now = Utc::now();
    /// let o = Orchestrator::new(Some(now + Duration::seconds(65)), now);
    /// assert_eq!(std::time::Duration::from_secs(60), o.timeout());
    /// ```
    pub fn new(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let timeout = match deadline {
            Some(deadline) => {
                let margin = chrono::Duration::from_std(SAFETY_MARGIN)
                    .unwrap_or_else(|_| chrono::Duration::zero());
                (deadline - (now + margin)).to_std().unwrap_or(Duration::ZERO)
            }
            None => {
                warn!("no check deadline available, falling back to {DEFAULT_CHECK_TIMEOUT:?}");
                DEFAULT_CHECK_TIMEOUT
            }
        };
        info!("check time limit set to {timeout:?}");
        Orchestrator { timeout }
    }

    /// Use a fixed timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Orchestrator { timeout }
    }

    /// Local timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `check` on its own task and return the first of: `shutdown` being
    /// cancelled, the timeout elapsing, or the check completing. When several
    /// are ready at once they are taken in that order.
    ///
    /// `check` receives a child token of `shutdown`, cancelled as well once
    /// the race is decided. A check still blocked on the network is not
    /// aborted; it resolves on its own and its result is discarded.
    pub async fn run<F, Fut>(&self, shutdown: &CancellationToken, check: F) -> CheckOutcome
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = CheckOutcome> + Send + 'static,
    {
        let downstream = shutdown.child_token();
        let (done_tx, done_rx) = oneshot::channel();
        let fut = check(downstream.clone());
        tokio::spawn(async move {
            // receiver is gone once the race was decided otherwise
            let _ = done_tx.send(fut.await);
        });

        // ties go to external cancellation
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("cancelling check and shutting down due to interrupt");
                CheckOutcome::Cancelled
            }
            _ = tokio::time::sleep(self.timeout) => {
                downstream.cancel();
                info!("cancelling check and shutting down due to timeout");
                CheckOutcome::TimedOut
            }
            done = done_rx => {
                downstream.cancel();
                match done {
                    Ok(outcome) => outcome,
                    Err(_) => CheckOutcome::HandshakeFailed("check stopped without a result".into()),
                }
            }
        }
    }
}
