use std::sync::Arc;

use chrono::Utc;
use log::{error, warn};
use tokio_util::sync::CancellationToken;

use crate::error::InspectError;
use crate::inspector::Inspector;
use crate::orchestrator::Orchestrator;
use crate::outcome::CheckOutcome;
use crate::request::CheckRequest;

/// Checker for SSL certificate expiry of one domain name
#[derive(Debug)]
pub struct Checker {
    request: Arc<CheckRequest>,
    inspector: Arc<Inspector>,
    orchestrator: Orchestrator,
}

impl Checker {
    /// Create a checker with an inspector and orchestrator derived from `request`
    ///
    /// ```
    /// # use sec::{Checker, CheckRequest};
    /// let request = CheckRequest {
    ///     domain_name: "sha256.badssl.com".into(),
    ///     port: 443,
    ///     day_threshold: 30,
    ///     skip_tls_verify: false,
    ///     deadline: None,
    /// };
    /// let checker = Checker::new(request);
    /// ```
    pub fn new(request: CheckRequest) -> Self {
        let inspector = Inspector::new(request.skip_tls_verify);
        let orchestrator = Orchestrator::new(request.deadline, Utc::now());
        Checker::with_parts(request, inspector, orchestrator)
    }

    /// Create a checker from explicit parts
    pub fn with_parts(
        request: CheckRequest,
        inspector: Inspector,
        orchestrator: Orchestrator,
    ) -> Self {
        Checker {
            request: Arc::new(request),
            inspector: Arc::new(inspector),
            orchestrator,
        }
    }

    /// Request being checked
    pub fn request(&self) -> &CheckRequest {
        &self.request
    }

    /// Run the check until it completes, times out, or `shutdown` is cancelled
    pub async fn run(&self, shutdown: &CancellationToken) -> CheckOutcome {
        let request = self.request.clone();
        let inspector = self.inspector.clone();
        self.orchestrator
            .run(shutdown, move |token| async move {
                Self::do_check(&request, &inspector, &token).await
            })
            .await
    }

    async fn do_check(
        request: &CheckRequest,
        inspector: &Inspector,
        token: &CancellationToken,
    ) -> CheckOutcome {
        let window = match inspector
            .inspect(&request.domain_name, request.port, token)
            .await
        {
            Ok(w) => w,
            Err(InspectError::Cancelled) => return CheckOutcome::Cancelled,
            Err(e) => {
                error!("unable to perform SSL expiration check: {e}");
                return CheckOutcome::HandshakeFailed(e.to_string());
            }
        };

        let c = window.classify(Utc::now(), request.day_threshold);
        let domain_name = &request.domain_name;
        if c.expired {
            warn!(
                "certificate for domain {domain_name} expired on {}",
                window.not_after.to_rfc3339()
            );
        }
        if c.expiring_soon {
            warn!(
                "certificate for domain {domain_name} will expire in {} days",
                c.days_until_invalid
            );
        }
        CheckOutcome::classified(domain_name.as_str(), request.day_threshold, c)
    }
}
