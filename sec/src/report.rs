use std::fmt;

use log::{error, info};
use serde::Serialize;

use crate::error::ReportError;
use crate::outcome::CheckOutcome;

/// Body posted to the harness reporting endpoint
#[derive(Debug, Eq, PartialEq, Serialize)]
pub struct Report {
    /// Failure reasons, empty on success
    pub errors: Vec<String>,
    /// Did the check pass?
    pub ok: bool,
}

impl From<&CheckOutcome> for Report {
    fn from(outcome: &CheckOutcome) -> Self {
        match outcome.failure_reason() {
            Some(reason) => Report {
                errors: vec![reason],
                ok: false,
            },
            None => Report {
                errors: vec![],
                ok: true,
            },
        }
    }
}

/// Delivers the single terminal report of a check
pub trait Reporter: Send {
    /// Report success or failure with a reason
    fn report(&self, outcome: &CheckOutcome) -> Result<(), ReportError>;
}

/// Call `reporter` on the blocking thread pool, reporters may do blocking I/O
pub async fn deliver(
    reporter: Box<dyn Reporter>,
    outcome: CheckOutcome,
) -> Result<(), ReportError> {
    tokio::task::spawn_blocking(move || reporter.report(&outcome)).await?
}

/// Writes the outcome to the log
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, outcome: &CheckOutcome) -> Result<(), ReportError> {
        match outcome.failure_reason() {
            None => info!("{outcome}"),
            Some(reason) => error!("{reason}"),
        }
        Ok(())
    }
}

/// Posts the outcome to a Kuberhealthy reporting endpoint
pub struct KuberhealthyReporter {
    url: String,
    run_uuid: Option<String>,
}

impl fmt::Debug for KuberhealthyReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KuberhealthyReporter")
            .field("url", &self.url)
            .finish()
    }
}

impl KuberhealthyReporter {
    /// Create a reporter for `url`, tagging requests with `run_uuid` when given
    ///
    /// ```
    /// # use sec::KuberhealthyReporter;
    /// KuberhealthyReporter::new("http://kuberhealthy.kuberhealthy.svc/check", None);
    /// ```
    pub fn new<T>(url: T, run_uuid: Option<String>) -> Self
    where
        T: Into<String>,
    {
        KuberhealthyReporter {
            url: url.into(),
            run_uuid,
        }
    }
}

impl Reporter for KuberhealthyReporter {
    fn report(&self, outcome: &CheckOutcome) -> Result<(), ReportError> {
        let body = serde_json::to_string(&Report::from(outcome))?;
        let mut request = ureq::post(&self.url).set("Content-Type", "application/json");
        if let Some(run_uuid) = &self.run_uuid {
            request = request.set("kh-run-uuid", run_uuid);
        }
        let response = request
            .send_string(&body)
            .map_err(|e| ReportError::UReq(Box::new(e)))?;
        info!(
            "reported {} to {} with status {}",
            if outcome.is_healthy() { "success" } else { "failure" },
            self.url,
            response.status()
        );
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use mockito::{mock, Matcher};

    fn expired() -> CheckOutcome {
        CheckOutcome::Expired {
            domain_name: "expired.badssl.com".into(),
        }
    }

    #[test]
    fn t_report_from_outcome() {
        let healthy = CheckOutcome::Healthy {
            domain_name: "sha256.badssl.com".into(),
            days_remaining: 100,
        };
        assert_eq!(
            Report {
                errors: vec![],
                ok: true
            },
            Report::from(&healthy)
        );
        assert_eq!(
            Report {
                errors: vec!["Certificate for domain expired.badssl.com is expired".into()],
                ok: false
            },
            Report::from(&expired())
        );
    }

    #[test]
    fn t_log_reporter() -> Result<(), ReportError> {
        LogReporter.report(&CheckOutcome::TimedOut)
    }

    #[test]
    fn t_kuberhealthy_reporter() -> Result<(), ReportError> {
        let m = mock("POST", "/check")
            .match_header("kh-run-uuid", "00000000-0000-0000-0000-000000000000")
            .match_header("content-type", "application/json")
            .match_body(Matcher::JsonString(
                r#"{"errors":["Certificate for domain expired.badssl.com is expired"],"ok":false}"#
                    .into(),
            ))
            .with_status(200)
            .create();

        let url = format!("{}/check", mockito::server_url());
        let reporter = KuberhealthyReporter::new(
            url,
            Some("00000000-0000-0000-0000-000000000000".into()),
        );
        reporter.report(&expired())?;
        m.assert();
        Ok(())
    }

    #[tokio::test]
    async fn t_deliver_from_runtime() -> Result<(), ReportError> {
        let m = mock("POST", "/deliver")
            .match_body(Matcher::JsonString(r#"{"errors":[],"ok":true}"#.into()))
            .with_status(200)
            .create();

        let url = format!("{}/deliver", mockito::server_url());
        let healthy = CheckOutcome::Healthy {
            domain_name: "sha256.badssl.com".into(),
            days_remaining: 100,
        };
        deliver(Box::new(KuberhealthyReporter::new(url, None)), healthy).await?;
        m.assert();
        Ok(())
    }

    #[tokio::test]
    async fn t_deliver_rejected() {
        let _m = mock("POST", "/deliver-rejected").with_status(500).create();

        let url = format!("{}/deliver-rejected", mockito::server_url());
        let result = deliver(
            Box::new(KuberhealthyReporter::new(url, None)),
            CheckOutcome::TimedOut,
        )
        .await;
        assert!(matches!(result, Err(ReportError::UReq(..))));
    }

    #[test]
    fn t_kuberhealthy_reporter_rejected() {
        let _m = mock("POST", "/rejected").with_status(400).create();

        let url = format!("{}/rejected", mockito::server_url());
        let reporter = KuberhealthyReporter::new(url, None);
        let result = reporter.report(&CheckOutcome::Cancelled);
        assert!(matches!(result, Err(ReportError::UReq(..))));
    }
}
