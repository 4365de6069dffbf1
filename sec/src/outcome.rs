use std::fmt;

use crate::validity::Classification;

/// Terminal outcome of one check
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CheckOutcome {
    /// Certificate is valid and outside of the threshold
    Healthy {
        /// Domain name that got checked
        domain_name: String,
        /// Whole days until the certificate becomes invalid
        days_remaining: i64,
    },
    /// Certificate is not yet valid or already expired
    Expired {
        /// Domain name that got checked
        domain_name: String,
    },
    /// Certificate expires within the threshold
    ExpiringSoon {
        /// Domain name that got checked
        domain_name: String,
        /// Whole days until the certificate becomes invalid
        days_remaining: i64,
        /// Threshold in days
        day_threshold: u64,
    },
    /// Connection or handshake failed, with the underlying cause
    HandshakeFailed(String),
    /// Check did not finish before the local deadline
    TimedOut,
    /// External shutdown was requested before the check finished
    Cancelled,
}

impl CheckOutcome {
    /// Map a classification to an outcome. Expiry wins over the threshold.
    ///
    /// ```
    /// # use sec::{CheckOutcome, Classification};
    /// let c = Classification { expired: true, expiring_soon: true, days_until_invalid: -1 };
    /// let outcome = CheckOutcome::classified("expired.badssl.com", 30, c);
    /// assert!(matches!(outcome, CheckOutcome::Expired { .. }));
    /// ```
    pub fn classified<T>(domain_name: T, day_threshold: u64, c: Classification) -> Self
    where
        T: Into<String>,
    {
        let domain_name = domain_name.into();
        if c.expired {
            CheckOutcome::Expired { domain_name }
        } else if c.expiring_soon {
            CheckOutcome::ExpiringSoon {
                domain_name,
                days_remaining: c.days_until_invalid,
                day_threshold,
            }
        } else {
            CheckOutcome::Healthy {
                domain_name,
                days_remaining: c.days_until_invalid,
            }
        }
    }

    /// Is this the only successful outcome?
    pub fn is_healthy(&self) -> bool {
        matches!(self, CheckOutcome::Healthy { .. })
    }

    /// Human-readable reason for a failed check, `None` when healthy
    pub fn failure_reason(&self) -> Option<String> {
        if self.is_healthy() {
            None
        } else {
            Some(self.to_string())
        }
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckOutcome::Healthy {
                domain_name,
                days_remaining,
            } => write!(
                f,
                "Certificate for domain {domain_name} is currently valid and will expire in {days_remaining} days"
            ),
            CheckOutcome::Expired { domain_name } => {
                write!(f, "Certificate for domain {domain_name} is expired")
            }
            CheckOutcome::ExpiringSoon {
                domain_name,
                day_threshold,
                ..
            } => write!(
                f,
                "Certificate for domain {domain_name} is expiring in less than {day_threshold} days"
            ),
            CheckOutcome::HandshakeFailed(cause) => write!(f, "{cause}"),
            CheckOutcome::TimedOut => write!(
                f,
                "Failed to complete SSL expiry check in time. Timeout was reached."
            ),
            CheckOutcome::Cancelled => {
                write!(f, "Cancelling check and shutting down due to interrupt.")
            }
        }
    }
}
