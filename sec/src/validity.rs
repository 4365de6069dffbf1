use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use x509_parser::certificate::X509Certificate;

use crate::error::InspectError;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Validity window of a single certificate
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CertificateWindow {
    /// Certificate is not valid before this instant
    pub not_before: DateTime<Utc>,
    /// Certificate is not valid after this instant
    pub not_after: DateTime<Utc>,
}

/// Result of comparing a [`CertificateWindow`] against "now" and a threshold
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Classification {
    /// Outside of the validity window, either not yet valid or already expired
    pub expired: bool,
    /// Remaining whole days are at or below the threshold
    pub expiring_soon: bool,
    /// Whole days until `not_after`, negative once expired
    pub days_until_invalid: i64,
}

impl CertificateWindow {
    /// Create a window from two instants
    pub fn new(not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        CertificateWindow {
            not_before,
            not_after,
        }
    }

    /// Whole days until the certificate becomes invalid, rounded towards
    /// negative infinity.
    ///
    /// ```
    /// # use sec::CertificateWindow;
    /// use chrono::{Duration, Utc};
    /// let now = Utc::now();
    /// let window = CertificateWindow::new(now - Duration::days(1), now - Duration::seconds(1));
    /// assert_eq!(-1, window.days_until_invalid(now));
    /// ```
    pub fn days_until_invalid(&self, now: DateTime<Utc>) -> i64 {
        (self.not_after - now)
            .num_seconds()
            .div_euclid(SECONDS_PER_DAY)
    }

    /// Is `now` outside of `[not_before, not_after]`?
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now < self.not_before || now > self.not_after
    }

    /// Classify the window against `now` and a threshold in days.
    ///
    /// Expiry and the threshold are evaluated independently, so an expired
    /// certificate is also expiring soon.
    ///
    /// ```
    /// # use sec::CertificateWindow;
    /// use chrono::{Duration, Utc};
    /// let now = Utc::now();
    /// let window = CertificateWindow::new(now - Duration::days(365), now + Duration::days(10));
    /// let c = window.classify(now, 30);
    /// assert!(!c.expired);
    /// assert!(c.expiring_soon);
    /// ```
    pub fn classify(&self, now: DateTime<Utc>, day_threshold: u64) -> Classification {
        let days_until_invalid = self.days_until_invalid(now);
        let threshold = i64::try_from(day_threshold).unwrap_or(i64::MAX);
        Classification {
            expired: self.is_expired(now),
            expiring_soon: threshold >= days_until_invalid,
            days_until_invalid,
        }
    }
}

impl<'a> TryFrom<&X509Certificate<'a>> for CertificateWindow {
    type Error = InspectError;

    fn try_from(cert: &X509Certificate<'a>) -> Result<Self, Self::Error> {
        let validity = cert.validity();
        let not_before = Utc
            .timestamp_opt(validity.not_before.timestamp(), 0)
            .single()
            .ok_or(InspectError::Validity)?;
        let not_after = Utc
            .timestamp_opt(validity.not_after.timestamp(), 0)
            .single()
            .ok_or(InspectError::Validity)?;
        Ok(CertificateWindow::new(not_before, not_after))
    }
}

impl fmt::Display for CertificateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "valid from {} until {}",
            self.not_before.to_rfc3339(),
            self.not_after.to_rfc3339()
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use chrono::{Duration, SubsecRound};

    fn now() -> DateTime<Utc> {
        Utc::now().round_subsecs(0)
    }

    #[test]
    fn t_expiring_soon_but_valid() {
        let now = now();
        let window = CertificateWindow::new(now - Duration::days(365), now + Duration::days(10));
        let c = window.classify(now, 30);
        assert!(!c.expired);
        assert!(c.expiring_soon);
        assert_eq!(10, c.days_until_invalid);
    }

    #[test]
    fn t_expired_regardless_of_threshold() {
        let now = now();
        let window = CertificateWindow::new(now - Duration::days(365), now - Duration::days(1));
        for threshold in [0, 1, 30, 365, u64::MAX] {
            let c = window.classify(now, threshold);
            assert!(c.expired, "threshold {threshold}");
            assert!(c.expiring_soon, "threshold {threshold}");
        }
    }

    #[test]
    fn t_healthy() {
        let now = now();
        let window = CertificateWindow::new(now - Duration::days(1), now + Duration::days(100));
        let c = window.classify(now, 5);
        assert!(!c.expired);
        assert!(!c.expiring_soon);
        assert_eq!(100, c.days_until_invalid);
    }

    #[test]
    fn t_independent_flags() {
        let now = now();
        let window = CertificateWindow::new(now - Duration::days(30), now + Duration::days(2));
        let c = window.classify(now, 5);
        assert!(!c.expired);
        assert!(c.expiring_soon);
    }

    #[test]
    fn t_not_yet_valid() {
        let now = now();
        let window = CertificateWindow::new(now + Duration::days(1), now + Duration::days(90));
        let c = window.classify(now, 30);
        assert!(c.expired);
        assert!(!c.expiring_soon);
    }

    #[test]
    fn t_window_boundaries_are_inclusive() {
        let now = now();
        let window = CertificateWindow::new(now, now + Duration::days(1));
        assert!(!window.is_expired(now));
        assert!(!window.is_expired(now + Duration::days(1)));
        assert!(window.is_expired(now + Duration::days(1) + Duration::seconds(1)));
        assert!(window.is_expired(now - Duration::seconds(1)));
    }

    #[test]
    fn t_threshold_is_inclusive() {
        let now = now();
        let window = CertificateWindow::new(now - Duration::days(1), now + Duration::days(7));
        assert!(window.classify(now, 7).expiring_soon);
        assert!(!window.classify(now, 6).expiring_soon);
    }

    #[test]
    fn t_days_are_floored() {
        let now = now();
        let window = CertificateWindow::new(
            now - Duration::days(1),
            now + Duration::days(3) - Duration::seconds(1),
        );
        assert_eq!(2, window.days_until_invalid(now));

        let window = CertificateWindow::new(now - Duration::days(1), now + Duration::hours(23));
        assert_eq!(0, window.days_until_invalid(now));
        assert!(window.classify(now, 0).expiring_soon);

        let window = CertificateWindow::new(now - Duration::days(9), now - Duration::hours(25));
        assert_eq!(-2, window.days_until_invalid(now));
    }

    #[test]
    fn t_classification_is_deterministic() {
        let now = now();
        let window = CertificateWindow::new(now - Duration::days(10), now + Duration::days(20));
        assert_eq!(window.classify(now, 20), window.classify(now, 20));
    }

    #[test]
    fn t_threshold_sweep() {
        let now = now();
        for days in -3..=3i64 {
            let window =
                CertificateWindow::new(now - Duration::days(30), now + Duration::days(days));
            for threshold in 0..=5u64 {
                let c = window.classify(now, threshold);
                assert_eq!(c.expiring_soon, days <= threshold as i64, "{days} {threshold}");
                assert_eq!(c.expired, days < 0, "{days} {threshold}");
            }
        }
    }

    #[test]
    fn t_display() {
        let now = now();
        let window = CertificateWindow::new(now, now + Duration::days(1));
        let r1 = now.to_rfc3339();
        let r2 = (now + Duration::days(1)).to_rfc3339();
        assert_eq!(format!("valid from {r1} until {r2}"), window.to_string());
    }
}
