#![deny(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications
)]

//! SSL Expiry Check
//!
//! One-shot probe that opens a TLS connection to `host:port`, reads the validity
//! window of the leaf certificate and reports whether it is expired, expiring
//! within a threshold in days, or healthy. The probe races a deadline handed over
//! by the surrounding health-check harness and an external cancellation signal.

pub use checker::Checker;
pub use error::{ConfigError, InspectError, ReportError};
pub use inspector::{Inspector, LeafSelection, CONNECT_TIMEOUT};
pub use orchestrator::{Orchestrator, DEFAULT_CHECK_TIMEOUT, SAFETY_MARGIN};
pub use outcome::CheckOutcome;
pub use report::{deliver, KuberhealthyReporter, LogReporter, Report, Reporter};
pub use request::{CheckRequest, RawRequest};
pub use validity::{CertificateWindow, Classification};

mod checker;
mod error;
mod inspector;
mod orchestrator;
mod outcome;
mod report;
mod request;
mod validity;

#[cfg(test)]
mod testing;
