use std::io;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Invalid or missing configuration, raised before any network activity.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required environment variable is empty or absent.
    #[error("{0} environment variable has not been set")]
    Missing(&'static str),
    /// `DAYS` is not a non-negative integer.
    #[error("failed to parse DAYS: {0}")]
    Days(#[source] ParseIntError),
    /// `PORT` is not a TCP port number.
    #[error("failed to parse PORT: {0}")]
    Port(#[source] ParseIntError),
    /// `INSECURE` is not a boolean.
    #[error("failed to parse INSECURE: invalid syntax {0:?}")]
    Insecure(String),
    /// CA certificate file cannot be read.
    #[error("failed to read CA certificates from {}: {source}", .path.display())]
    CaFile {
        /// Path of the PEM file
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },
    /// CA certificate input holds no usable certificate.
    #[error("no usable CA certificate found in {0}")]
    NoCaCertificate(String),
}

/// Failure to obtain a certificate window from the peer.
///
/// Every variant is reported as a failed handshake; the text keeps the
/// underlying cause.
#[derive(Error, Debug)]
pub enum InspectError {
    /// Domain name cannot be used as a TLS server name.
    #[error("invalid DNS name: {0}")]
    DnsName(String),
    /// TCP connection could not be established.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// host:port that was dialed
        address: String,
        /// Underlying I/O error
        source: io::Error,
    },
    /// TLS negotiation or certificate verification failed.
    #[error("TLS handshake with {address} failed: {source}")]
    Handshake {
        /// host:port that was dialed
        address: String,
        /// Underlying I/O error from the TLS stream
        source: io::Error,
    },
    /// Connect-level timeout elapsed before the handshake completed.
    #[error("TLS handshake with {address} timed out after {}s", .timeout.as_secs())]
    Timeout {
        /// host:port that was dialed
        address: String,
        /// Connect-level timeout
        timeout: Duration,
    },
    /// Peer presented no certificate.
    #[error("no peer certificates found for {0}")]
    NoPeerCertificate(String),
    /// No peer certificate matches the requested host name.
    #[error("no peer certificate matches {0}")]
    NoMatchingCertificate(String),
    /// Leaf certificate could not be parsed.
    #[error("failed to parse certificate: {0}")]
    Parse(String),
    /// Validity timestamps are out of range.
    #[error("certificate validity is out of range")]
    Validity,
    /// Cancelled before dialing.
    #[error("check cancelled before connecting")]
    Cancelled,
}

/// Failure to deliver a report to the harness.
#[derive(Error, Debug)]
pub enum ReportError {
    /// Error from [`ureq`] crate, including non-2xx responses.
    #[error("ureq error: {0}")]
    UReq(#[from] Box<ureq::Error>),
    /// Reporting task panicked or was cancelled.
    #[error("reporting task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// Error from [`serde_json`] crate.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
