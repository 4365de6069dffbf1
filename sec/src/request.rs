use chrono::{DateTime, TimeZone, Utc};
use log::warn;

use crate::error::ConfigError;

/// Raw configuration values, usually read from the environment
#[derive(Clone, Copy, Debug, Default)]
pub struct RawRequest<'a> {
    /// `DOMAIN_NAME`
    pub domain_name: Option<&'a str>,
    /// `PORT`
    pub port: Option<&'a str>,
    /// `DAYS`
    pub days: Option<&'a str>,
    /// `INSECURE`
    pub insecure: Option<&'a str>,
    /// `KH_CHECK_RUN_DEADLINE`, seconds since Unix epoch
    pub deadline: Option<&'a str>,
}

/// Validated, immutable description of one check
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckRequest {
    /// Host to connect to
    pub domain_name: String,
    /// TCP port to connect to
    pub port: u16,
    /// Threshold in days for the expiring-soon warning
    pub day_threshold: u64,
    /// Skip chain and hostname verification
    pub skip_tls_verify: bool,
    /// Deadline from the harness, if it provided one
    pub deadline: Option<DateTime<Utc>>,
}

impl CheckRequest {
    /// Validate raw values. A bad deadline is not fatal; it is dropped with a warning.
    ///
    /// ```
    /// # use sec::{CheckRequest, RawRequest};
    /// let raw = RawRequest {
    ///     domain_name: Some("sha256.badssl.com"),
    ///     port: Some("443"),
    ///     days: Some("30"),
    ///     insecure: Some("false"),
    ///     deadline: None,
    /// };
    /// let request = CheckRequest::parse(&raw).unwrap();
    /// assert_eq!(30, request.day_threshold);
    /// ```
    pub fn parse(raw: &RawRequest<'_>) -> Result<Self, ConfigError> {
        let domain_name = required(raw.domain_name, "DOMAIN_NAME")?;
        let port = required(raw.port, "PORT")?
            .parse::<u16>()
            .map_err(ConfigError::Port)?;
        let day_threshold = required(raw.days, "DAYS")?
            .parse::<u64>()
            .map_err(ConfigError::Days)?;
        let insecure = required(raw.insecure, "INSECURE")?;
        let skip_tls_verify =
            parse_bool(insecure).ok_or_else(|| ConfigError::Insecure(insecure.to_string()))?;

        Ok(CheckRequest {
            domain_name: domain_name.to_string(),
            port,
            day_threshold,
            skip_tls_verify,
            deadline: parse_deadline(raw.deadline),
        })
    }
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, ConfigError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn parse_deadline(s: Option<&str>) -> Option<DateTime<Utc>> {
    let s = s.filter(|s| !s.is_empty())?;
    let deadline = s
        .parse::<i64>()
        .ok()
        .and_then(|seconds| Utc.timestamp_opt(seconds, 0).single());
    if deadline.is_none() {
        warn!("there was an issue getting the check deadline: invalid timestamp {s:?}");
    }
    deadline
}
