//! Handle rate limiting headers.
//!
//! There is no single convention for announcing quota. Some hosts send the
//! IETF draft `RateLimit-*` fields, others an `X-RateLimit-*` variant with
//! either a delay or an epoch timestamp, and most send `Retry-After` on a
//! `429`. Which headers are read, and how, is therefore configuration.

use http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ResetParseError {
    #[error("Unable to parse value '{0}'")]
    ValueError(String),

    #[error("Header value contains invalid chars")]
    HeaderValueError,
}

/// How the value of a reset header is to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetFormat {
    /// Number of seconds from now until the quota is replenished
    DeltaSeconds,
    /// Seconds since the Unix epoch at which the quota is replenished
    UnixTimestamp,
    /// `Retry-After` as specified per
    /// [RFC 7231 section 7.1.3](https://www.rfc-editor.org/rfc/rfc7231#section-7.1.3),
    /// either delay-seconds or an HTTP-date.
    ///
    /// A host sending this asks not to be contacted before the given time,
    /// so the quota is considered exhausted until then.
    RetryAfter,
}

/// A header announcing when the quota of a host is replenished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetHeader {
    /// Header name, matched case-insensitively
    pub name: String,
    /// How to interpret the header value
    pub format: ResetFormat,
}

impl ResetHeader {
    /// Create a reset header mapping
    #[must_use]
    pub fn new(name: impl Into<String>, format: ResetFormat) -> Self {
        Self {
            name: name.into().to_lowercase(),
            format,
        }
    }
}

/// Mapping from response headers to quota information.
///
/// Both lists are ordered; the first header that is present and parses
/// wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaHeaders {
    /// Headers carrying the number of requests left in the current window
    #[serde(default = "default_remaining_headers")]
    pub remaining: Vec<String>,

    /// Headers carrying the time at which the window resets
    #[serde(default = "default_reset_headers")]
    pub reset: Vec<ResetHeader>,
}

impl Default for QuotaHeaders {
    fn default() -> Self {
        Self {
            remaining: default_remaining_headers(),
            reset: default_reset_headers(),
        }
    }
}

fn default_remaining_headers() -> Vec<String> {
    vec![
        "x-ratelimit-remaining".into(),
        "x-rate-limit-remaining".into(),
        "ratelimit-remaining".into(),
    ]
}

fn default_reset_headers() -> Vec<ResetHeader> {
    vec![
        ResetHeader::new("x-ratelimit-reset", ResetFormat::DeltaSeconds),
        ResetHeader::new("ratelimit-reset", ResetFormat::DeltaSeconds),
        ResetHeader::new("retry-after", ResetFormat::RetryAfter),
    ]
}

/// Quota information extracted from a single response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct QuotaUpdate {
    pub(crate) remaining: Option<u64>,
    pub(crate) reset_at: Option<SystemTime>,
}

impl QuotaUpdate {
    pub(crate) const fn is_empty(&self) -> bool {
        self.remaining.is_none() && self.reset_at.is_none()
    }
}

impl QuotaHeaders {
    /// Extract quota information from response headers, relative to `now`
    pub(crate) fn parse(&self, headers: &HeaderMap, now: SystemTime) -> QuotaUpdate {
        let mut remaining = self.remaining.iter().find_map(|name| {
            headers
                .get(name.as_str())
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
        });

        let reset = self.reset.iter().find_map(|header| {
            let value = headers.get(header.name.as_str())?;
            parse_reset(value, header.format, now)
                .ok()
                .map(|reset_at| (reset_at, header.format))
        });

        if let Some((_, ResetFormat::RetryAfter)) = reset {
            remaining = Some(0);
        }

        QuotaUpdate {
            remaining,
            reset_at: reset.map(|(reset_at, _)| reset_at),
        }
    }
}

/// Parse a reset header value into the wall-clock time of the reset
pub(crate) fn parse_reset(
    value: &HeaderValue,
    format: ResetFormat,
    now: SystemTime,
) -> Result<SystemTime, ResetParseError> {
    let value = value
        .to_str()
        .map_err(|_| ResetParseError::HeaderValueError)?
        .trim();
    let invalid = || ResetParseError::ValueError(value.into());
    let seconds = || value.parse::<u64>().map_err(|_| invalid());
    // Absurdly large values must not overflow the clock
    let after = |base: SystemTime, secs: u64| {
        base.checked_add(Duration::from_secs(secs))
            .ok_or_else(invalid)
    };

    match format {
        ResetFormat::DeltaSeconds => after(now, seconds()?),
        ResetFormat::UnixTimestamp => after(UNIX_EPOCH, seconds()?),
        // RFC 7231: Retry-After = HTTP-date / delay-seconds
        ResetFormat::RetryAfter => match value.parse::<u64>() {
            Ok(delay) => after(now, delay),
            Err(_) => httpdate::parse_http_date(value).map_err(|_| invalid()),
        },
    }
}
