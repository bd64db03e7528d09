use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::QuotaHeaders;

/// Rate limiting configuration shared by all hosts of a registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Longest a request may wait for quota before it fails instead.
    ///
    /// `None` waits as long as the host asks for.
    #[serde(default, with = "humantime_serde")]
    pub max_wait: Option<Duration>,

    /// Which response headers announce quota, and how to read them
    #[serde(default)]
    pub quota_headers: QuotaHeaders,
}
