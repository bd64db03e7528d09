//! Client configuration loaded from TOML.
//!
//! ```toml
//! user_agent = "my-pack-installer/1.0 (admin@example.org)"
//! timeout = "30s"
//! connect_timeout = "10s"
//! max_redirects = 10
//!
//! [rate_limit]
//! max_wait = "5m"
//!
//! [rate_limit.quota_headers]
//! remaining = ["x-ratelimit-remaining"]
//! reset = [{ name = "x-ratelimit-reset", format = "delta-seconds" }]
//! ```
//!
//! Every field is optional; missing fields take the defaults of
//! [`ClientBuilder`](crate::ClientBuilder).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT};
use crate::ratelimit::RateLimitConfig;
use crate::{ErrorKind, Result};

/// Settings for building a [`Client`](crate::Client)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// User-agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Total timeout per request
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Timeout for the connect phase of a request
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Maximum number of redirects per request
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Per-host rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout: None,
            connect_timeout: default_connect_timeout(),
            max_redirects: default_max_redirects(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

const fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

const fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

impl Config {
    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ReadConfig`] if the file cannot be read and
    /// [`ErrorKind::ParseConfig`] if it is not a valid configuration.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let contents =
            fs::read_to_string(path).map_err(|e| ErrorKind::ReadConfig(path.to_path_buf(), e))?;
        Ok(toml::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{ResetFormat, ResetHeader};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.max_redirects, 10);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            user_agent = "pack-server/2.0"
            timeout = "1m 30s"

            [rate_limit.quota_headers]
            reset = [{{ name = "retry-after", format = "retry-after" }}]
            "#
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.user_agent, "pack-server/2.0");
        assert_eq!(config.timeout, Some(Duration::from_secs(90)));
        assert_eq!(
            config.rate_limit.quota_headers.reset,
            vec![ResetHeader::new("retry-after", ResetFormat::RetryAfter)]
        );
        // not mentioned in the file, so the default list is kept
        assert_eq!(config.rate_limit.quota_headers.remaining.len(), 3);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from_file(&dir.path().join("packfetch.toml"));
        assert!(matches!(result, Err(ErrorKind::ReadConfig(..))));
    }

    #[test]
    fn test_unknown_field() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retries = 3").unwrap();

        let result = Config::load_from_file(file.path());
        assert!(matches!(result, Err(ErrorKind::ParseConfig(_))));
    }
}
