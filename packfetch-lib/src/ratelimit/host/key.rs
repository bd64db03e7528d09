use std::fmt;
use url::Url;

use crate::ErrorKind;
use crate::types::Result;

/// A type-safe representation of a host authority for rate limiting purposes.
///
/// The key is the lower-cased host name, followed by `:port` when the URL
/// names a port other than its scheme's default. Two servers on the same
/// machine but different ports are therefore throttled independently.
///
/// # Examples
///
/// ```
/// use packfetch_lib::ratelimit::HostKey;
/// use url::Url;
///
/// let url = Url::parse("https://API.Modrinth.com/v2/project/sodium").unwrap();
/// let host_key = HostKey::try_from(&url).unwrap();
/// assert_eq!(host_key.as_str(), "api.modrinth.com");
///
/// let url = Url::parse("http://localhost:8080/maven-metadata.xml").unwrap();
/// assert_eq!(HostKey::try_from(&url).unwrap().as_str(), "localhost:8080");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostKey(String);

impl HostKey {
    /// Get the host authority as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&Url> for HostKey {
    type Error = ErrorKind;

    fn try_from(url: &Url) -> Result<Self> {
        let host = url.host_str().ok_or(ErrorKind::InvalidUrlHost)?;
        // `Url::port` is `None` when the port is the scheme's default
        let key = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(HostKey(key.to_lowercase()))
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for HostKey {
    fn from(host: &str) -> Self {
        HostKey(host.to_lowercase())
    }
}
