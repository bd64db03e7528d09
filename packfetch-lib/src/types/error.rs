use std::path::PathBuf;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;
use url::Url;

use crate::ratelimit::HostKey;

/// Possible errors when interacting with `packfetch_lib`
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Network error while sending a request or receiving its headers
    #[error("Network error while trying to connect to an endpoint via reqwest")]
    NetworkRequest(#[source] reqwest::Error),

    /// Cannot read the body of a response
    #[error("Error reading response body: {0}")]
    ReadResponseBody(#[source] reqwest::Error),

    /// The HTTP client could not be built from the given settings
    #[error("Error creating request client: {0}")]
    BuildClient(#[source] reqwest::Error),

    /// The given string can not be parsed into a valid URL
    #[error("Cannot parse `{0}` as a URL: {1}")]
    UrlParse(String, #[source] url::ParseError),

    /// An URL with an invalid host was found
    #[error("URL is missing a host")]
    InvalidUrlHost,

    /// The given header could not be parsed
    #[error("Header could not be parsed.")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// A host asked us to wait longer than the configured ceiling
    #[error("Host {host} exceeded rate limit: next request allowed in {}s", .wait.as_secs())]
    RateLimitExceeded {
        /// The host whose quota is exhausted
        host: HostKey,
        /// How long the host asked us to wait
        wait: Duration,
    },

    /// The request was cancelled while waiting for quota or a response
    #[error("Request to {0} was cancelled")]
    Cancelled(HostKey),

    /// A download was answered with a non-success status
    #[error("Download of {url} failed with HTTP status {}", .0.as_u16(), url = .1)]
    DownloadStatus(StatusCode, Url),

    /// Neither the caller, the response headers nor the URL provided a file name
    #[error("Could not determine file name for download from {0}")]
    UnknownFileName(Url),

    /// The download directory could not be created
    #[error("Cannot create directory `{}`: {source}", .0.display(), source = .1)]
    CreateDirectory(PathBuf, #[source] std::io::Error),

    /// The download file could not be created
    #[error("Cannot create file `{}`: {source}", .0.display(), source = .1)]
    CreateFile(PathBuf, #[source] std::io::Error),

    /// Writing the response body to disk failed
    #[error("Cannot write to file `{}`: {source}", .0.display(), source = .1)]
    WriteFile(PathBuf, #[source] std::io::Error),

    /// Flushing or syncing the written file failed
    #[error("Cannot close file `{}`: {source}", .0.display(), source = .1)]
    CloseFile(PathBuf, #[source] std::io::Error),

    /// Moving the finished download into place failed
    #[error("Cannot move download into place at `{}`: {source}", .0.display(), source = .1)]
    PersistFile(PathBuf, #[source] std::io::Error),

    /// The configuration file could not be read
    #[error("Cannot read configuration file `{}`: {source}", .0.display(), source = .1)]
    ReadConfig(PathBuf, #[source] std::io::Error),

    /// The configuration file is not valid TOML or has unknown fields
    #[error("Failed to parse configuration file: {0}")]
    ParseConfig(#[from] toml::de::Error),
}
