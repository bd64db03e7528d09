//! The rate-aware HTTP client.
//!
//! This module defines two structs, [`Client`] and [`ClientBuilder`].
//! `Client` fetches models and downloads files through a
//! [`RequestDispatcher`]. `ClientBuilder` exposes a finer level of
//! granularity for building a `Client`.
#![allow(clippy::module_name_repetitions)]

use http::header::{self, HeaderMap, HeaderValue};
use reqwest::{Request, Response};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use typed_builder::TypedBuilder;
use url::Url;

use crate::config::Config;
use crate::ratelimit::{RateLimitConfig, RateLimiterRegistry};
use crate::{ErrorKind, RequestDispatcher, Result};

/// Default number of redirects followed before a request fails, 10.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
/// Default timeout for the connect phase of a request, 10 seconds.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default user agent, `packfetch/<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("packfetch/", env!("CARGO_PKG_VERSION"));

/// Builder for [`Client`].
///
/// ```
/// use packfetch_lib::{ClientBuilder, Result};
///
/// # fn main() -> Result<()> {
/// let client = ClientBuilder::builder()
///     .user_agent("my-pack-installer/1.0")
///     .build()
///     .client()?;
/// # Ok(())
/// # }
/// ```
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `ClientBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `ClientBuilder`.
"))]
pub struct ClientBuilder {
    /// User-agent sent with every request.
    ///
    /// Public APIs such as Modrinth ask clients to identify themselves
    /// uniquely and may block generic agents.
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,

    /// Total timeout per request, including reading the body.
    timeout: Option<Duration>,

    /// Timeout for the connect phase of a request.
    #[builder(default = DEFAULT_CONNECT_TIMEOUT)]
    connect_timeout: Duration,

    /// Maximum number of redirects per request before returning an error.
    #[builder(default = DEFAULT_MAX_REDIRECTS)]
    max_redirects: usize,

    /// Extra headers sent with every request.
    custom_headers: HeaderMap,

    /// Rate limiting configuration, used when no `registry` is given.
    rate_limit: RateLimitConfig,

    /// Registry to share quota state with other clients.
    ///
    /// When `None`, the client gets a registry of its own built from
    /// `rate_limit`.
    registry: Option<RateLimiterRegistry>,
}

impl Default for ClientBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<Config> for ClientBuilder {
    fn from(config: Config) -> Self {
        Self::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .max_redirects(config.max_redirects)
            .rate_limit(config.rate_limit)
            .build()
    }
}

impl ClientBuilder {
    /// Instantiates a [`Client`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The user-agent contains characters not allowed in a header.
    /// - The request client cannot be created.
    ///   See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn client(self) -> Result<Client> {
        let Self {
            user_agent,
            custom_headers: mut headers,
            ..
        } = self;

        headers.insert(header::USER_AGENT, HeaderValue::from_str(&user_agent)?);
        // Every request gets a fresh connection
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));

        let builder = reqwest::ClientBuilder::new()
            .gzip(true)
            .default_headers(headers)
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(0)
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects));

        let reqwest_client = (match self.timeout {
            Some(t) => builder.timeout(t),
            None => builder,
        })
        .build()
        .map_err(ErrorKind::BuildClient)?;

        let registry = self
            .registry
            .unwrap_or_else(|| RateLimiterRegistry::new(self.rate_limit));

        Ok(Client {
            dispatcher: RequestDispatcher::new(reqwest_client, registry),
            cancel: CancellationToken::new(),
        })
    }
}

/// Fetches models and downloads files, throttled per host.
///
/// A `Client` is immutable once built and cheap to clone; clones share the
/// transport and the quota registry, so a single client can serve many
/// concurrent tasks. See [`ClientBuilder`] for the available settings.
#[derive(Debug, Clone)]
pub struct Client {
    /// Sends every request through the quota gate of its host
    pub(crate) dispatcher: RequestDispatcher,

    /// Aborts waits and transfers of this client when cancelled
    pub(crate) cancel: CancellationToken,
}

impl Client {
    /// A clone of this client whose requests are aborted once `cancel` fires.
    ///
    /// Cancellation interrupts waiting for quota as well as pending
    /// transfers; the affected calls fail with [`ErrorKind::Cancelled`].
    #[must_use]
    pub fn with_cancellation(&self, cancel: CancellationToken) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            cancel,
        }
    }

    /// The dispatcher all requests of this client go through
    #[must_use]
    pub const fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    /// The quota registry of this client
    #[must_use]
    pub const fn registry(&self) -> &RateLimiterRegistry {
        self.dispatcher.registry()
    }

    /// Send a prepared request through the dispatcher.
    ///
    /// # Errors
    ///
    /// See [`RequestDispatcher::send`].
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.dispatcher.send(request, &self.cancel).await
    }

    /// Build a GET request for `url` with the client's default headers
    pub(crate) fn get_request(&self, url: Url, headers: HeaderMap) -> Result<Request> {
        self.dispatcher
            .transport()
            .get(url)
            .headers(headers)
            .build()
            .map_err(ErrorKind::NetworkRequest)
    }
}

/// Parse a URL given as a string
pub(crate) fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| ErrorKind::UrlParse(url.to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::HostKey;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_default_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", DEFAULT_USER_AGENT))
            .and(header("connection", "close"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ClientBuilder::default().client().unwrap();
        let request = client
            .get_request(parse_url(&mock_server.uri()).unwrap(), HeaderMap::new())
            .unwrap();
        let response = client.send(request).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_custom_user_agent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", "mrpack-install/0.16"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ClientBuilder::builder()
            .user_agent("mrpack-install/0.16")
            .build()
            .client()
            .unwrap();
        let request = client
            .get_request(parse_url(&mock_server.uri()).unwrap(), HeaderMap::new())
            .unwrap();
        assert_eq!(client.send(request).await.unwrap().status(), 204);
    }

    #[test]
    fn test_invalid_user_agent() {
        let result = ClientBuilder::builder()
            .user_agent("packfetch\n")
            .build()
            .client();
        assert!(matches!(result, Err(ErrorKind::InvalidHeader(_))));
    }

    #[test]
    fn test_shared_registry() {
        let registry = RateLimiterRegistry::default();
        let first = ClientBuilder::builder()
            .registry(registry.clone())
            .build()
            .client()
            .unwrap();
        let second = ClientBuilder::builder()
            .registry(registry.clone())
            .build()
            .client()
            .unwrap();

        let host = HostKey::from("api.modrinth.com");
        first.registry().get_or_create_host(&host);
        assert_eq!(second.registry().active_host_count(), 1);
        assert_eq!(registry.active_host_count(), 1);
    }

    #[test]
    fn test_builder_from_config() {
        let config: Config = toml::from_str(
            r#"
            user_agent = "pack-server/2.0"
            max_redirects = 3

            [rate_limit]
            max_wait = "30s"
            "#,
        )
        .unwrap();

        let client = ClientBuilder::from(config).client().unwrap();
        assert_eq!(
            client.registry().config().max_wait,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_parse_url() {
        assert!(parse_url("https://api.modrinth.com/v2/project/sodium").is_ok());
        assert!(matches!(
            parse_url("not a url"),
            Err(ErrorKind::UrlParse(input, _)) if input == "not a url"
        ));
    }
}
