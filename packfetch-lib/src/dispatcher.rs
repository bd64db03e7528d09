use reqwest::{Request, Response};
use tokio_util::sync::CancellationToken;

use crate::ratelimit::{HostKey, RateLimiterRegistry};
use crate::{ErrorKind, Result};

/// Sends requests through the quota gate of their host.
///
/// Every call to [`send`](Self::send) performs exactly one network request:
/// wait for the host's quota, execute, record the quota the host reports.
/// There are no retries at this layer. The dispatcher itself does not
/// serialize requests, so any number of tasks may share it.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    /// HTTP transport
    client: reqwest::Client,

    /// Quota state shared with every dispatcher built from the same registry
    registry: RateLimiterRegistry,
}

impl RequestDispatcher {
    /// Create a dispatcher sending through `client` and throttling via `registry`
    #[must_use]
    pub const fn new(client: reqwest::Client, registry: RateLimiterRegistry) -> Self {
        Self { client, registry }
    }

    /// The registry this dispatcher throttles with
    #[must_use]
    pub const fn registry(&self) -> &RateLimiterRegistry {
        &self.registry
    }

    /// The underlying transport, for building requests
    #[must_use]
    pub const fn transport(&self) -> &reqwest::Client {
        &self.client
    }

    /// Send `request` once its host permits it.
    ///
    /// The quota headers of the response are recorded whatever its status,
    /// since hosts count failed requests against the quota as well.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidUrlHost`] if the request URL has no host
    /// - [`ErrorKind::RateLimitExceeded`] if the host asks for a longer wait
    ///   than configured
    /// - [`ErrorKind::Cancelled`] if `cancel` fires before a response arrives
    /// - [`ErrorKind::NetworkRequest`] if the transport fails
    pub async fn send(&self, request: Request, cancel: &CancellationToken) -> Result<Response> {
        let host = HostKey::try_from(request.url())?;
        let limiter = self.registry.get_or_create_host(&host);

        limiter.wait(cancel).await?;

        log::trace!("{} {}", request.method(), request.url());
        let response = tokio::select! {
            () = cancel.cancelled() => return Err(ErrorKind::Cancelled(host)),
            response = self.client.execute(request) => response.map_err(ErrorKind::NetworkRequest)?,
        };

        limiter.record(response.headers());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dispatcher() -> RequestDispatcher {
        RequestDispatcher::new(reqwest::Client::new(), RateLimiterRegistry::default())
    }

    fn get(url: &str) -> Request {
        Request::new(reqwest::Method::GET, url.parse().unwrap())
    }

    #[tokio::test]
    async fn test_send_records_quota_on_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("x-ratelimit-remaining", "0")
                    .insert_header("x-ratelimit-reset", "30"),
            )
            .mount(&mock_server)
            .await;

        let dispatcher = dispatcher();
        let response = dispatcher
            .send(get(&mock_server.uri()), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status(), 429);

        let host = HostKey::try_from(response.url()).unwrap();
        assert_eq!(dispatcher.registry().quota(&host).remaining, Some(0));
    }

    #[tokio::test]
    async fn test_send_one_request_per_call() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = dispatcher()
            .send(get(&mock_server.uri()), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status(), 500);
    }

    #[tokio::test]
    async fn test_send_without_host() {
        let result = dispatcher()
            .send(get("file:///srv/pack.mrpack"), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ErrorKind::InvalidUrlHost)));
    }

    #[tokio::test]
    async fn test_network_error_is_surfaced() {
        // Nothing listens on the discard port
        let result = dispatcher()
            .send(get("http://127.0.0.1:9/"), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ErrorKind::NetworkRequest(_))));
    }

    #[tokio::test]
    async fn test_cancel_pending_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&mock_server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = dispatcher().send(get(&mock_server.uri()), &cancel).await;
        assert!(matches!(result, Err(ErrorKind::Cancelled(_))));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
