//! Fetch typed models from HTTP endpoints.
//!
//! A fetch either yields the decoded success model or a [`FetchError`].
//! For non-success statuses the body is decoded into the caller's error
//! model, so API errors such as Modrinth's
//! `{"error": "not_found", "description": "..."}` come back typed.

use http::StatusCode;
use http::header::{self, HeaderMap, HeaderValue};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

use crate::client::parse_url;
use crate::decode::{DecodeError, Decoder, Json, Xml};
use crate::{Client, ErrorKind};

/// Failure of a model fetch, generic over the error model `E` of the API
#[derive(Error, Debug)]
pub enum FetchError<E> {
    /// The request could not be sent or its body could not be read
    #[error(transparent)]
    Request(#[from] ErrorKind),

    /// Non-success status without a decodable error body
    #[error("HTTP status {}", .0.as_u16())]
    Status(StatusCode),

    /// Non-success status with an error body decoded into `E`
    #[error("HTTP status {} - {error}", .status.as_u16())]
    Remote {
        /// Status of the response
        status: StatusCode,
        /// The decoded error model
        error: E,
    },

    /// Success status, but the body does not match the requested model
    #[error("HTTP status {} - {source}", .status.as_u16())]
    Decode {
        /// Status of the response
        status: StatusCode,
        /// Why decoding failed
        #[source]
        source: DecodeError,
    },
}

impl<E> FetchError<E> {
    /// HTTP status of the response, if one was received
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Request(_) => None,
            Self::Status(status) | Self::Remote { status, .. } | Self::Decode { status, .. } => {
                Some(*status)
            }
        }
    }
}

/// Error model for endpoints without a structured error body.
///
/// It never decodes, so failures are always reported as
/// [`FetchError::Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoErrorModel {}

impl<'de> Deserialize<'de> for NoErrorModel {
    fn deserialize<D: Deserializer<'de>>(_: D) -> Result<Self, D::Error> {
        Err(de::Error::custom("no error model"))
    }
}

impl fmt::Display for NoErrorModel {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

/// Statuses below 200 and from 400 on are failures; redirects that were
/// not followed still carry a body worth decoding
const fn is_failure(status: StatusCode) -> bool {
    status.as_u16() < 200 || status.as_u16() >= 400
}

impl Client {
    /// Fetch `url` and decode the response body with `decoder`.
    ///
    /// The request carries `Accept: application/json` as a default; the
    /// decoder alone determines how the body is read. Error bodies are
    /// decoded into `E` with the same decoder.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Request`] if the URL is invalid, the request fails,
    ///   or the body cannot be read
    /// - [`FetchError::Remote`] if the status is a failure and the body
    ///   decodes into `E`
    /// - [`FetchError::Status`] if the status is a failure and it does not
    /// - [`FetchError::Decode`] if the status is a success but the body does
    ///   not decode into `T`
    pub async fn get_model<T, E, D>(&self, url: &str, decoder: D) -> Result<T, FetchError<E>>
    where
        T: DeserializeOwned,
        E: DeserializeOwned,
        D: Decoder,
    {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let request = self.get_request(parse_url(url)?, headers)?;

        let response = self.send(request).await?;
        let status = response.status();

        // `bytes` consumes the response, so the body is released on every path
        if is_failure(status) {
            let error = match response.bytes().await {
                Ok(body) => decoder.decode::<E>(&body).ok(),
                Err(e) => {
                    log::debug!("Cannot read error body of {url}: {e}");
                    None
                }
            };
            return Err(match error {
                Some(error) => FetchError::Remote { status, error },
                None => FetchError::Status(status),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(ErrorKind::ReadResponseBody)?;
        decoder
            .decode(&body)
            .map_err(|source| FetchError::Decode { status, source })
    }

    /// Fetch `url` and decode a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Client::get_model`].
    pub async fn get_json<T, E>(&self, url: &str) -> Result<T, FetchError<E>>
    where
        T: DeserializeOwned,
        E: DeserializeOwned,
    {
        self.get_model(url, Json).await
    }

    /// Fetch `url` and decode an XML body.
    ///
    /// # Errors
    ///
    /// See [`Client::get_model`].
    pub async fn get_xml<T, E>(&self, url: &str) -> Result<T, FetchError<E>>
    where
        T: DeserializeOwned,
        E: DeserializeOwned,
    {
        self.get_model(url, Xml).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientBuilder;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Project {
        slug: String,
        title: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct ApiError {
        error: String,
        description: String,
    }

    impl fmt::Display for ApiError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.description)
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Metadata {
        versioning: Versioning,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Versioning {
        release: String,
    }

    async fn serve(status: u16, body: &str, content_type: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_body_raw(body.to_owned(), content_type))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn client() -> Client {
        ClientBuilder::default().client().unwrap()
    }

    #[tokio::test]
    async fn test_get_json() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/project/sodium"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "slug": "sodium",
                "title": "Sodium",
                "downloads": 1000
            })))
            .mount(&mock_server)
            .await;

        let project: Project = client()
            .get_json::<_, ApiError>(&format!("{}/v2/project/sodium", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(
            project,
            Project {
                slug: "sodium".into(),
                title: "Sodium".into()
            }
        );
    }

    #[tokio::test]
    async fn test_get_xml() {
        let mock_server = serve(
            200,
            "<metadata><versioning><release>0.9.2</release></versioning></metadata>",
            "application/xml",
        )
        .await;

        let metadata: Metadata = client()
            .get_xml::<_, NoErrorModel>(&mock_server.uri())
            .await
            .unwrap();
        assert_eq!(metadata.versioning.release, "0.9.2");
    }

    #[tokio::test]
    async fn test_remote_error() {
        let mock_server = serve(
            404,
            r#"{"error":"not_found","description":"not found"}"#,
            "application/json",
        )
        .await;

        let result = client()
            .get_json::<Project, ApiError>(&mock_server.uri())
            .await;
        let error = result.unwrap_err();
        let message = error.to_string();
        assert!(message.contains("404"), "{message}");
        assert!(message.contains("not found"), "{message}");
        assert_eq!(message, "HTTP status 404 - not found");
        assert!(matches!(
            error,
            FetchError::Remote { status, error: ApiError { ref error, .. } }
                if status == StatusCode::NOT_FOUND && error == "not_found"
        ));
    }

    #[tokio::test]
    async fn test_undecodable_error_body() {
        let mock_server = serve(500, "<html>Internal Server Error</html>", "text/html").await;

        let error = client()
            .get_json::<Project, ApiError>(&mock_server.uri())
            .await
            .unwrap_err();
        assert!(
            matches!(error, FetchError::Status(status) if status == StatusCode::INTERNAL_SERVER_ERROR)
        );
        assert_eq!(error.to_string(), "HTTP status 500");
    }

    #[tokio::test]
    async fn test_no_error_model() {
        let mock_server = serve(
            403,
            r#"{"error":"forbidden","description":"go away"}"#,
            "application/json",
        )
        .await;

        let error = client()
            .get_json::<Project, NoErrorModel>(&mock_server.uri())
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "HTTP status 403");
        assert_eq!(error.status(), Some(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn test_undecodable_success_body() {
        let mock_server = serve(200, r#"{"slug": 12}"#, "application/json").await;

        let error = client()
            .get_json::<Project, ApiError>(&mock_server.uri())
            .await
            .unwrap_err();
        assert!(matches!(error, FetchError::Decode { status, .. } if status == StatusCode::OK));
        assert!(error.to_string().starts_with("HTTP status 200 - "));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let error = client()
            .get_json::<Project, NoErrorModel>("modrinth project sodium")
            .await
            .unwrap_err();
        assert!(matches!(error, FetchError::Request(ErrorKind::UrlParse(..))));
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_is_failure() {
        assert!(!is_failure(StatusCode::OK));
        assert!(!is_failure(StatusCode::NO_CONTENT));
        assert!(!is_failure(StatusCode::NOT_MODIFIED));
        assert!(is_failure(StatusCode::CONTINUE));
        assert!(is_failure(StatusCode::BAD_REQUEST));
        assert!(is_failure(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[test]
    fn test_no_error_model_never_decodes() {
        let result: Result<NoErrorModel, _> = Json.decode(b"{}");
        assert!(result.is_err());
    }
}
