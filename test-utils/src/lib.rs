//! `test-utils` is used for testing `packfetch-lib`.
//! This crate does not depend on `packfetch-lib`, else we would get dependency cycles.
//! Macros are used instead, so that the importer is responsible for providing the dependencies
//! (`wiremock` and `http`).

/// Create a mock web server, which responds with a predefined status when
/// handling a matching request
#[macro_export]
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET")).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Create a mock web server whose every response reports an exhausted quota,
/// resetting the given number of seconds after the response
#[macro_export]
macro_rules! exhausted_mock_server {
    ($reset_secs:expr) => {
        $crate::mock_server!(
            http::StatusCode::OK,
            insert_header("x-ratelimit-remaining", "0"),
            insert_header("x-ratelimit-reset", $reset_secs.to_string())
        )
    };
}

/// Initialize logging for a test, showing output only for failing tests.
/// Calling it more than once is fine.
#[macro_export]
macro_rules! init_logging {
    () => {
        let _ = env_logger::builder().is_test(true).try_init();
    };
}
