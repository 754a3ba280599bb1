//! Plain HTTP transport.

use std::time::Duration;

use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::{Span, debug, instrument, warn};
use url::Url;

use super::{BoxFuture, Transport};
use crate::error::{NetworkError, RequestError};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Fetches payloads with an HTTP GET.
#[derive(Debug, Clone)]
pub struct DirectTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl DirectTransport {
    /// Creates a transport with its own connection pool.
    ///
    /// ## Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self::with_client(client, timeout))
    }

    /// Wraps an existing client. `timeout` is only used for error reporting;
    /// the client's own timeout applies.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    #[instrument(
        name = "transport_fetch",
        skip(self, url),
        fields(
            transport = "direct",
            http.url = %super::redacted(url),
            http.status_code = tracing::field::Empty,
        )
    )]
    async fn get(&self, url: &Url) -> Result<Value, RequestError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        Span::current().record("http.status_code", status.as_u16());

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            warn!(status = status.as_u16(), "non-success response");
            return Err(NetworkError::HttpStatus {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        debug!(bytes = body.len(), "response received");
        let body = body.strip_prefix(UTF8_BOM).unwrap_or(&body[..]);

        serde_json::from_slice(body).map_err(|e| {
            NetworkError::MalformedBody {
                message: e.to_string(),
            }
            .into()
        })
    }

    fn classify(&self, err: reqwest::Error) -> NetworkError {
        if err.is_timeout() {
            NetworkError::Timeout {
                duration_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            NetworkError::Request(err.without_url())
        }
    }
}

impl Transport for DirectTransport {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Value, RequestError>> {
        Box::pin(self.get(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use tracing_test::traced_test;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> DirectTransport {
        DirectTransport::new(Duration::from_secs(5)).unwrap()
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{p}", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn returns_parsed_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vesselBasics"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"VesselID": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let value = transport().fetch(&url(&server, "/vesselBasics")).await.unwrap();
        assert_eq!(value, json!([{"VesselID": 1}]));
    }

    #[tokio::test]
    async fn strips_byte_order_mark() {
        let server = MockServer::start().await;
        let mut body = UTF8_BOM.to_vec();
        body.extend_from_slice(br#"{"ok":true}"#);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
            .mount(&server)
            .await;

        let value = transport().fetch(&url(&server, "/x")).await.unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn non_success_status_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = transport().fetch(&url(&server, "/x")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkError);
        assert_eq!(err.to_string(), "HTTP 503: maintenance");
    }

    #[tokio::test]
    async fn malformed_body_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = transport().fetch(&url(&server, "/x")).await.unwrap_err();
        assert!(matches!(
            err,
            RequestError::Network(NetworkError::MalformedBody { .. })
        ));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let transport = DirectTransport::new(Duration::from_millis(50)).unwrap();
        let err = transport.fetch(&url(&server, "/x")).await.unwrap_err();
        assert!(matches!(
            err,
            RequestError::Network(NetworkError::Timeout { duration_ms: 50 })
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    #[traced_test]
    async fn access_token_stays_out_of_logs_and_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = transport()
            .fetch(&url(&server, "/x?apiaccesscode=SECRET123"))
            .await
            .unwrap_err();
        assert!(!err.to_string().contains("SECRET123"));

        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let refused = Url::parse(&format!("http://127.0.0.1:{port}/x?apiaccesscode=SECRET123")).unwrap();
        let err = transport().fetch(&refused).await.unwrap_err();
        assert!(matches!(err, RequestError::Network(NetworkError::Request(_))));
        assert!(!err.to_string().contains("SECRET123"));

        assert!(logs_contain("non-success response"));
        assert!(!logs_contain("SECRET123"));
    }
}
