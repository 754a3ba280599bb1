//! A [`ScriptHost`] that loads scripts over HTTP.
//!
//! Outside a browser there is no script engine to run the response, but the
//! services' callback responses have a fixed form, `name(payload);`, so the
//! host downloads the script and performs the call itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::header::ACCEPT;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use super::script::{CallbackRegistry, ScriptElement, ScriptHost};
use crate::error::NetworkError;

/// Loads injected scripts with `reqwest` and invokes their callback.
#[derive(Debug, Default)]
pub struct HttpScriptHost {
    client: reqwest::Client,
    next_element: AtomicU64,
    loading: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl HttpScriptHost {
    /// Creates a host using `client` for script downloads.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            next_element: AtomicU64::new(0),
            loading: Mutex::new(HashMap::new()),
        }
    }
}

impl ScriptHost for HttpScriptHost {
    fn inject(&self, src: &Url, callback: &str, registry: Arc<CallbackRegistry>) -> ScriptElement {
        let id = self.next_element.fetch_add(1, Ordering::Relaxed);
        let client = self.client.clone();
        let src = src.clone();
        let callback = callback.to_string();

        let task = tokio::spawn(async move {
            match load(&client, &src).await {
                Ok(script) => match unwrap_callback(&script, &callback) {
                    Some(Ok(payload)) => {
                        registry.resolve(&callback, payload);
                    }
                    Some(Err(e)) => {
                        registry.reject(
                            &callback,
                            NetworkError::MalformedBody {
                                message: e.to_string(),
                            },
                        );
                    }
                    // The script ran but never called us; the transport's
                    // timeout reports it.
                    None => debug!(%callback, "script did not invoke callback"),
                },
                Err(message) => {
                    warn!(%callback, %message, "script failed to load");
                    registry.reject(
                        &callback,
                        NetworkError::ScriptLoad {
                            callback: callback.clone(),
                            message,
                        },
                    );
                }
            }
        });

        self.loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, task);
        ScriptElement(id)
    }

    fn remove(&self, element: ScriptElement) {
        let task = self
            .loading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&element.0);
        if let Some(task) = task {
            task.abort();
        }
    }
}

async fn load(client: &reqwest::Client, src: &Url) -> Result<String, String> {
    let response = client
        .get(src.clone())
        .header(ACCEPT, "application/javascript, text/javascript")
        .send()
        .await
        .map_err(|e| e.without_url().to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status.as_u16()));
    }
    response.text().await.map_err(|e| e.without_url().to_string())
}

/// Extracts the payload from a `callback(payload);` script.
///
/// Returns `None` when the script does not call `callback`.
///
/// ## Examples
///
/// ```
/// use serde_json::json;
/// use wsdot::transport::unwrap_callback;
///
/// let payload = unwrap_callback("__wsdot_cb_3([1,2]);", "__wsdot_cb_3").unwrap().unwrap();
/// assert_eq!(payload, json!([1, 2]));
/// assert!(unwrap_callback("other([1]);", "__wsdot_cb_3").is_none());
/// ```
pub fn unwrap_callback(script: &str, callback: &str) -> Option<Result<Value, serde_json::Error>> {
    let body = script.trim().trim_start_matches("/**/").trim_start();
    let args = body.strip_prefix(callback)?.trim_start().strip_prefix('(')?;
    let args = args.trim_end().trim_end_matches(';').trim_end().strip_suffix(')')?;
    Some(serde_json::from_str(args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ScriptTransport, Transport};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use tracing_test::traced_test;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn unwraps_with_whitespace_and_comment_prefix() {
        let script = "/**/ cb_1 ( {\"a\": 1} ) ;\n";
        assert_eq!(unwrap_callback(script, "cb_1").unwrap().unwrap(), json!({"a": 1}));
    }

    #[test]
    fn bad_payload_is_an_error() {
        assert!(unwrap_callback("cb_1({oops});", "cb_1").unwrap().is_err());
    }

    fn transport(timeout: Duration) -> ScriptTransport {
        let host = Arc::new(HttpScriptHost::new(reqwest::Client::new()));
        ScriptTransport::new(host, timeout)
    }

    #[tokio::test]
    async fn loads_script_and_resolves() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vesselBasics"))
            .and(query_param("callback", "__wsdot_cb_0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("__wsdot_cb_0([{\"VesselID\":1}]);"),
            )
            .mount(&server)
            .await;

        let transport = transport(Duration::from_secs(2));
        let url = Url::parse(&format!("{}/vesselBasics", server.uri())).unwrap();
        let value = transport.fetch(&url).await.unwrap();
        assert_eq!(value, json!([{"VesselID": 1}]));
        assert_eq!(transport.registry().pending(), 0);
    }

    #[tokio::test]
    async fn http_failure_rejects_callback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let transport = transport(Duration::from_secs(2));
        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let err = transport.fetch(&url).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::RequestError::Network(NetworkError::ScriptLoad { .. })
        ));
    }

    #[tokio::test]
    async fn silent_script_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("console.log('hi');"))
            .mount(&server)
            .await;

        let transport = transport(Duration::from_millis(200));
        let url = Url::parse(&format!("{}/quiet", server.uri())).unwrap();
        let err = transport.fetch(&url).await.unwrap_err();
        assert!(err.to_string().starts_with("Callback __wsdot_cb_0 not invoked"));
        assert_eq!(transport.registry().pending(), 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn access_token_stays_out_of_logs_and_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("console.log('hi');"))
            .mount(&server)
            .await;

        let transport = transport(Duration::from_millis(100));
        let url = Url::parse(&format!("{}/quiet?apiaccesscode=SECRET123", server.uri())).unwrap();
        let err = transport.fetch(&url).await.unwrap_err();
        assert!(!err.to_string().contains("SECRET123"));

        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let refused = Url::parse(&format!("http://127.0.0.1:{port}/x?apiaccesscode=SECRET123")).unwrap();
        let err = transport.fetch(&refused).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::RequestError::Network(NetworkError::ScriptLoad { .. })
        ));
        assert!(!err.to_string().contains("SECRET123"));

        assert!(logs_contain("callback not invoked"));
        assert!(!logs_contain("SECRET123"));
    }
}
