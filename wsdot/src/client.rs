//! Client configuration and construction.
//!
//! An [`ApiClient`] bundles everything a request needs besides the endpoint
//! itself: the transport, the access token, and per-API base URL overrides.
//! It is cheap to clone and shared by fetch functions and hooks.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use url::Url;
use wsdot_define::ApiMetadata;

use crate::error::ConfigError;
use crate::transport::{
    DirectTransport, HttpScriptHost, ScriptTransport, Transport, TransportKind,
};

/// Environment variable holding the access token.
pub const ACCESS_TOKEN_ENV: &str = "WSDOT_ACCESS_TOKEN";

/// Environment variable selecting the transport (`direct` or `script`).
pub const TRANSPORT_ENV: &str = "WSDOT_TRANSPORT";

/// Default HTTP request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default wait for a script callback in seconds.
const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 10;

/// Query parameter the services read the access token from.
const DEFAULT_ACCESS_TOKEN_PARAM: &str = "apiaccesscode";

/// Settings used to build an [`ApiClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// HTTP request timeout.
    pub timeout: Duration,
    /// How long a script-injection call waits for its callback.
    pub callback_timeout: Duration,
    /// Which built-in transport to use.
    pub transport: TransportKind,
    /// Access token appended to every request URL.
    pub access_token: Option<String>,
    /// Query parameter carrying the access token.
    pub access_token_param: String,
    /// Base URL overrides keyed by API name.
    pub base_url_overrides: HashMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            callback_timeout: Duration::from_secs(DEFAULT_CALLBACK_TIMEOUT_SECS),
            transport: TransportKind::default(),
            access_token: None,
            access_token_param: DEFAULT_ACCESS_TOKEN_PARAM.to_string(),
            base_url_overrides: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Reads [`ACCESS_TOKEN_ENV`] and [`TRANSPORT_ENV`] from the process
    /// environment.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError::UnknownTransport`] for an unrecognized transport.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ClientConfig::from_env`], reading variables through `lookup`.
    ///
    /// Empty values count as unset.
    ///
    /// ## Examples
    ///
    /// ```
    /// use wsdot::client::ClientConfig;
    /// use wsdot::transport::TransportKind;
    ///
    /// let config = ClientConfig::from_lookup(|key| match key {
    ///     "WSDOT_ACCESS_TOKEN" => Some("secret".to_string()),
    ///     "WSDOT_TRANSPORT" => Some("script".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(config.access_token.as_deref(), Some("secret"));
    /// assert_eq!(config.transport, TransportKind::Script);
    /// ```
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError::UnknownTransport`] for an unrecognized transport.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let transport = match read(TRANSPORT_ENV) {
            Some(value) => TransportKind::from_str(&value)
                .map_err(|_| ConfigError::UnknownTransport { value })?,
            None => TransportKind::default(),
        };
        Ok(Self {
            access_token: read(ACCESS_TOKEN_ENV),
            transport,
            ..Self::default()
        })
    }
}

/// Builder for an [`ApiClient`].
#[derive(Debug, Default)]
pub struct ApiClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl ApiClientBuilder {
    /// Starts from an existing configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    /// Sets the HTTP request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets how long a script-injection call waits for its callback.
    pub fn callback_timeout(mut self, timeout: Duration) -> Self {
        self.config.callback_timeout = timeout;
        self
    }

    /// Selects a built-in transport.
    pub fn transport_kind(mut self, kind: TransportKind) -> Self {
        self.config.transport = kind;
        self
    }

    /// Uses a custom transport instead of a built-in one.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the access token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = Some(token.into());
        self
    }

    /// Sets the query parameter carrying the access token.
    pub fn access_token_param(mut self, name: impl Into<String>) -> Self {
        self.config.access_token_param = name.into();
        self
    }

    /// Sends requests for `api_name` to `base_url` instead of the API's own.
    ///
    /// ## Examples
    ///
    /// ```rust,ignore
    /// let client = ApiClient::builder()
    ///     .base_url_override("wsf-vessels", mock_server.uri())
    ///     .build()?;
    /// ```
    pub fn base_url_override(mut self, api_name: impl Into<String>, base_url: impl Into<String>) -> Self {
        self.config
            .base_url_overrides
            .insert(api_name.into(), base_url.into());
        self
    }

    /// Builds the client.
    ///
    /// ## Errors
    ///
    /// Returns an error if an override is not a valid URL or the HTTP client
    /// cannot be constructed.
    pub fn build(self) -> Result<ApiClient, ConfigError> {
        for url in self.config.base_url_overrides.values() {
            Url::parse(url)?;
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => build_transport(&self.config)?,
        };

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                config: self.config,
                transport,
            }),
        })
    }
}

fn build_transport(config: &ClientConfig) -> Result<Arc<dyn Transport>, ConfigError> {
    let transport: Arc<dyn Transport> = match config.transport {
        TransportKind::Direct => Arc::new(DirectTransport::new(config.timeout)?),
        TransportKind::Script => {
            let http = reqwest::Client::builder().timeout(config.timeout).build()?;
            let host = Arc::new(HttpScriptHost::new(http));
            Arc::new(ScriptTransport::new(host, config.callback_timeout))
        }
    };
    Ok(transport)
}

#[derive(Debug)]
struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

/// Shared request context for fetch functions and hooks.
///
/// ## Examples
///
/// ```
/// use wsdot::ApiClient;
///
/// let client = ApiClient::builder().access_token("secret").build().unwrap();
/// assert_eq!(client.transport().name(), "direct");
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Creates a builder with default settings.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Creates a client with default settings.
    ///
    /// ## Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Creates a client configured from the environment.
    ///
    /// ## Errors
    ///
    /// Returns an error for an unknown transport or if the HTTP client cannot
    /// be constructed.
    pub fn from_env() -> Result<Self, ConfigError> {
        ApiClientBuilder::from_config(ClientConfig::from_env()?).build()
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The transport used for every request.
    pub fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    /// Base URL for `api`, honoring overrides.
    pub fn base_url<'a>(&'a self, api: &'a ApiMetadata) -> &'a str {
        self.inner
            .config
            .base_url_overrides
            .get(&api.name)
            .map_or(api.base_url.as_str(), String::as_str)
    }

    /// Appends the access token, if any, to a built request URL.
    ///
    /// Applied after URL construction so the token never becomes part of a
    /// cache key.
    pub fn authorize(&self, url: &mut Url) {
        if let Some(token) = &self.inner.config.access_token {
            url.query_pairs_mut()
                .append_pair(&self.inner.config.access_token_param, token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.callback_timeout, Duration::from_secs(10));
        assert_eq!(config.transport, TransportKind::Direct);
        assert_eq!(config.access_token_param, "apiaccesscode");
    }

    #[test]
    fn empty_values_are_unset() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("WSDOT_ACCESS_TOKEN", "  "),
            ("WSDOT_TRANSPORT", ""),
        ]))
        .unwrap();
        assert_eq!(config.access_token, None);
        assert_eq!(config.transport, TransportKind::Direct);
    }

    #[test]
    fn transport_name_is_case_insensitive() {
        let config = ClientConfig::from_lookup(lookup(&[("WSDOT_TRANSPORT", "Script")])).unwrap();
        assert_eq!(config.transport, TransportKind::Script);
    }

    #[test]
    fn unknown_transport_is_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[("WSDOT_TRANSPORT", "pigeon")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTransport { value } if value == "pigeon"));
    }

    #[test]
    fn authorize_appends_token() {
        let client = ApiClient::builder().access_token("abc").build().unwrap();
        let mut url = Url::parse("https://example.test/rest/vessels?Id=1").unwrap();
        client.authorize(&mut url);
        assert_eq!(url.as_str(), "https://example.test/rest/vessels?Id=1&apiaccesscode=abc");
    }

    #[test]
    fn authorize_without_token_is_noop() {
        let client = ApiClient::new().unwrap();
        let mut url = Url::parse("https://example.test/rest/vessels").unwrap();
        client.authorize(&mut url);
        assert_eq!(url.query(), None);
    }

    #[test]
    fn base_url_override_wins() {
        let api = ApiMetadata::new("wsf-vessels", "https://example.test/rest");
        let client = ApiClient::builder()
            .base_url_override("wsf-vessels", "http://127.0.0.1:9999")
            .build()
            .unwrap();
        assert_eq!(client.base_url(&api), "http://127.0.0.1:9999");

        let other = ApiMetadata::new("wsf-terminals", "https://example.test/terminals");
        assert_eq!(client.base_url(&other), "https://example.test/terminals");
    }

    #[test]
    fn invalid_override_is_rejected() {
        let err = ApiClient::builder()
            .base_url_override("wsf-vessels", "not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));
    }

    #[test]
    fn script_transport_is_selectable() {
        let client = ApiClient::builder()
            .transport_kind(TransportKind::Script)
            .build()
            .unwrap();
        assert_eq!(client.transport().name(), "script");
    }
}
