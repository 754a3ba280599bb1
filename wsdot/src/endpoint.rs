//! Endpoint accessors and the fetch function factory.
//!
//! An [`Endpoint`] binds one [`EndpointMeta`] to its API and cache strategy
//! and runs the request pipeline:
//!
//! 1. validate the input (no network I/O on failure)
//! 2. build the URL and append the access token
//! 3. retrieve the payload through the client's transport
//! 4. validate the payload, or classify it as an echoed service error
//!
//! Typed endpoints (`Endpoint<VesselIdInput, VesselBasic>`) are created with
//! [`define_endpoint`]. [`create_fetch_functions`] builds a name-indexed set
//! of [`DynEndpoint`]s for a whole group, driven only by descriptor shapes.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::{Span, debug, instrument, warn};
use url::Url;
use wsdot_define::{ApiMetadata, CacheStrategy, EndpointGroupMeta, EndpointMeta, Schema, Shape};

use crate::client::ApiClient;
use crate::error::{ConfigError, RequestError, ValidationError, ValidationStage};
use crate::schema::SchemaGate;
use crate::url_builder::{self, InputParams};

/// An endpoint whose input and output are plain JSON checked against the
/// descriptor's shapes.
pub type DynEndpoint = Endpoint<Value, Value>;

/// A validated input, ready for URL construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedInput {
    /// Canonical JSON of the validated input; used for cache keys.
    pub canonical: Value,
    /// Flattened URL parameters.
    pub params: InputParams,
}

/// A fetch accessor for one endpoint.
pub struct Endpoint<I, O> {
    api: Arc<ApiMetadata>,
    meta: Arc<EndpointMeta>,
    strategy: CacheStrategy,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> Clone for Endpoint<I, O> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            meta: Arc::clone(&self.meta),
            strategy: self.strategy,
            _types: PhantomData,
        }
    }
}

impl<I, O> fmt::Debug for Endpoint<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("api", &self.api.name)
            .field("function_name", &self.meta.function_name)
            .field("endpoint", &self.meta.endpoint)
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Creates a typed accessor for `function_name` in `group`.
///
/// ## Errors
///
/// - [`ConfigError::UnknownFunction`] if the group has no such endpoint
/// - [`ConfigError::Descriptor`] if the descriptor is invalid
/// - [`ConfigError::SchemaMismatch`] if `I`/`O` are not the descriptor's types
///
/// ## Examples
///
/// ```rust,ignore
/// let endpoint = define_endpoint::<VesselIdInput, VesselBasic>(
///     &api(),
///     &vessel_basics_group(),
///     "vesselBasicsByVesselId",
/// )?;
/// let vessel = endpoint.fetch(&client, Some(&VesselIdInput { vessel_id: 74 })).await?;
/// ```
pub fn define_endpoint<I: Schema, O: Schema>(
    api: &ApiMetadata,
    group: &EndpointGroupMeta,
    function_name: &str,
) -> Result<Endpoint<I, O>, ConfigError> {
    let meta = group
        .endpoint(function_name)
        .ok_or_else(|| ConfigError::UnknownFunction {
            group: group.name.clone(),
            name: function_name.to_string(),
        })?;
    Endpoint::new(api.clone(), group.cache_strategy, meta.clone())
}

impl<I: Schema, O: Schema> Endpoint<I, O> {
    /// Creates a typed accessor from a standalone descriptor.
    ///
    /// ## Errors
    ///
    /// As [`define_endpoint`], minus the lookup.
    pub fn new(api: ApiMetadata, strategy: CacheStrategy, meta: EndpointMeta) -> Result<Self, ConfigError> {
        meta.validate()?;
        if meta.input != I::shape() || meta.output != O::shape() {
            return Err(ConfigError::SchemaMismatch {
                function_name: meta.function_name,
            });
        }
        Ok(Self::unchecked(api, strategy, meta))
    }

    fn unchecked(api: ApiMetadata, strategy: CacheStrategy, meta: EndpointMeta) -> Self {
        Self {
            api: Arc::new(api),
            meta: Arc::new(meta),
            strategy,
            _types: PhantomData,
        }
    }

    /// The API this endpoint belongs to.
    pub fn api(&self) -> &ApiMetadata {
        &self.api
    }

    /// The descriptor.
    pub fn meta(&self) -> &EndpointMeta {
        &self.meta
    }

    /// Shorthand for the descriptor's function name.
    pub fn function_name(&self) -> &str {
        &self.meta.function_name
    }

    /// The group's cache strategy.
    pub fn cache_strategy(&self) -> CacheStrategy {
        self.strategy
    }

    /// Gate for this endpoint's input.
    pub fn input_schema(&self) -> SchemaGate<I> {
        SchemaGate::with_shape(self.meta.input.clone(), ValidationStage::Input)
    }

    /// Gate for this endpoint's output.
    pub fn output_schema(&self) -> SchemaGate<O> {
        SchemaGate::with_shape(self.meta.output.clone(), ValidationStage::Output)
    }

    /// Validates raw input JSON.
    ///
    /// `null` stands for an omitted input and is replaced by the shape's
    /// default, if it has one.
    ///
    /// ## Errors
    ///
    /// Returns [`ValidationError`] describing every problem found.
    pub fn prepare(&self, input: &Value) -> Result<PreparedInput, ValidationError> {
        let raw = match input {
            Value::Null => self.meta.input.default_value().unwrap_or(Value::Null),
            other => other.clone(),
        };
        let typed: I = self.input_schema().validate(&raw)?;
        let canonical = serde_json::to_value(&typed)
            .map_err(|e| ValidationError::single(ValidationStage::Input, "$", e.to_string()))?;
        let canonical = declared_fields_only(&self.meta.input, canonical);
        let params = InputParams::from_value(&self.meta.input, &canonical)?;
        Ok(PreparedInput { canonical, params })
    }

    /// Builds the request URL for prepared params, without the access token.
    ///
    /// ## Errors
    ///
    /// Returns a fatal [`ValidationError`] when a template token is missing.
    pub fn url(&self, client: &ApiClient, params: &InputParams) -> Result<Url, ValidationError> {
        url_builder::build(client.base_url(&self.api), &self.meta.endpoint, params)
    }

    /// Fetches with a typed input. `None` means "no parameters".
    ///
    /// ## Errors
    ///
    /// Returns a [`RequestError`] of exactly one kind.
    pub async fn fetch(&self, client: &ApiClient, input: Option<&I>) -> Result<O, RequestError> {
        let raw = match input {
            Some(input) => serde_json::to_value(input)
                .map_err(|e| ValidationError::single(ValidationStage::Input, "$", e.to_string()))?,
            None => Value::Null,
        };
        self.fetch_value(client, raw).await
    }

    /// Fetches with raw JSON input.
    ///
    /// ## Errors
    ///
    /// Returns a [`RequestError`] of exactly one kind.
    #[instrument(
        name = "wsdot_request",
        skip_all,
        fields(
            api = %self.api.name,
            endpoint = %self.meta.function_name,
            transport = client.transport().name(),
            http.url = tracing::field::Empty,
            otel.kind = "client",
            otel.status_code = tracing::field::Empty,
            error.kind = tracing::field::Empty,
        )
    )]
    pub async fn fetch_value(&self, client: &ApiClient, input: Value) -> Result<O, RequestError> {
        let result = self.execute(client, &input).await;
        let span = Span::current();
        match &result {
            Ok(_) => {
                span.record("otel.status_code", "OK");
            }
            Err(err) => {
                span.record("otel.status_code", "ERROR");
                span.record("error.kind", err.kind().to_string().as_str());
                warn!(error = %err, "request failed");
            }
        }
        result
    }

    async fn execute(&self, client: &ApiClient, input: &Value) -> Result<O, RequestError> {
        let prepared = self.prepare(input)?;
        let mut url = self.url(client, &prepared.params)?;
        Span::current().record("http.url", url.as_str());
        debug!(%url, "request url built");

        client.authorize(&mut url);
        let payload = client.transport().fetch(&url).await?;
        self.output_schema().parse(&payload)
    }
}

/// Drops object keys the input shape does not declare.
fn declared_fields_only(shape: &Shape, value: Value) -> Value {
    match (shape.inner(), value) {
        (Shape::Object(fields), Value::Object(map)) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| fields.iter().any(|field| &field.name == key))
                .collect(),
        ),
        (_, value) => value,
    }
}

impl DynEndpoint {
    /// Creates an untyped accessor driven by the descriptor's shapes.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError::Descriptor`] if the descriptor is invalid.
    pub fn dynamic(api: ApiMetadata, strategy: CacheStrategy, meta: EndpointMeta) -> Result<Self, ConfigError> {
        meta.validate()?;
        Ok(Self::unchecked(api, strategy, meta))
    }
}

/// Name-indexed fetch accessors for one API.
///
/// Keys are the generated `fetchX` names; lookups also accept the bare
/// function name.
#[derive(Debug, Clone)]
pub struct FetchFunctions {
    api: ApiMetadata,
    functions: BTreeMap<String, DynEndpoint>,
}

/// Creates the fetch accessors for every endpoint in `group`.
///
/// ## Errors
///
/// Returns [`ConfigError`] for an invalid descriptor or duplicate name.
///
/// ## Examples
///
/// ```rust,ignore
/// let functions = create_fetch_functions(&api(), &vessel_basics_group())?;
/// let vessels = functions
///     .get("fetchVesselBasics")
///     .ok_or("unknown function")?
///     .fetch_value(&client, Value::Null)
///     .await?;
/// ```
pub fn create_fetch_functions(api: &ApiMetadata, group: &EndpointGroupMeta) -> Result<FetchFunctions, ConfigError> {
    let mut functions = FetchFunctions {
        api: api.clone(),
        functions: BTreeMap::new(),
    };
    functions.extend(group)?;
    Ok(functions)
}

impl FetchFunctions {
    /// Adds another group of the same API.
    ///
    /// ## Errors
    ///
    /// Returns [`ConfigError`] for an invalid descriptor or a name already
    /// present.
    pub fn extend(&mut self, group: &EndpointGroupMeta) -> Result<(), ConfigError> {
        group.validate()?;
        for meta in &group.endpoints {
            let name = meta.fetch_name();
            if self.functions.contains_key(&name) {
                return Err(ConfigError::DuplicateFunction { name });
            }
            let endpoint = DynEndpoint::dynamic(self.api.clone(), group.cache_strategy, meta.clone())?;
            self.functions.insert(name, endpoint);
        }
        Ok(())
    }

    /// The API these functions call.
    pub fn api(&self) -> &ApiMetadata {
        &self.api
    }

    /// Looks up by `fetchX` name or bare function name.
    pub fn get(&self, name: &str) -> Option<&DynEndpoint> {
        self.functions.get(name).or_else(|| {
            self.functions
                .values()
                .find(|endpoint| endpoint.function_name() == name)
        })
    }

    /// Iterates `(fetchX name, accessor)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DynEndpoint)> {
        self.functions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of accessors.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns `true` when no accessors are registered.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, NetworkError};
    use crate::transport::{BoxFuture, Transport};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::Mutex;
    use tracing_test::traced_test;
    use wsdot_define::{Field, NoInput, Shape};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TerminalInput {
        #[serde(rename = "TerminalID")]
        terminal_id: i32,
    }

    impl Schema for TerminalInput {
        fn shape() -> Shape {
            Shape::object([Field::new("TerminalID", Shape::Integer)])
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Terminal {
        #[serde(rename = "TerminalID")]
        terminal_id: i32,
        #[serde(rename = "TerminalName")]
        terminal_name: String,
    }

    impl Schema for Terminal {
        fn shape() -> Shape {
            Shape::object([
                Field::new("TerminalID", Shape::Integer),
                Field::new("TerminalName", Shape::String),
            ])
        }
    }

    /// Returns a canned payload and records every URL requested.
    #[derive(Debug)]
    struct CannedTransport {
        payload: Result<Value, u16>,
        requests: Mutex<Vec<Url>>,
    }

    impl CannedTransport {
        fn new(payload: Result<Value, u16>) -> Arc<Self> {
            Arc::new(Self {
                payload,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Transport for CannedTransport {
        fn name(&self) -> &'static str {
            "canned"
        }

        fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Value, RequestError>> {
            self.requests.lock().unwrap().push(url.clone());
            let result = match &self.payload {
                Ok(value) => Ok(value.clone()),
                Err(status) => Err(NetworkError::HttpStatus {
                    status: *status,
                    message: "boom".to_string(),
                }
                .into()),
            };
            Box::pin(async move { result })
        }
    }

    fn api() -> ApiMetadata {
        ApiMetadata::new("wsf-terminals", "https://example.test/terminals/rest")
    }

    fn group() -> EndpointGroupMeta {
        EndpointGroupMeta {
            name: "terminalBasics".to_string(),
            cache_strategy: CacheStrategy::Static,
            documentation: String::new(),
            endpoints: vec![
                EndpointMeta::new::<NoInput, Vec<Terminal>>("terminalBasics", "/terminalBasics"),
                EndpointMeta::new::<TerminalInput, Terminal>(
                    "terminalBasicsByTerminalId",
                    "/terminalBasics/{TerminalID}",
                )
                .with_sample_params(json!({"TerminalID": 7})),
            ],
        }
    }

    fn client(transport: Arc<CannedTransport>) -> ApiClient {
        ApiClient::builder()
            .transport(transport)
            .access_token("token")
            .build()
            .unwrap()
    }

    fn by_id() -> Endpoint<TerminalInput, Terminal> {
        define_endpoint(&api(), &group(), "terminalBasicsByTerminalId").unwrap()
    }

    #[tokio::test]
    async fn typed_fetch_builds_url_and_parses() {
        let transport = CannedTransport::new(Ok(json!({"TerminalID": 7, "TerminalName": "Bainbridge"})));
        let terminal = by_id()
            .fetch(&client(transport.clone()), Some(&TerminalInput { terminal_id: 7 }))
            .await
            .unwrap();
        assert_eq!(terminal.terminal_name, "Bainbridge");
        assert_eq!(
            transport.requests.lock().unwrap()[0].as_str(),
            "https://example.test/terminals/rest/terminalBasics/7?apiaccesscode=token"
        );
    }

    #[tokio::test]
    async fn missing_path_field_never_reaches_transport() {
        let transport = CannedTransport::new(Ok(json!({})));
        let err = by_id()
            .fetch_value(&client(transport.clone()), json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(transport.count(), 0);
    }

    #[tokio::test]
    async fn omitted_input_defaults_for_parameterless_endpoints() {
        let transport = CannedTransport::new(Ok(json!([])));
        let endpoint: Endpoint<NoInput, Vec<Terminal>> =
            define_endpoint(&api(), &group(), "terminalBasics").unwrap();
        let terminals = endpoint.fetch(&client(transport.clone()), None).await.unwrap();
        assert!(terminals.is_empty());
        assert_eq!(transport.count(), 1);
    }

    #[tokio::test]
    async fn echoed_error_is_api_error() {
        let transport = CannedTransport::new(Ok(json!({"Message": "Invalid access code"})));
        let err = by_id()
            .fetch(&client(transport), Some(&TerminalInput { terminal_id: 7 }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ApiError);
    }

    #[tokio::test]
    async fn malformed_output_is_validation_error() {
        let transport = CannedTransport::new(Ok(json!({"TerminalID": "seven"})));
        let err = by_id()
            .fetch(&client(transport), Some(&TerminalInput { terminal_id: 7 }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn transport_failure_is_network_error() {
        let transport = CannedTransport::new(Err(500));
        let err = by_id()
            .fetch(&client(transport), Some(&TerminalInput { terminal_id: 7 }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkError);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    #[traced_test]
    async fn request_span_omits_access_token() {
        let transport = CannedTransport::new(Err(503));
        let _ = by_id()
            .fetch(&client(transport), Some(&TerminalInput { terminal_id: 7 }))
            .await;
        assert!(logs_contain("request failed"));
        assert!(logs_contain("terminalBasicsByTerminalId"));
        assert!(!logs_contain("apiaccesscode"));
    }

    #[test]
    fn mismatched_types_are_rejected() {
        let err = define_endpoint::<NoInput, Terminal>(&api(), &group(), "terminalBasicsByTerminalId")
            .unwrap_err();
        assert!(matches!(err, ConfigError::SchemaMismatch { .. }));
    }

    #[test]
    fn unknown_function_is_rejected() {
        let err = define_endpoint::<NoInput, Terminal>(&api(), &group(), "nope").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFunction { .. }));
    }

    #[test]
    fn prepare_canonicalizes_input() {
        let prepared = by_id().prepare(&json!({"TerminalID": 7.0, "Extra": true})).unwrap();
        assert_eq!(prepared.canonical, json!({"TerminalID": 7}));
        assert_eq!(prepared.params.len(), 1);
    }

    #[tokio::test]
    async fn dynamic_accessor_drops_undeclared_keys() {
        let transport = CannedTransport::new(Ok(json!({"TerminalID": 7, "TerminalName": "Bainbridge"})));
        let functions = create_fetch_functions(&api(), &group()).unwrap();
        let endpoint = functions.get("terminalBasicsByTerminalId").unwrap();

        let prepared = endpoint.prepare(&json!({"TerminalID": 7, "Extra": "x"})).unwrap();
        assert_eq!(prepared.canonical, json!({"TerminalID": 7}));
        assert_eq!(prepared, by_id().prepare(&json!({"TerminalID": 7})).unwrap());

        endpoint
            .fetch_value(&client(transport.clone()), json!({"TerminalID": 7, "Extra": "x"}))
            .await
            .unwrap();
        assert_eq!(
            transport.requests.lock().unwrap()[0].as_str(),
            "https://example.test/terminals/rest/terminalBasics/7?apiaccesscode=token"
        );
    }

    #[test]
    fn fetch_functions_index_by_both_names() {
        let functions = create_fetch_functions(&api(), &group()).unwrap();
        assert_eq!(functions.len(), 2);
        assert!(functions.get("fetchTerminalBasicsByTerminalId").is_some());
        assert!(functions.get("terminalBasics").is_some());
        assert_eq!(
            functions.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["fetchTerminalBasics", "fetchTerminalBasicsByTerminalId"]
        );
    }

    #[test]
    fn fetch_functions_reject_duplicates() {
        let mut functions = create_fetch_functions(&api(), &group()).unwrap();
        let err = functions.extend(&group()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateFunction { .. }));
    }

    #[tokio::test]
    async fn dynamic_accessor_validates_with_descriptor_shapes() {
        let transport = CannedTransport::new(Ok(json!({"TerminalID": 7})));
        let functions = create_fetch_functions(&api(), &group()).unwrap();
        let err = functions
            .get("fetchTerminalBasicsByTerminalId")
            .unwrap()
            .fetch_value(&client(transport), json!({"TerminalID": 7}))
            .await
            .unwrap_err();
        match err {
            RequestError::Validation(v) => assert_eq!(v.issues()[0].path, "$.TerminalName"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
