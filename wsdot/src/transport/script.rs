//! Script-injection transport.
//!
//! Each call allocates a fresh callback name, asks a [`ScriptHost`] to load
//! the URL with that name appended, and waits for the host to report the
//! payload through the [`CallbackRegistry`]. Whatever the outcome (payload,
//! load failure, timeout, or the caller dropping the future), the slot is
//! released and the script removed before the call returns.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{BoxFuture, Transport};
use crate::error::{NetworkError, RequestError};

/// Prefix of every generated callback name.
pub const CALLBACK_PREFIX: &str = "__wsdot_cb_";

/// Query parameter carrying the callback name.
const DEFAULT_CALLBACK_PARAM: &str = "callback";

type Slot = oneshot::Sender<Result<Value, NetworkError>>;

/// Per-call callback slots.
///
/// Names are never reused within a process, so a late response for a
/// timed-out call cannot land in a newer call's slot.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    next_id: AtomicU64,
    slots: Mutex<HashMap<String, Slot>>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a new callback name.
    pub(crate) fn allocate(&self) -> (String, oneshot::Receiver<Result<Value, NetworkError>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = format!("{CALLBACK_PREFIX}{id}");
        let (tx, rx) = oneshot::channel();
        self.lock().insert(name.clone(), tx);
        (name, rx)
    }

    /// Delivers a payload to `callback`.
    ///
    /// Returns `false` if the slot no longer exists (the call already
    /// finished or timed out); the payload is discarded.
    pub fn resolve(&self, callback: &str, payload: Value) -> bool {
        self.complete(callback, Ok(payload))
    }

    /// Fails the call waiting on `callback`.
    pub fn reject(&self, callback: &str, error: NetworkError) -> bool {
        self.complete(callback, Err(error))
    }

    /// Drops the slot for `callback` without completing it.
    pub fn release(&self, callback: &str) -> bool {
        self.lock().remove(callback).is_some()
    }

    /// Returns `true` while `callback` is awaiting a payload.
    pub fn is_pending(&self, callback: &str) -> bool {
        self.lock().contains_key(callback)
    }

    /// Number of calls awaiting a payload.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn complete(&self, callback: &str, outcome: Result<Value, NetworkError>) -> bool {
        match self.lock().remove(callback) {
            Some(slot) => slot.send(outcome).is_ok(),
            None => {
                debug!(callback, "late callback ignored");
                false
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to an injected script, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptElement(pub u64);

/// The environment that actually loads scripts.
///
/// In a browser this appends a `<script>` element; [`super::HttpScriptHost`]
/// emulates one over HTTP.
pub trait ScriptHost: Send + Sync + fmt::Debug {
    /// Starts loading `src`. When the script runs it must call
    /// [`CallbackRegistry::resolve`] with `callback`; a load failure should
    /// call [`CallbackRegistry::reject`].
    fn inject(&self, src: &Url, callback: &str, registry: Arc<CallbackRegistry>) -> ScriptElement;

    /// Removes a previously injected script. Called exactly once per
    /// [`ScriptHost::inject`].
    fn remove(&self, element: ScriptElement);
}

/// Fetches payloads by script injection.
#[derive(Debug, Clone)]
pub struct ScriptTransport {
    host: Arc<dyn ScriptHost>,
    registry: Arc<CallbackRegistry>,
    timeout: Duration,
    callback_param: String,
}

impl ScriptTransport {
    /// Creates a transport over `host` with its own registry.
    pub fn new(host: Arc<dyn ScriptHost>, timeout: Duration) -> Self {
        Self {
            host,
            registry: Arc::new(CallbackRegistry::new()),
            timeout,
            callback_param: DEFAULT_CALLBACK_PARAM.to_string(),
        }
    }

    /// Overrides the query parameter that carries the callback name.
    pub fn with_callback_param(mut self, name: impl Into<String>) -> Self {
        self.callback_param = name.into();
        self
    }

    /// The registry shared with the host.
    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    #[instrument(
        name = "transport_fetch",
        skip(self, url),
        fields(transport = "script", http.url = %super::redacted(url), callback = tracing::field::Empty)
    )]
    async fn call(&self, url: &Url) -> Result<Value, RequestError> {
        let (callback, receiver) = self.registry.allocate();
        tracing::Span::current().record("callback", callback.as_str());

        let mut src = url.clone();
        src.query_pairs_mut().append_pair(&self.callback_param, &callback);

        let element = self.host.inject(&src, &callback, Arc::clone(&self.registry));
        let _injected = Injected {
            host: self.host.as_ref(),
            registry: &self.registry,
            callback: &callback,
            element,
        };

        match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(err))) => Err(err.into()),
            Ok(Err(_)) => Err(NetworkError::ScriptLoad {
                callback: callback.clone(),
                message: "callback slot released".to_string(),
            }
            .into()),
            Err(_) => {
                let duration_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(timeout_ms = duration_ms, "callback not invoked");
                Err(NetworkError::CallbackTimeout {
                    callback: callback.clone(),
                    duration_ms,
                }
                .into())
            }
        }
    }
}

impl Transport for ScriptTransport {
    fn name(&self) -> &'static str {
        "script"
    }

    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<Value, RequestError>> {
        Box::pin(self.call(url))
    }
}

/// Releases the slot and removes the script when a call ends.
struct Injected<'a> {
    host: &'a dyn ScriptHost,
    registry: &'a CallbackRegistry,
    callback: &'a str,
    element: ScriptElement,
}

impl Drop for Injected<'_> {
    fn drop(&mut self) {
        self.registry.release(self.callback);
        self.host.remove(self.element);
    }
}
