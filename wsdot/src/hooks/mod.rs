//! Cache-aware query hooks.
//!
//! A [`Hook`] pairs an [`Endpoint`] with a [`QueryCache`]. Calling
//! [`Hook::use_query`] returns a [`QueryHandle`] observing the cache entry
//! for `(api, function, input)`: the first observer triggers a fetch, later
//! observers of the same key share its result, and stale data is refetched
//! when observed.
//!
//! Staleness follows the group's [`CacheStrategy`]:
//!
//! | Strategy   | Stale when                                  |
//! |------------|---------------------------------------------|
//! | `STATIC`   | the API's cache flush date changes          |
//! | `REALTIME` | older than [`REALTIME_STALE_TIME`]          |
//!
//! Hooks never retry on their own; a failed fetch leaves the entry in
//! [`QueryStatus::Error`] until the next refetch. A retryable failure
//! (see [`RequestError::is_retryable`]) counts as stale, so the next observer
//! refetches it.
//!
//! Entries no handle observes are evicted after [`GC_TIME`].
//!
//! ## Examples
//!
//! ```rust,ignore
//! let cache = QueryCache::new();
//! let hook = endpoint.hook(&client, &cache);
//! let mut handle = hook.use_query(Some(VesselIdInput { vessel_id: 74 }), QueryOptions::default());
//! let result = handle.settled().await;
//! if let Some(vessel) = result.data {
//!     println!("{}", vessel.vessel_name);
//! }
//! ```

mod cache;
mod flush;
mod key;
mod strategy;

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::watch;
use wsdot_define::{ApiMetadata, CacheStrategy, EndpointGroupMeta, Schema};

use crate::client::ApiClient;
use crate::endpoint::{DynEndpoint, Endpoint};
use crate::error::{ConfigError, RequestError, ValidationError, ValidationStage};
use crate::transport::BoxFuture;

pub use cache::{QueryCache, QueryStatus};
pub use flush::{CACHE_FLUSH_FUNCTION, flush_endpoint};
pub use key::QueryKey;
pub use strategy::{CachePolicy, FLUSH_POLL_INTERVAL, GC_TIME, REALTIME_STALE_TIME};

use cache::{Entry, Fetcher, QueryData, Snapshot};

/// Per-call hook options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// When `false`, nothing is fetched until [`QueryHandle::refetch`].
    pub enabled: bool,
    /// Overrides the strategy's stale time.
    pub stale_time: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_time: None,
        }
    }
}

/// A point-in-time view of a query.
#[derive(Debug)]
pub struct QueryResult<O> {
    /// Lifecycle state.
    pub status: QueryStatus,
    /// Latest successful payload; kept while refetching or after an error.
    pub data: Option<Arc<O>>,
    /// Error from the latest fetch, if it failed.
    pub error: Option<Arc<RequestError>>,
    /// Whether the data is due for a refetch.
    pub is_stale: bool,
    /// When the latest fetch finished.
    pub updated_at: Option<Instant>,
}

impl<O> Clone for QueryResult<O> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_stale: self.is_stale,
            updated_at: self.updated_at,
        }
    }
}

impl<O> QueryResult<O> {
    /// Returns `true` while a fetch is running.
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    /// Returns `true` after a successful fetch.
    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    /// Returns `true` after a failed fetch.
    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

/// A subscription to one cache entry.
///
/// Dropping the handle unsubscribes; the entry stays cached.
pub struct QueryHandle<O> {
    entry: Arc<Entry>,
    receiver: watch::Receiver<Snapshot>,
    policy: CachePolicy,
    enabled: bool,
    _type: PhantomData<fn() -> O>,
}

impl<O> fmt::Debug for QueryHandle<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHandle")
            .field("key", self.entry.key())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl<O: Send + Sync + 'static> QueryHandle<O> {
    fn new(entry: Arc<Entry>, policy: CachePolicy, enabled: bool) -> Self {
        entry.add_observer();
        let receiver = entry.subscribe();
        let handle = Self {
            entry,
            receiver,
            policy,
            enabled,
            _type: PhantomData,
        };
        handle.observe();
        handle
    }

    /// The cache key this handle observes.
    pub fn key(&self) -> &QueryKey {
        self.entry.key()
    }

    /// The current state, without side effects.
    pub fn result(&self) -> QueryResult<O> {
        self.to_result(&self.receiver.borrow())
    }

    /// The current state, refetching first if the data is missing or stale.
    pub fn observe(&self) -> QueryResult<O> {
        if self.enabled {
            let snapshot = self.receiver.borrow().clone();
            let needs_fetch = match snapshot.status {
                QueryStatus::Idle => true,
                QueryStatus::Loading => false,
                QueryStatus::Success => self.is_stale(&snapshot),
                QueryStatus::Error => {
                    self.is_stale(&snapshot)
                        || snapshot.error.as_ref().is_some_and(|err| err.is_retryable())
                }
            };
            if needs_fetch {
                self.entry.fetch();
            }
        }
        self.result()
    }

    /// Starts a fetch now, even if the data is fresh or the handle is
    /// disabled.
    pub fn refetch(&self) {
        self.entry.fetch();
    }

    /// Waits for the next state change and returns the new state.
    ///
    /// Returns the current state immediately if a change happened since the
    /// handle last looked.
    pub async fn changed(&mut self) -> QueryResult<O> {
        // The sender lives in the entry, which this handle keeps alive.
        let _ = self.receiver.changed().await;
        let snapshot = self.receiver.borrow_and_update().clone();
        self.to_result(&snapshot)
    }

    /// Waits until no fetch is running and the query has succeeded or
    /// failed, then returns that state.
    ///
    /// A disabled handle that was never fetched waits until
    /// [`QueryHandle::refetch`] is called.
    pub async fn settled(&mut self) -> QueryResult<O> {
        loop {
            let snapshot = self.receiver.borrow_and_update().clone();
            if matches!(snapshot.status, QueryStatus::Success | QueryStatus::Error) {
                return self.to_result(&snapshot);
            }
            if self.receiver.changed().await.is_err() {
                return self.result();
            }
        }
    }

    fn is_stale(&self, snapshot: &Snapshot) -> bool {
        snapshot.invalidated
            || snapshot
                .updated_at
                .is_some_and(|at| self.policy.is_stale(at, Instant::now()))
    }

    fn to_result(&self, snapshot: &Snapshot) -> QueryResult<O> {
        QueryResult {
            status: snapshot.status,
            data: snapshot.data.clone().and_then(downcast::<O>),
            error: snapshot.error.clone(),
            is_stale: self.is_stale(snapshot),
            updated_at: snapshot.updated_at,
        }
    }
}

impl<O> Drop for QueryHandle<O> {
    fn drop(&mut self) {
        self.entry.remove_observer();
    }
}

fn downcast<O: Send + Sync + 'static>(data: QueryData) -> Option<Arc<O>> {
    match data.downcast::<O>() {
        Ok(data) => Some(data),
        Err(_) => {
            tracing::warn!(
                expected = std::any::type_name::<O>(),
                "cached payload has a different type"
            );
            None
        }
    }
}

/// A cache-aware accessor for one endpoint.
pub struct Hook<I, O> {
    endpoint: Endpoint<I, O>,
    client: ApiClient,
    cache: QueryCache,
    policy: CachePolicy,
}

impl<I, O> Clone for Hook<I, O> {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            client: self.client.clone(),
            cache: self.cache.clone(),
            policy: self.policy,
        }
    }
}

impl<I, O> fmt::Debug for Hook<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("endpoint", &self.endpoint)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<I: Schema, O: Schema> Endpoint<I, O> {
    /// Creates a hook for this endpoint.
    ///
    /// For `STATIC` endpoints this also starts the API's flush-date watcher,
    /// once per cache.
    pub fn hook(&self, client: &ApiClient, cache: &QueryCache) -> Hook<I, O> {
        let policy = CachePolicy::for_strategy(self.cache_strategy());
        if policy.follows_flush_date {
            cache.ensure_flush_watcher(client, self.api());
        }
        Hook {
            endpoint: self.clone(),
            client: client.clone(),
            cache: cache.clone(),
            policy,
        }
    }
}

impl<I: Schema, O: Schema> Hook<I, O> {
    /// The underlying endpoint.
    pub fn endpoint(&self) -> &Endpoint<I, O> {
        &self.endpoint
    }

    /// The policy applied to this hook's entries.
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Observes the query for a typed input. `None` means "no parameters".
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// An input that fails to serialize yields a handle already in
    /// [`QueryStatus::Error`] with an input [`ValidationError`]. That handle
    /// is not shared through the cache.
    pub fn use_query(&self, input: Option<I>, options: QueryOptions) -> QueryHandle<O> {
        match input.map(|i| serde_json::to_value(&i)).transpose() {
            Ok(raw) => self.use_query_value(raw.unwrap_or(Value::Null), options),
            Err(err) => self.unserializable(err.to_string(), options),
        }
    }

    /// Observes the query for raw JSON input.
    ///
    /// Inputs are validated before the key is derived, so inputs that
    /// validate to the same value share an entry. Invalid inputs get their
    /// own entry, which settles in [`QueryStatus::Error`] without any
    /// network I/O.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn use_query_value(&self, input: Value, options: QueryOptions) -> QueryHandle<O> {
        let key_input = match self.endpoint.prepare(&input) {
            Ok(prepared) => prepared.canonical,
            Err(_) => input.clone(),
        };
        let key = QueryKey::new(&self.endpoint.api().name, self.endpoint.function_name(), &key_input);

        let entry = self.cache.entry(key, self.endpoint.cache_strategy(), || {
            self.fetcher(input)
        });

        QueryHandle::new(entry, self.policy_with(options), options.enabled)
    }

    fn unserializable(&self, message: String, options: QueryOptions) -> QueryHandle<O> {
        tracing::warn!(
            endpoint = self.endpoint.function_name(),
            error = %message,
            "query input does not serialize"
        );
        let error = move || ValidationError::single(ValidationStage::Input, "$", message.clone());
        let first = error();
        let fetcher: Fetcher = Arc::new(move || -> BoxFuture<'static, Result<QueryData, RequestError>> {
            let err = error();
            Box::pin(async move { Err(err.into()) })
        });
        let key = QueryKey::new(&self.endpoint.api().name, self.endpoint.function_name(), &Value::Null);
        let entry = Entry::failed(key, self.endpoint.cache_strategy(), fetcher, first.into());
        QueryHandle::new(entry, self.policy_with(options), options.enabled)
    }

    fn policy_with(&self, options: QueryOptions) -> CachePolicy {
        let mut policy = self.policy;
        if options.stale_time.is_some() {
            policy.stale_time = options.stale_time;
        }
        policy
    }

    fn fetcher(&self, input: Value) -> Fetcher {
        let endpoint = self.endpoint.clone();
        let client = self.client.clone();
        Arc::new(move || -> BoxFuture<'static, Result<QueryData, RequestError>> {
            let endpoint = endpoint.clone();
            let client = client.clone();
            let input = input.clone();
            Box::pin(async move {
                let output = endpoint.fetch_value(&client, input).await?;
                Ok(Arc::new(output) as QueryData)
            })
        })
    }
}

/// A hook whose input and output are plain JSON.
pub type DynHook = Hook<Value, Value>;

/// Name-indexed hooks for one API.
///
/// Keys are the generated `useX` names; lookups also accept the bare
/// function name.
#[derive(Debug, Clone)]
pub struct Hooks {
    api: ApiMetadata,
    hooks: BTreeMap<String, DynHook>,
}

/// Creates a hook for every endpoint in `group`.
///
/// ## Errors
///
/// Returns [`ConfigError`] for an invalid descriptor or duplicate name.
pub fn create_hooks(
    client: &ApiClient,
    cache: &QueryCache,
    api: &ApiMetadata,
    group: &EndpointGroupMeta,
) -> Result<Hooks, ConfigError> {
    group.validate()?;
    let mut hooks = BTreeMap::new();
    for meta in &group.endpoints {
        let endpoint = DynEndpoint::dynamic(api.clone(), group.cache_strategy, meta.clone())?;
        hooks.insert(meta.hook_name(), endpoint.hook(client, cache));
    }
    Ok(Hooks {
        api: api.clone(),
        hooks,
    })
}

impl Hooks {
    /// The API these hooks call.
    pub fn api(&self) -> &ApiMetadata {
        &self.api
    }

    /// Looks up by `useX` name or bare function name.
    pub fn get(&self, name: &str) -> Option<&DynHook> {
        self.hooks.get(name).or_else(|| {
            self.hooks
                .values()
                .find(|hook| hook.endpoint().function_name() == name)
        })
    }

    /// Iterates `(useX name, hook)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DynHook)> {
        self.hooks.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns `true` when no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// The cache strategy shared by these hooks, if any are registered.
    pub fn cache_strategy(&self) -> Option<CacheStrategy> {
        self.hooks.values().next().map(|h| h.endpoint().cache_strategy())
    }
}
