//! In-process query cache.
//!
//! Each [`QueryKey`] maps to one entry holding the latest snapshot in a
//! `tokio::sync::watch` channel. Hook handles subscribe to that channel, so
//! every observer of a key sees the same data and the same error. An entry
//! runs at most one fetch at a time; a request for another fetch while one is
//! in flight is absorbed by it.
//!
//! Entries nobody observes are evicted once they have been idle for the
//! cache's GC time. Eviction runs whenever an entry is looked up and on every
//! flush watcher tick.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use strum::Display;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use wsdot_define::{ApiMetadata, CacheStrategy};

use super::flush::{self, FlushWatcher};
use super::key::QueryKey;
use super::strategy::{FLUSH_POLL_INTERVAL, GC_TIME};
use crate::client::ApiClient;
use crate::error::RequestError;
use crate::transport::BoxFuture;

/// Type-erased cached payload.
pub(crate) type QueryData = Arc<dyn Any + Send + Sync>;

/// Produces a fresh payload for an entry.
pub(crate) type Fetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<QueryData, RequestError>> + Send + Sync>;

/// Lifecycle of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum QueryStatus {
    /// No fetch has been started.
    Idle,
    /// A fetch is in flight. Previous data, if any, is still available.
    Loading,
    /// The last fetch succeeded.
    Success,
    /// The last fetch failed.
    Error,
}

#[derive(Clone)]
pub(crate) struct Snapshot {
    pub(crate) status: QueryStatus,
    pub(crate) data: Option<QueryData>,
    pub(crate) error: Option<Arc<RequestError>>,
    pub(crate) updated_at: Option<Instant>,
    pub(crate) invalidated: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            updated_at: None,
            invalidated: false,
        }
    }
}

pub(crate) struct Entry {
    key: QueryKey,
    strategy: CacheStrategy,
    state: watch::Sender<Snapshot>,
    fetcher: Fetcher,
    in_flight: AtomicBool,
    generation: AtomicU64,
    observers: AtomicUsize,
    idle_since: Mutex<Option<Instant>>,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("strategy", &self.strategy)
            .field("status", &self.state.borrow().status)
            .field("observers", &self.observers.load(Ordering::Relaxed))
            .finish()
    }
}

impl Entry {
    fn new(key: QueryKey, strategy: CacheStrategy, fetcher: Fetcher, snapshot: Snapshot) -> Self {
        let (state, _) = watch::channel(snapshot);
        Self {
            key,
            strategy,
            state,
            fetcher,
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            observers: AtomicUsize::new(0),
            idle_since: Mutex::new(Some(Instant::now())),
        }
    }

    /// An entry outside any cache that has already failed with `error`.
    ///
    /// Refetching runs `fetcher` as usual.
    pub(crate) fn failed(
        key: QueryKey,
        strategy: CacheStrategy,
        fetcher: Fetcher,
        error: RequestError,
    ) -> Arc<Self> {
        let snapshot = Snapshot {
            status: QueryStatus::Error,
            error: Some(Arc::new(error)),
            updated_at: Some(Instant::now()),
            ..Snapshot::default()
        };
        Arc::new(Self::new(key, strategy, fetcher, snapshot))
    }

    pub(crate) fn key(&self) -> &QueryKey {
        &self.key
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    pub(crate) fn add_observer(&self) {
        let mut idle_since = lock(&self.idle_since);
        self.observers.fetch_add(1, Ordering::AcqRel);
        *idle_since = None;
    }

    pub(crate) fn remove_observer(&self) {
        let mut idle_since = lock(&self.idle_since);
        if self.observers.fetch_sub(1, Ordering::AcqRel) == 1 {
            *idle_since = Some(Instant::now());
        }
    }

    /// Unobserved for at least `gc_time`.
    fn is_expired(&self, now: Instant, gc_time: Duration) -> bool {
        lock(&self.idle_since).is_some_and(|since| now.saturating_duration_since(since) >= gc_time)
    }

    fn is_observed(&self) -> bool {
        self.observers.load(Ordering::Acquire) > 0
    }

    /// Starts a fetch unless one is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn fetch(self: &Arc<Self>) {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!(key = %self.key, "fetch already in flight");
            return;
        }
        let generation = self.generation.load(Ordering::Acquire);
        self.state.send_modify(|s| s.status = QueryStatus::Loading);

        let entry = Arc::clone(self);
        tokio::spawn(async move {
            let result = (entry.fetcher)().await;
            let invalidated = entry.generation.load(Ordering::Acquire) != generation;
            entry.state.send_modify(|s| {
                s.updated_at = Some(Instant::now());
                s.invalidated = invalidated;
                match result {
                    Ok(data) => {
                        s.status = QueryStatus::Success;
                        s.data = Some(data);
                        s.error = None;
                    }
                    Err(err) => {
                        s.status = QueryStatus::Error;
                        s.error = Some(Arc::new(err));
                    }
                }
            });
            entry.in_flight.store(false, Ordering::Release);

            if invalidated && entry.is_observed() {
                debug!(key = %entry.key, "invalidated while fetching; refetching");
                entry.fetch();
            }
        });
    }

    /// Marks the entry stale and refetches it if anyone is watching.
    fn invalidate(self: &Arc<Self>) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.state.send_modify(|s| s.invalidated = true);
        if self.is_observed() {
            self.fetch();
        }
    }
}

#[derive(Debug)]
pub(crate) struct CacheInner {
    entries: Mutex<HashMap<QueryKey, Arc<Entry>>>,
    flush_dates: Mutex<HashMap<String, DateTime<Utc>>>,
    watchers: Mutex<HashMap<String, FlushWatcher>>,
    flush_interval: Duration,
    gc_time: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes expired entries except `keep`. Returns the number removed.
fn evict_expired(
    entries: &mut HashMap<QueryKey, Arc<Entry>>,
    gc_time: Duration,
    keep: Option<&QueryKey>,
) -> usize {
    let now = Instant::now();
    let before = entries.len();
    entries.retain(|key, entry| Some(key) == keep || !entry.is_expired(now, gc_time));
    let evicted = before - entries.len();
    if evicted > 0 {
        debug!(evicted, remaining = entries.len(), "idle cache entries evicted");
    }
    evicted
}

impl CacheInner {
    pub(crate) fn evict_idle(&self) -> usize {
        evict_expired(&mut lock(&self.entries), self.gc_time, None)
    }

    fn invalidate_where(&self, predicate: impl Fn(&Entry) -> bool) -> usize {
        let matching: Vec<Arc<Entry>> = lock(&self.entries)
            .values()
            .filter(|entry| predicate(entry))
            .cloned()
            .collect();
        for entry in &matching {
            entry.invalidate();
        }
        matching.len()
    }

    pub(crate) fn record_flush_date(&self, api: &str, date: DateTime<Utc>) -> bool {
        let previous = lock(&self.flush_dates).insert(api.to_string(), date);
        match previous {
            Some(previous) if previous != date => {
                let count = self.invalidate_where(|e| {
                    e.key.api() == api && e.strategy == CacheStrategy::Static
                });
                info!(api, %previous, current = %date, invalidated = count, "cache flush date changed");
                true
            }
            _ => false,
        }
    }
}

/// Shared cache for hook results.
///
/// Clones share the same entries. Flush-date watchers started through this
/// cache stop when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    /// Creates an empty cache polling flush dates at the default interval.
    pub fn new() -> Self {
        Self::with_flush_interval(FLUSH_POLL_INTERVAL)
    }

    /// Creates an empty cache with a custom flush-date polling interval.
    pub fn with_flush_interval(interval: Duration) -> Self {
        Self::with_intervals(interval, GC_TIME)
    }

    /// Creates an empty cache with a custom flush-date polling interval and
    /// a custom idle time before unobserved entries are evicted.
    pub fn with_intervals(flush_interval: Duration, gc_time: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                flush_dates: Mutex::new(HashMap::new()),
                watchers: Mutex::new(HashMap::new()),
                flush_interval,
                gc_time,
            }),
        }
    }

    /// Returns the entry for `key`, creating it with `fetcher` if absent.
    pub(crate) fn entry(
        &self,
        key: QueryKey,
        strategy: CacheStrategy,
        fetcher: impl FnOnce() -> Fetcher,
    ) -> Arc<Entry> {
        let mut entries = lock(&self.inner.entries);
        evict_expired(&mut entries, self.inner.gc_time, Some(&key));
        let entry = entries.entry(key.clone()).or_insert_with(|| {
            debug!(%key, "cache entry created");
            Arc::new(Entry::new(key, strategy, fetcher(), Snapshot::default()))
        });
        Arc::clone(entry)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        lock(&self.inner.entries).len()
    }

    /// Returns `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `key` has an entry.
    pub fn contains(&self, key: &QueryKey) -> bool {
        lock(&self.inner.entries).contains_key(key)
    }

    /// Invalidates one entry. Returns `false` if it does not exist.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        self.inner.invalidate_where(|e| e.key == *key) > 0
    }

    /// Invalidates every entry of `api`, optionally only those with
    /// `strategy`. Returns the number invalidated.
    pub fn invalidate_api(&self, api: &str, strategy: Option<CacheStrategy>) -> usize {
        self.inner.invalidate_where(|e| {
            e.key.api() == api && strategy.is_none_or(|s| e.strategy == s)
        })
    }

    /// Records the latest cache flush date seen for `api`.
    ///
    /// The first date recorded is a baseline. Any later, different date
    /// invalidates every `STATIC` entry of the API and returns `true`.
    pub fn record_flush_date(&self, api: &str, date: DateTime<Utc>) -> bool {
        self.inner.record_flush_date(api, date)
    }

    /// The last flush date recorded for `api`.
    pub fn flush_date(&self, api: &str) -> Option<DateTime<Utc>> {
        lock(&self.inner.flush_dates).get(api).copied()
    }

    /// Drops entries unobserved for longer than the GC time. Returns the
    /// number removed.
    pub fn evict_idle(&self) -> usize {
        self.inner.evict_idle()
    }

    /// Drops entries no handle is watching. Returns the number removed.
    pub fn prune(&self) -> usize {
        let mut entries = lock(&self.inner.entries);
        let before = entries.len();
        entries.retain(|_, entry| entry.is_observed());
        before - entries.len()
    }

    /// Starts the flush-date watcher for `api` unless one is running.
    ///
    /// Does nothing for APIs without a flush path or outside a Tokio runtime.
    pub(crate) fn ensure_flush_watcher(&self, client: &ApiClient, api: &ApiMetadata) {
        if api.cache_flush_path.is_none() {
            return;
        }
        let mut watchers = lock(&self.inner.watchers);
        if watchers.contains_key(&api.name) {
            return;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            warn!(api = %api.name, "no Tokio runtime; cache flush date will not be polled");
            return;
        }
        match flush::spawn(
            Arc::downgrade(&self.inner),
            client.clone(),
            api,
            self.inner.flush_interval,
        ) {
            Ok(watcher) => {
                debug!(api = %api.name, "cache flush watcher started");
                watchers.insert(api.name.clone(), watcher);
            }
            Err(err) => warn!(api = %api.name, error = %err, "cache flush watcher not started"),
        }
    }

    /// Returns `true` if a flush-date watcher is running for `api`.
    pub fn is_watching(&self, api: &str) -> bool {
        lock(&self.inner.watchers).contains_key(api)
    }
}
