//! Query client
//!
//! Process-wide cache of query results, keyed by [`QueryKey`]. The client is
//! cheap to clone and is meant to be passed explicitly to whatever needs it.
//!
//! Each entry holds the last successful value, the last error, and at most
//! one in-flight request. Requests are `Shared` futures driven by a spawned
//! task, so every caller asking for the same key while a request is running
//! attaches to it, and the result is cached even when nobody waits for it.

use super::key::QueryKey;
use super::observer::QueryObserver;
use super::options::{ErrorMeta, QueryOptions, DEFAULT_GC_TIME};
use super::report::{ErrorReporter, TracingReporter};
use super::state::{QueryState, QueryStatus};
use crate::api::{normalize, NormalizedError, TransportError};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

type CachedValue = Arc<dyn Any + Send + Sync>;
type FetchResult = Result<CachedValue, NormalizedError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;
pub(crate) type ErasedFetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchResult> + Send + Sync>;

struct InFlight {
    id: u64,
    future: SharedFetch,
}

struct Entry {
    type_id: TypeId,
    data: Option<CachedValue>,
    error: Option<NormalizedError>,
    updated_at: Option<Instant>,
    /// Bumped by every invalidation
    epoch: u64,
    /// Epoch at which the current data was requested
    data_epoch: u64,
    in_flight: Option<InFlight>,
    fetcher: Option<ErasedFetcher>,
    error_meta: Option<ErrorMeta>,
    gc_time: Duration,
    observers: usize,
    unobserved_since: Option<Instant>,
    version: watch::Sender<u64>,
}

impl Entry {
    fn new(type_id: TypeId, now: Instant) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            type_id,
            data: None,
            error: None,
            updated_at: None,
            epoch: 0,
            data_epoch: 0,
            in_flight: None,
            fetcher: None,
            error_meta: None,
            gc_time: DEFAULT_GC_TIME,
            observers: 0,
            unobserved_since: Some(now),
            version,
        }
    }

    /// Forget everything cached under a different data type
    fn reset(&mut self, type_id: TypeId) {
        self.type_id = type_id;
        self.fetcher = None;
        self.clear();
    }

    /// Forget the cached result but keep the subscription state
    fn clear(&mut self) {
        self.data = None;
        self.error = None;
        self.updated_at = None;
        self.in_flight = None;
        self.data_epoch = self.epoch;
    }

    fn is_stale(&self, stale_time: Duration, now: Instant) -> bool {
        match (&self.data, self.updated_at) {
            (Some(_), Some(updated_at)) => {
                self.data_epoch < self.epoch || now.duration_since(updated_at) >= stale_time
            },
            _ => true,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.observers == 0
            && self.in_flight.is_none()
            && self
                .unobserved_since
                .map(|since| now.duration_since(since) >= self.gc_time)
                .unwrap_or(false)
    }

    fn notify(&self) {
        self.version.send_modify(|version| *version += 1);
    }

    fn snapshot<T: Send + Sync + 'static>(&self, stale_time: Duration, now: Instant) -> QueryState<T> {
        let data = self.data.clone().and_then(|value| value.downcast::<T>().ok());
        let is_fetching = self.in_flight.is_some();

        let status = if data.is_none() && is_fetching {
            QueryStatus::Loading
        } else if self.error.is_some() {
            QueryStatus::Error
        } else if data.is_some() {
            QueryStatus::Success
        } else {
            QueryStatus::Idle
        };

        QueryState {
            status,
            data,
            error: self.error.clone(),
            is_fetching,
            is_stale: self.is_stale(stale_time, now),
        }
    }
}

struct Inner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    reporter: Arc<dyn ErrorReporter>,
    defaults: QueryOptions,
    next_fetch_id: AtomicU64,
}

/// Shared, injectable query cache
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(Arc::new(TracingReporter), QueryOptions::default())
    }
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.len())
            .field("defaults", &self.inner.defaults)
            .finish_non_exhaustive()
    }
}

impl QueryClient {
    /// Create a client reporting failures to `reporter`
    ///
    /// `defaults` is what hooks start from before applying their own settings.
    pub fn new(reporter: Arc<dyn ErrorReporter>, defaults: QueryOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                reporter,
                defaults,
                next_fetch_id: AtomicU64::new(0),
            }),
        }
    }

    /// Options hooks build on
    pub fn default_options(&self) -> QueryOptions {
        self.inner.defaults.clone()
    }

    pub(crate) fn reporter(&self) -> &Arc<dyn ErrorReporter> {
        &self.inner.reporter
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Fetch a query, returning cached data while it is fresh
    ///
    /// Concurrent calls for the same key share a single request. The fetcher
    /// is invoked while the cache is locked and must only build its future.
    pub async fn fetch_query<T, F, Fut>(
        &self,
        key: QueryKey,
        options: &QueryOptions,
        fetcher: F,
    ) -> Result<Arc<T>, NormalizedError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, NormalizedError>> + Send + 'static,
    {
        let erased = erase(Arc::new(fetcher));

        let pending = {
            let now = Instant::now();
            let mut entries = self.entries();
            collect_expired(&mut entries, now);

            let entry = prepare_entry(&mut entries, &key, TypeId::of::<T>(), now);
            entry.fetcher = Some(erased.clone());
            entry.error_meta = options.error.clone();
            entry.gc_time = options.gc_time;

            if let Some(in_flight) = &entry.in_flight {
                in_flight.future.clone()
            } else if !entry.is_stale(options.stale_time, now) {
                if let Some(data) = entry.data.clone().and_then(|value| value.downcast::<T>().ok()) {
                    return Ok(data);
                }
                self.start_fetch(&key, entry, &erased)
            } else {
                self.start_fetch(&key, entry, &erased)
            }
        };

        pending.await?.downcast::<T>().map_err(|_| {
            let cause = TransportError::InvalidRequest(format!(
                "query {} settled with a different data type",
                key
            ));
            normalize(cause, None)
        })
    }

    /// Subscribe to a query
    ///
    /// Starts a fetch when the entry is stale (and the query is enabled). The
    /// returned observer keeps the entry alive until it is dropped.
    pub fn watch_query<T, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetcher: F,
    ) -> QueryObserver<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, NormalizedError>> + Send + 'static,
    {
        let fetcher = erase(Arc::new(fetcher));

        let version = {
            let now = Instant::now();
            let mut entries = self.entries();
            collect_expired(&mut entries, now);

            let entry = prepare_entry(&mut entries, &key, TypeId::of::<T>(), now);
            entry.fetcher = Some(fetcher.clone());
            entry.error_meta = options.error.clone();
            entry.gc_time = options.gc_time;
            entry.observers += 1;
            entry.unobserved_since = None;

            if options.enabled && entry.in_flight.is_none() && entry.is_stale(options.stale_time, now) {
                self.start_fetch(&key, entry, &fetcher);
            }

            entry.version.subscribe()
        };

        QueryObserver::new(self.clone(), key, options, fetcher, version)
    }

    /// Cached data for a key, regardless of staleness
    pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        self.entries()
            .get(key)
            .and_then(|entry| entry.data.clone())
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Replace cached data for a key, as if a fetch had just succeeded
    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
        let now = Instant::now();
        let mut entries = self.entries();
        let entry = prepare_entry(&mut entries, &key, TypeId::of::<T>(), now);
        entry.data = Some(Arc::new(value));
        entry.error = None;
        entry.updated_at = Some(now);
        entry.data_epoch = entry.epoch;
        entry.notify();
    }

    /// Whether a request is in flight for this key
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.entries()
            .get(key)
            .map(|entry| entry.in_flight.is_some())
            .unwrap_or(false)
    }

    // =========================================================================
    // Invalidation and retention
    // =========================================================================

    /// Mark every entry under `prefix` stale
    ///
    /// Entries with observers are refetched right away; the others refetch on
    /// their next observation. Returns the number of entries invalidated.
    ///
    /// A request already in flight is not restarted. It settles as stale and
    /// nothing refetches on its own afterwards, so observers call
    /// [`QueryObserver::observe`] again once it has settled.
    pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries();
        let mut invalidated = 0;

        for (key, entry) in entries.iter_mut() {
            if !key.starts_with(prefix) {
                continue;
            }
            entry.epoch += 1;
            invalidated += 1;

            if entry.observers > 0 && entry.in_flight.is_none() {
                if let Some(fetcher) = entry.fetcher.clone() {
                    self.start_fetch(key, entry, &fetcher);
                    continue;
                }
            }
            entry.notify();
        }

        tracing::debug!("invalidated {} queries under {}", invalidated, prefix);
        invalidated
    }

    /// Drop every entry under `prefix`, returning how many were removed
    ///
    /// Entries that still have observers lose their data and any request in
    /// flight but stay registered, so their observers keep receiving changes
    /// and fetch again on the next [`QueryObserver::observe`].
    pub fn remove_queries(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        let mut cleared = 0;

        entries.retain(|key, entry| {
            if !key.starts_with(prefix) {
                return true;
            }
            if entry.observers == 0 {
                return false;
            }
            entry.clear();
            entry.notify();
            cleared += 1;
            true
        });

        let removed = before - entries.len() + cleared;
        tracing::debug!("removed {} queries under {}", removed, prefix);
        removed
    }

    /// Drop entries nobody observed for longer than their retention window
    pub fn collect_garbage(&self) -> usize {
        collect_expired(&mut self.entries(), Instant::now())
    }

    /// Run [`collect_garbage`](Self::collect_garbage) every `interval`
    ///
    /// The task stops once every clone of the client is dropped.
    pub fn spawn_gc(&self, interval: Duration) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let collected = QueryClient { inner }.collect_garbage();
                if collected > 0 {
                    tracing::debug!("garbage collected {} queries", collected);
                }
            }
        })
    }

    // =========================================================================
    // Observer support
    // =========================================================================

    pub(crate) fn snapshot<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        stale_time: Duration,
    ) -> QueryState<T> {
        let now = Instant::now();
        self.entries()
            .get(key)
            .map(|entry| entry.snapshot(stale_time, now))
            .unwrap_or_else(QueryState::idle)
    }

    /// Start a background fetch for an observed key when it is stale (or always
    /// with `force`). Never starts a second request while one is in flight.
    pub(crate) fn refresh<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        options: &QueryOptions,
        fetcher: &ErasedFetcher,
        force: bool,
    ) -> bool {
        let now = Instant::now();
        let mut entries = self.entries();

        let entry = prepare_entry(&mut entries, key, TypeId::of::<T>(), now);
        if entry.fetcher.is_none() {
            entry.fetcher = Some(fetcher.clone());
        }

        if entry.in_flight.is_some() || !(force || entry.is_stale(options.stale_time, now)) {
            return false;
        }

        entry.error_meta = options.error.clone();
        self.start_fetch(key, entry, fetcher);
        true
    }

    pub(crate) fn unsubscribe(&self, key: &QueryKey) {
        if let Some(entry) = self.entries().get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
            if entry.observers == 0 {
                entry.unobserved_since = Some(Instant::now());
            }
        }
    }

    // =========================================================================
    // Fetch lifecycle
    // =========================================================================

    fn start_fetch(&self, key: &QueryKey, entry: &mut Entry, fetcher: &ErasedFetcher) -> SharedFetch {
        let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let epoch = entry.epoch;
        let meta = entry.error_meta.clone();
        let inner = Arc::downgrade(&self.inner);
        let settle_key = key.clone();
        let request = fetcher();

        let future = async move {
            let result = request.await;
            if let Some(inner) = inner.upgrade() {
                QueryClient { inner }.settle(&settle_key, id, epoch, &result, meta.as_ref());
            }
            result
        }
        .boxed()
        .shared();

        tracing::debug!("query {} fetching", key);
        entry.in_flight = Some(InFlight {
            id,
            future: future.clone(),
        });
        entry.notify();

        // Drive the request to completion even if every caller goes away
        tokio::spawn(future.clone());
        future
    }

    fn settle(
        &self,
        key: &QueryKey,
        fetch_id: u64,
        epoch: u64,
        result: &FetchResult,
        meta: Option<&ErrorMeta>,
    ) {
        let now = Instant::now();
        {
            let mut entries = self.entries();
            let current = entries
                .get_mut(key)
                .filter(|entry| entry.in_flight.as_ref().map(|f| f.id) == Some(fetch_id));

            if let Some(entry) = current {
                entry.in_flight = None;
                match result {
                    Ok(value) => {
                        entry.data = Some(value.clone());
                        entry.error = None;
                        entry.updated_at = Some(now);
                        entry.data_epoch = epoch;
                    },
                    Err(error) => entry.error = Some(error.clone()),
                }
                if entry.observers == 0 {
                    entry.unobserved_since = Some(now);
                }
                entry.notify();
            }
        }

        match result {
            Ok(_) => tracing::debug!("query {} settled", key),
            Err(error) => {
                tracing::warn!("query {} failed: {}", key, error);
                if let Some(meta) = meta {
                    self.inner.reporter.report(meta, error);
                }
            },
        }
    }
}

fn erase<T, F, Fut>(fetcher: Arc<F>) -> ErasedFetcher
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, NormalizedError>> + Send + 'static,
{
    Arc::new(move || {
        let request = fetcher();
        async move { request.await.map(|value| Arc::new(value) as CachedValue) }.boxed()
    })
}

fn prepare_entry<'a>(
    entries: &'a mut HashMap<QueryKey, Entry>,
    key: &QueryKey,
    type_id: TypeId,
    now: Instant,
) -> &'a mut Entry {
    let entry = entries
        .entry(key.clone())
        .or_insert_with(|| Entry::new(type_id, now));

    if entry.type_id != type_id {
        tracing::warn!("query {} reused with a different data type, dropping cached value", key);
        entry.reset(type_id);
    }
    entry
}

fn collect_expired(entries: &mut HashMap<QueryKey, Entry>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|key, entry| {
        let expired = entry.is_expired(now);
        if expired {
            tracing::debug!("query {} garbage collected", key);
        }
        !expired
    });
    before - entries.len()
}
