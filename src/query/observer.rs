//! Query observers
//!
//! A [`QueryObserver`] is what a consumer holds on to while it displays a
//! query: it exposes the load/error/data state of one key, refetches in the
//! background when that state goes stale, and can wait for changes.
//!
//! # Example
//!
//! ```ignore
//! let mut dashboard = nomad::use_dashboard(&queries, &client, environment_id);
//!
//! loop {
//!     let state = dashboard.observe();
//!     match state.status {
//!         QueryStatus::Loading => render_spinner(),
//!         QueryStatus::Success => render(state.data().unwrap()),
//!         QueryStatus::Error => render_error(state.error().unwrap()),
//!         QueryStatus::Idle => {}
//!     }
//!     if !dashboard.changed().await {
//!         break;
//!     }
//! }
//! ```

use super::client::{ErasedFetcher, QueryClient};
use super::key::QueryKey;
use super::options::QueryOptions;
use super::state::QueryState;
use std::fmt;
use std::marker::PhantomData;
use tokio::sync::watch;

/// Subscription to one cached query
///
/// Dropping the observer unsubscribes; once a key has no observers left its
/// entry is garbage collected after the retention window.
pub struct QueryObserver<T> {
    client: QueryClient,
    key: QueryKey,
    options: QueryOptions,
    fetcher: ErasedFetcher,
    version: watch::Receiver<u64>,
    _data: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
    pub(crate) fn new(
        client: QueryClient,
        key: QueryKey,
        options: QueryOptions,
        fetcher: ErasedFetcher,
        version: watch::Receiver<u64>,
    ) -> Self {
        Self {
            client,
            key,
            options,
            fetcher,
            version,
            _data: PhantomData,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Current state, without side effects
    pub fn state(&self) -> QueryState<T> {
        self.client.snapshot(&self.key, self.options.stale_time)
    }

    /// Current state, starting a background refetch first if the data is stale
    ///
    /// The returned state still carries the last known data while the refetch
    /// runs.
    pub fn observe(&self) -> QueryState<T> {
        if self.options.enabled {
            self.client
                .refresh::<T>(&self.key, &self.options, &self.fetcher, false);
        }
        self.state()
    }

    /// Fetch again regardless of staleness
    ///
    /// Returns `false` when a request for this key is already in flight.
    pub fn refetch(&self) -> bool {
        self.client
            .refresh::<T>(&self.key, &self.options, &self.fetcher, true)
    }

    /// Wait until the entry changes
    ///
    /// Observed entries stay registered even when their queries are removed,
    /// so this only returns `false` once the entry no longer exists.
    pub async fn changed(&mut self) -> bool {
        self.version.changed().await.is_ok()
    }

    /// Wait until no request is in flight and return the resulting state
    pub async fn settled(&mut self) -> QueryState<T> {
        loop {
            self.version.borrow_and_update();
            let state = self.state();
            if !state.is_fetching {
                return state;
            }
            if !self.changed().await {
                return self.state();
            }
        }
    }
}

impl<T> Drop for QueryObserver<T> {
    fn drop(&mut self) {
        self.client.unsubscribe(&self.key);
    }
}

impl<T> fmt::Debug for QueryObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryObserver")
            .field("key", &self.key)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{normalize, NormalizedError, TransportError};
    use crate::query::QueryStatus;
    use crate::query_key;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counter_query(
        client: &QueryClient,
        options: QueryOptions,
        counter: Arc<AtomicU32>,
    ) -> QueryObserver<u32> {
        client.watch_query(query_key!["environments", 5, "dashboard"], options, move || {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, NormalizedError>(counter.fetch_add(1, Ordering::SeqCst) + 1)
            }
        })
    }

    #[tokio::test]
    async fn test_subscription_loads_then_succeeds() {
        let client = QueryClient::default();
        let mut observer = counter_query(&client, QueryOptions::default(), Arc::default());

        let state = observer.state();
        assert!(state.is_loading());
        assert!(state.data().is_none());

        let state = observer.settled().await;
        assert_eq!(state.status, QueryStatus::Success);
        assert_eq!(state.data(), Some(&1));
        assert!(state.error().is_none());
    }

    #[tokio::test]
    async fn test_observers_share_one_request() {
        let client = QueryClient::default();
        let counter = Arc::new(AtomicU32::new(0));
        let mut first = counter_query(&client, QueryOptions::default(), counter.clone());
        let mut second = counter_query(&client, QueryOptions::default(), counter.clone());

        assert_eq!(first.settled().await.data(), Some(&1));
        assert_eq!(second.settled().await.data(), Some(&1));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_observation_keeps_serving_data() {
        let client = QueryClient::default();
        let counter = Arc::new(AtomicU32::new(0));
        let mut observer = counter_query(&client, QueryOptions::default(), counter.clone());
        observer.settled().await;

        // Zero stale time: the next observation revalidates in the background
        let state = observer.observe();
        assert!(state.is_fetching);
        assert_eq!(state.status, QueryStatus::Success);
        assert_eq!(state.data(), Some(&1));

        let state = observer.settled().await;
        assert_eq!(state.data(), Some(&2));
    }

    #[tokio::test]
    async fn test_fresh_observation_does_not_refetch() {
        let client = QueryClient::default();
        let counter = Arc::new(AtomicU32::new(0));
        let options = QueryOptions::default().with_stale_time(Duration::from_secs(60));
        let mut observer = counter_query(&client, options, counter.clone());
        observer.settled().await;

        let state = observer.observe();
        assert!(!state.is_fetching);
        assert!(!state.is_stale);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_query_stays_idle() {
        let client = QueryClient::default();
        let counter = Arc::new(AtomicU32::new(0));
        let observer = counter_query(&client, QueryOptions::default().enabled(false), counter.clone());

        assert_eq!(observer.observe().status, QueryStatus::Idle);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refetch_does_not_duplicate_in_flight_request() {
        let client = QueryClient::default();
        let counter = Arc::new(AtomicU32::new(0));
        let mut observer = counter_query(&client, QueryOptions::default(), counter.clone());

        assert!(!observer.refetch());
        observer.settled().await;
        assert!(observer.refetch());
        observer.settled().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidation_refetches_observed_queries() {
        let client = QueryClient::default();
        let counter = Arc::new(AtomicU32::new(0));
        let options = QueryOptions::default().with_stale_time(Duration::from_secs(60));
        let mut observer = counter_query(&client, options, counter.clone());
        observer.settled().await;

        client.invalidate_queries(&query_key!["environments", 5]);
        assert!(observer.state().is_fetching);

        let state = observer.settled().await;
        assert_eq!(state.data(), Some(&2));
        assert!(!state.is_stale);
    }

    #[tokio::test]
    async fn test_invalidation_during_fetch_waits_for_next_observation() {
        let client = QueryClient::default();
        let counter = Arc::new(AtomicU32::new(0));
        let options = QueryOptions::default().with_stale_time(Duration::from_secs(60));
        let mut observer = counter_query(&client, options, counter.clone());

        // The first request is still running, so nothing new starts
        client.invalidate_queries(&query_key!["environments"]);
        let state = observer.settled().await;
        assert_eq!(state.data(), Some(&1));
        assert!(state.is_stale);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        assert!(observer.observe().is_fetching);
        let state = observer.settled().await;
        assert_eq!(state.data(), Some(&2));
        assert!(!state.is_stale);
    }

    #[tokio::test]
    async fn test_observer_survives_query_removal() {
        let client = QueryClient::default();
        let counter = Arc::new(AtomicU32::new(0));
        let mut observer = counter_query(&client, QueryOptions::default(), counter.clone());
        assert_eq!(observer.settled().await.data(), Some(&1));

        client.remove_queries(&query_key!["environments"]);
        assert_eq!(observer.state().status, QueryStatus::Idle);

        observer.observe();
        let state = observer.settled().await;
        assert_eq!(state.data(), Some(&2));
        assert!(observer.refetch());
        assert!(observer.changed().await);
    }

    #[tokio::test]
    async fn test_error_then_recovery() {
        let client = QueryClient::default();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let mut observer = client.watch_query(query_key!["stacks", 7], QueryOptions::default(), move || {
            let attempts = counter.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(normalize(
                        TransportError::InvalidRequest("offline".into()),
                        Some("Unable to retrieve stack"),
                    ))
                } else {
                    Ok(7u64)
                }
            }
        });

        let state = observer.settled().await;
        assert!(state.is_error());
        assert_eq!(state.error().unwrap().message(), "Unable to retrieve stack");

        observer.refetch();
        let state = observer.settled().await;
        assert!(state.is_success());
        assert!(state.error().is_none());
        assert_eq!(state.data(), Some(&7));
    }

    #[tokio::test]
    async fn test_changed_wakes_on_settle() {
        let client = QueryClient::default();
        let mut observer = counter_query(&client, QueryOptions::default(), Arc::default());

        let mut wait = tokio_test::task::spawn(observer.changed());
        tokio_test::assert_pending!(wait.poll());
        drop(wait);

        assert!(observer.changed().await);
        assert_eq!(observer.state().data(), Some(&1));
    }
}
