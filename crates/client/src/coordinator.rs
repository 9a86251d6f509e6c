//! Cache-aware fetching
//!
//! [`FetchCoordinator::fetch_data`] serves fresh entries from the
//! [`CacheStore`] and otherwise runs the caller's producer, storing only
//! successful results. Concurrent misses for the same key share one producer
//! run when deduplication is enabled.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use fetchkit_cache::CacheStore;
use fetchkit_core::constants::DEFAULT_TTL_MS;
use fetchkit_core::{ApiResult, ErrorBuilder, ErrorContext, NormalizedError};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

type PendingFetch = Shared<BoxFuture<'static, ApiResult<Value>>>;

/// Shared loading and error state across every fetch and mutation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchStatus {
    pub is_loading: bool,
    /// Producers currently running
    pub in_flight: usize,
    /// Outcome of the most recently settled producer
    pub error: Option<NormalizedError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorOptions {
    pub default_ttl: Duration,
    pub dedupe_in_flight: bool,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_millis(DEFAULT_TTL_MS),
            dedupe_in_flight: true,
        }
    }
}

#[derive(Clone)]
pub struct FetchCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<CacheStore>,
    options: CoordinatorOptions,
    in_flight: Mutex<HashMap<String, PendingFetch>>,
    status: watch::Sender<FetchStatus>,
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("options", &self.inner.options)
            .field("status", &*self.inner.status.borrow())
            .finish_non_exhaustive()
    }
}

impl FetchCoordinator {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self::with_options(store, CoordinatorOptions::default())
    }

    pub fn with_options(store: Arc<CacheStore>, options: CoordinatorOptions) -> Self {
        let (status, _) = watch::channel(FetchStatus::default());
        Self {
            inner: Arc::new(Inner {
                store,
                options,
                in_flight: Mutex::new(HashMap::new()),
                status,
            }),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.inner.store
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.options.default_ttl
    }

    /// Return the fresh cached value for `key`, or run `producer` and cache
    /// its success.
    ///
    /// A hit performs no request and leaves [`FetchStatus`] untouched. A
    /// failure is never written to the store, so an older entry stays
    /// readable through [`CacheStore::peek`].
    pub async fn fetch_data<T, F, Fut>(
        &self,
        key: &str,
        producer: F,
        ttl: Option<Duration>,
    ) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let ttl = ttl.unwrap_or(self.inner.options.default_ttl);
        if let Some(value) = self.inner.store.read_as::<T>(key, ttl).await {
            trace!(key = %key, "Cache hit");
            return Ok(value);
        }

        trace!(key = %key, "Cache miss");
        let value = self.load(key, producer).await?;
        serde_json::from_value(value).context("Failed to read fetched value")
    }

    /// Run `producer` even if a fresh entry exists and replace the entry on
    /// success
    pub async fn refresh<T, F, Fut>(&self, key: &str, producer: F) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let value = self.load(key, producer).await?;
        serde_json::from_value(value).context("Failed to read fetched value")
    }

    /// Run a state-changing request. The store is neither read nor written.
    pub async fn mutate<T, F, Fut>(&self, producer: F) -> ApiResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        self.inner.begin_loading();
        let result = producer().await;
        self.inner.settle(result.as_ref().err());
        result
    }

    /// Drop the entry for `key`; the next fetch goes to the network
    pub async fn invalidate_cache(&self, key: &str) -> bool {
        self.inner.store.invalidate(key).await
    }

    /// Drop every entry, e.g. on logout
    pub async fn clear_cache(&self) -> usize {
        self.inner.store.clear().await
    }

    /// Cached value for `key` regardless of age
    pub async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.inner.store.peek_as(key).await
    }

    pub fn status(&self) -> FetchStatus {
        self.inner.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<FetchStatus> {
        self.inner.status.subscribe()
    }

    /// Keys with a producer currently running
    pub fn in_flight_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .lock_in_flight("in_flight_keys")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    async fn load<T, F, Fut>(&self, key: &str, producer: F) -> ApiResult<Value>
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let pending = if self.inner.options.dedupe_in_flight {
            self.join_or_start(key, producer)
        } else {
            self.start(key.to_string(), producer)
        };

        pending.await
    }

    /// The pending fetch for `key`, registering a new one if none is running
    fn join_or_start<T, F, Fut>(&self, key: &str, producer: F) -> PendingFetch
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let mut in_flight = self.inner.lock_in_flight("join_or_start");
        if let Some(pending) = in_flight.get(key) {
            debug!(key = %key, "Joining in-flight fetch");
            return pending.clone();
        }

        let pending = self.start(key.to_string(), producer);
        in_flight.insert(key.to_string(), pending.clone());
        pending
    }

    /// Spawn the producer so it settles even if every caller is dropped
    fn start<T, F, Fut>(&self, key: String, producer: F) -> PendingFetch
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        self.inner.begin_loading();

        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let key = task_key;
            let result = producer().await.and_then(|value| {
                serde_json::to_value(value).context("Failed to serialize fetched value")
            });
            match &result {
                Ok(value) => inner.store.write(key.clone(), value.clone()).await,
                Err(error) => warn!(key = %key, error = %error, "Fetch failed, cache left untouched"),
            }

            inner.finish(&key, result.as_ref().err());
            result
        });

        let inner = Arc::clone(&self.inner);
        task.map(move |joined| {
            joined.unwrap_or_else(|e| {
                let error = ErrorBuilder::internal(format!("Fetch task failed: {e}"));
                inner.finish(&key, Some(&error));
                Err(error)
            })
        })
        .boxed()
        .shared()
    }
}

impl Inner {
    fn begin_loading(&self) {
        self.status.send_modify(|status| {
            status.in_flight += 1;
            status.is_loading = true;
        });
    }

    fn settle(&self, error: Option<&NormalizedError>) {
        self.status.send_modify(|status| {
            status.in_flight = status.in_flight.saturating_sub(1);
            status.is_loading = status.in_flight > 0;
            status.error = error.cloned();
        });
    }

    fn finish(&self, key: &str, error: Option<&NormalizedError>) {
        self.settle(error);
        if self.options.dedupe_in_flight {
            self.forget(key);
        }
    }

    fn forget(&self, key: &str) {
        self.lock_in_flight("forget").remove(key);
    }

    fn lock_in_flight(&self, op: &'static str) -> MutexGuard<'_, HashMap<String, PendingFetch>> {
        match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    op,
                    lock_kind = "mutex.lock",
                    result = "poisoned_recovered",
                    "Recovered from poisoned in-flight lock"
                );
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fetchkit_core::ErrorKind;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{advance, sleep, timeout};

    fn coordinator() -> FetchCoordinator {
        FetchCoordinator::new(Arc::new(CacheStore::new(100)))
    }

    fn counting_producer(
        calls: &Arc<AtomicUsize>,
        value: Value,
    ) -> impl FnOnce() -> BoxFuture<'static, ApiResult<Value>> + Send + 'static {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }
            .boxed()
        }
    }

    fn failing_producer(
        calls: &Arc<AtomicUsize>,
        error: NormalizedError,
    ) -> impl FnOnce() -> BoxFuture<'static, ApiResult<Value>> + Send + 'static {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(error)
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_runs_producer_once_and_stores() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        let value = coordinator
            .fetch_data("users/1", counting_producer(&calls, json!({"id": 1})), None)
            .await
            .unwrap();

        assert_eq!(value, json!({"id": 1}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            coordinator.store().peek("users/1").await.map(|e| e.value),
            Some(json!({"id": 1}))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_skips_producer_and_status() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        coordinator
            .fetch_data("users/1", counting_producer(&calls, json!(1)), None)
            .await
            .unwrap();
        let before = coordinator.status();

        let again: Value = coordinator
            .fetch_data("users/1", counting_producer(&calls, json!(2)), None)
            .await
            .unwrap();

        assert_eq!(again, json!(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.status(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_refetched() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = Some(Duration::from_millis(1000));

        coordinator
            .fetch_data("k", counting_producer(&calls, json!("old")), ttl)
            .await
            .unwrap();
        advance(Duration::from_millis(999)).await;
        let fresh: Value = coordinator
            .fetch_data("k", counting_producer(&calls, json!("new")), ttl)
            .await
            .unwrap();
        assert_eq!(fresh, json!("old"));

        advance(Duration::from_millis(1)).await;
        let refetched: Value = coordinator
            .fetch_data("k", counting_producer(&calls, json!("new")), ttl)
            .await
            .unwrap();
        assert_eq!(refetched, json!("new"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_not_cached_and_sets_error() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        let error = coordinator
            .fetch_data::<Value, _, _>(
                "users/404",
                failing_producer(&calls, ErrorBuilder::not_found("HTTP request failed")),
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::NotFound);
        assert_eq!(error.status_code, 404);
        assert!(coordinator.store().peek("users/404").await.is_none());

        let status = coordinator.status();
        assert!(!status.is_loading);
        assert_eq!(status.error, Some(error));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_clears_previous_error() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        let _ = coordinator
            .fetch_data::<Value, _, _>("a", failing_producer(&calls, ErrorBuilder::network("down")), None)
            .await;
        assert!(coordinator.status().error.is_some());

        coordinator
            .fetch_data("a", counting_producer(&calls, json!(true)), None)
            .await
            .unwrap();
        assert_eq!(coordinator.status(), FetchStatus::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_value_survives_failed_refetch() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));
        let ttl = Some(Duration::from_secs(1));

        coordinator
            .fetch_data("users/1", counting_producer(&calls, json!({"name": "Ada"})), ttl)
            .await
            .unwrap();
        advance(Duration::from_secs(5)).await;

        let error = coordinator
            .fetch_data::<Value, _, _>(
                "users/1",
                failing_producer(&calls, ErrorBuilder::service_unavailable("maintenance")),
                ttl,
            )
            .await
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::ServiceUnavailable);
        assert_eq!(
            coordinator.cached::<Value>("users/1").await,
            Some(json!({"name": "Ada"}))
        );
        assert_eq!(coordinator.status().error, Some(error));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_producer() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        let slow = |calls: &Arc<AtomicUsize>| {
            let calls = Arc::clone(calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(50)).await;
                Ok::<_, NormalizedError>(json!({"id": 1}))
            }
        };

        let (first, second) = tokio::join!(
            coordinator.fetch_data::<Value, _, _>("users/1", slow(&calls), None),
            coordinator.fetch_data::<Value, _, _>("users/1", slow(&calls), None),
        );

        assert_eq!(first.unwrap(), json!({"id": 1}));
        assert_eq!(second.unwrap(), json!({"id": 1}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(coordinator.in_flight_keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_failure_reaches_every_caller() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        let slow_failure = |calls: &Arc<AtomicUsize>| {
            let calls = Arc::clone(calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                Err::<Value, _>(ErrorBuilder::network("connection reset"))
            }
        };

        let (first, second) = tokio::join!(
            coordinator.fetch_data::<Value, _, _>("k", slow_failure(&calls), None),
            coordinator.fetch_data::<Value, _, _>("k", slow_failure(&calls), None),
        );

        assert_eq!(first.unwrap_err(), second.unwrap_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_caller_does_not_stall_the_fetch() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        let slow = |calls: &Arc<AtomicUsize>| {
            let calls = Arc::clone(calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(100)).await;
                Ok::<_, NormalizedError>(json!({"id": 1}))
            }
        };

        let abandoned = timeout(
            Duration::from_millis(10),
            coordinator.fetch_data::<Value, _, _>("k", slow(&calls), None),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(coordinator.in_flight_keys(), vec!["k".to_string()]);

        sleep(Duration::from_secs(5)).await;

        let status = coordinator.status();
        assert!(!status.is_loading);
        assert_eq!(status.in_flight, 0);
        assert!(coordinator.in_flight_keys().is_empty());
        assert_eq!(coordinator.cached::<Value>("k").await, Some(json!({"id": 1})));

        let again: Value = coordinator
            .fetch_data("k", slow(&calls), None)
            .await
            .unwrap();
        assert_eq!(again, json!({"id": 1}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dedupe_can_be_disabled() {
        let options = CoordinatorOptions {
            dedupe_in_flight: false,
            ..Default::default()
        };
        let coordinator = FetchCoordinator::with_options(Arc::new(CacheStore::new(10)), options);
        let calls = Arc::new(AtomicUsize::new(0));

        let slow = |calls: &Arc<AtomicUsize>, n: u64| {
            let calls = Arc::clone(calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(10 * n)).await;
                Ok::<_, NormalizedError>(json!(n))
            }
        };

        let (first, second) = tokio::join!(
            coordinator.fetch_data::<Value, _, _>("k", slow(&calls, 1), None),
            coordinator.fetch_data::<Value, _, _>("k", slow(&calls, 2), None),
        );

        assert_eq!(first.unwrap(), json!(1));
        assert_eq!(second.unwrap(), json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // Last write wins
        assert_eq!(coordinator.cached::<Value>("k").await, Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_bypasses_fresh_entry() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        coordinator
            .fetch_data("k", counting_producer(&calls, json!(1)), None)
            .await
            .unwrap();
        let refreshed: Value = coordinator
            .refresh("k", counting_producer(&calls, json!(2)))
            .await
            .unwrap();

        assert_eq!(refreshed, json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.cached::<Value>("k").await, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_mutate_never_touches_store() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let value: Value = coordinator
                .mutate(counting_producer(&calls, json!({"id": 101})))
                .await
                .unwrap();
            assert_eq!(value["id"], 101);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(coordinator.store().is_empty().await);
        assert!(!coordinator.status().is_loading);
    }

    #[tokio::test]
    async fn test_mutate_failure_sets_error() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        let error = coordinator
            .mutate(failing_producer(&calls, ErrorBuilder::conflict("exists")))
            .await
            .unwrap_err();

        assert_eq!(coordinator.status().error, Some(error));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_then_read_is_absent() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        coordinator
            .fetch_data("users/1", counting_producer(&calls, json!(1)), None)
            .await
            .unwrap();

        assert!(coordinator.invalidate_cache("users/1").await);
        assert!(coordinator
            .store()
            .read("users/1", Duration::from_millis(60_000))
            .await
            .is_none());
        assert!(!coordinator.invalidate_cache("users/1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cache() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        for key in ["a", "b", "c"] {
            coordinator
                .fetch_data(key, counting_producer(&calls, json!(key)), None)
                .await
                .unwrap();
        }

        assert_eq!(coordinator.clear_cache().await, 3);
        assert!(coordinator.store().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_is_observable() {
        let coordinator = coordinator();
        let mut status = coordinator.watch_status();

        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .fetch_data(
                        "slow",
                        || async {
                            sleep(Duration::from_millis(100)).await;
                            Ok::<_, NormalizedError>(json!("done"))
                        },
                        None,
                    )
                    .await
            })
        };

        status.changed().await.unwrap();
        assert!(status.borrow_and_update().is_loading);

        let value: Value = task.await.unwrap().unwrap();
        assert_eq!(value, json!("done"));
        assert!(!coordinator.status().is_loading);
        assert_eq!(coordinator.status().in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_typed_values_round_trip_through_store() {
        #[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
        struct Post {
            id: u32,
            title: String,
        }

        let coordinator = coordinator();
        let post = Post {
            id: 1,
            title: "sunt aut facere".to_string(),
        };

        let expected = post.clone();
        let fetched = coordinator
            .fetch_data("posts/1", move || async move { Ok(post) }, None)
            .await
            .unwrap();
        assert_eq!(fetched, expected);

        let cached: Post = coordinator
            .fetch_data(
                "posts/1",
                || async { Err(ErrorBuilder::internal("must not run")) },
                None,
            )
            .await
            .unwrap();
        assert_eq!(cached, expected);
    }
}
