use std::sync::Arc;
use std::time::Duration;

use fetchkit_cache::descriptor_key;
use fetchkit_core::{ApiResult, Decoder, NormalizedError, QueryParams, RequestDescriptor};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;

use crate::client::ApiClient;
use crate::coordinator::FetchCoordinator;

/// What a caller renders: the last good data plus loading and error flags
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<NormalizedError>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
        }
    }
}

/// A cached GET bound to one URL, parameter set and decoder.
///
/// Data from a previous success is kept when a later fetch fails, so
/// `state()` can report the error next to possibly stale data.
pub struct QueryHandle<T> {
    client: ApiClient,
    coordinator: FetchCoordinator,
    descriptor: RequestDescriptor,
    key: String,
    decoder: Arc<dyn Decoder<T>>,
    ttl: Option<Duration>,
    state: watch::Sender<QueryState<T>>,
}

impl<T> QueryHandle<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(
        client: ApiClient,
        coordinator: FetchCoordinator,
        url: impl Into<String>,
        decoder: Arc<dyn Decoder<T>>,
    ) -> Self {
        let descriptor = RequestDescriptor::get(url);
        let key = descriptor_key(&descriptor);
        let (state, _) = watch::channel(QueryState::default());

        Self {
            client,
            coordinator,
            descriptor,
            key,
            decoder,
            ttl: None,
            state,
        }
    }

    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.descriptor.params = Some(params);
        self.key = descriptor_key(&self.descriptor);
        self
    }

    /// Freshness window for this query instead of the coordinator default
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current state; before the first fetch, data comes from the store
    /// regardless of age
    pub async fn state(&self) -> QueryState<T> {
        let mut state = self.state.borrow().clone();
        if state.data.is_none() {
            state.data = self.coordinator.cached(&self.key).await;
        }
        state
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    /// Fetch through the cache
    pub async fn execute(&self) -> ApiResult<T> {
        self.run(false).await
    }

    /// Fetch from the network and overwrite the cached entry
    pub async fn refetch(&self) -> ApiResult<T> {
        self.run(true).await
    }

    /// Drop the cached entry, then fetch again
    pub async fn invalidate_cache(&self) -> ApiResult<T> {
        self.coordinator.invalidate_cache(&self.key).await;
        self.refetch().await
    }

    async fn run(&self, force: bool) -> ApiResult<T> {
        self.state.send_modify(|state| {
            state.is_loading = true;
            state.error = None;
        });

        let client = self.client.clone();
        let descriptor = self.descriptor.clone();
        let decoder = Arc::clone(&self.decoder);
        let producer =
            move || async move { client.execute(&descriptor, decoder.as_ref()).await };

        let result = if force {
            self.coordinator.refresh(&self.key, producer).await
        } else {
            self.coordinator
                .fetch_data(&self.key, producer, self.ttl)
                .await
        };

        self.state.send_modify(|state| {
            state.is_loading = false;
            match &result {
                Ok(data) => {
                    state.data = Some(data.clone());
                    state.error = None;
                }
                Err(error) => state.error = Some(error.clone()),
            }
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::SerdeDecoder;
    use crate::transport::{HttpRequest, RawResponse, Transport, TransportError};
    use async_trait::async_trait;
    use fetchkit_cache::CacheStore;
    use fetchkit_core::ErrorKind;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::advance;
    use url::Url;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Todo {
        id: u32,
        title: String,
    }

    /// Plays back responses in order, repeating the last one
    struct Playback {
        responses: Mutex<Vec<RawResponse>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for Playback {
        async fn send(&self, _request: HttpRequest) -> Result<RawResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                Ok(responses.remove(0))
            } else {
                Ok(responses[0].clone())
            }
        }
    }

    fn setup(responses: Vec<RawResponse>) -> (Arc<Playback>, QueryHandle<Todo>) {
        let transport = Arc::new(Playback {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        });
        let client = ApiClient::with_transport(
            Some(Url::parse("https://api.test").unwrap()),
            transport.clone(),
        );
        let coordinator = FetchCoordinator::new(Arc::new(CacheStore::new(10)));
        let handle = QueryHandle::new(
            client,
            coordinator,
            "/todos/1",
            Arc::new(SerdeDecoder::<Todo>::new()),
        );
        (transport, handle)
    }

    fn todo_response(title: &str) -> RawResponse {
        RawResponse::new(200, format!(r#"{{"id":1,"title":"{title}"}}"#))
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_uses_cache() {
        let (transport, handle) = setup(vec![todo_response("first")]);

        let first = handle.execute().await.unwrap();
        let second = handle.execute().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

        let state = handle.state().await;
        assert_eq!(state.data, Some(first));
        assert!(!state.is_loading);
        assert!(state.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_goes_to_network() {
        let (transport, handle) = setup(vec![todo_response("first"), todo_response("second")]);

        handle.execute().await.unwrap();
        let refetched = handle.refetch().await.unwrap();

        assert_eq!(refetched.title, "second");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(handle.execute().await.unwrap().title, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_cache_refetches() {
        let (transport, handle) = setup(vec![todo_response("first"), todo_response("second")]);

        handle.execute().await.unwrap();
        let after = handle.invalidate_cache().await.unwrap();

        assert_eq!(after.title, "second");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_stale_data() {
        let (_, handle) = setup(vec![
            todo_response("cached"),
            RawResponse::new(503, r#"{"message":"maintenance"}"#),
        ]);
        let handle = handle.with_ttl(Duration::from_secs(1));

        handle.execute().await.unwrap();
        advance(Duration::from_secs(2)).await;
        let error = handle.execute().await.unwrap_err();

        assert_eq!(error.kind, ErrorKind::ServiceUnavailable);
        let state = handle.state().await;
        assert_eq!(state.data.map(|todo| todo.title), Some("cached".to_string()));
        assert_eq!(state.error, Some(error));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_is_seeded_from_store() {
        let (_, handle) = setup(vec![todo_response("unused")]);
        handle
            .coordinator
            .store()
            .write(
                "/todos/1",
                serde_json::json!({"id": 1, "title": "from another view"}),
            )
            .await;

        let state = handle.state().await;
        assert_eq!(
            state.data.map(|todo| todo.title),
            Some("from another view".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_fetch_clears_previous_error() {
        let (_, handle) = setup(vec![
            RawResponse::new(503, r#"{"message":"maintenance"}"#),
            todo_response("back"),
        ]);
        handle.execute().await.unwrap_err();
        assert!(handle.state().await.error.is_some());

        let states = handle.subscribe();
        let (result, during) = futures::join!(handle.execute(), async {
            states.borrow().clone()
        });

        assert!(during.is_loading);
        assert!(during.error.is_none());
        assert_eq!(result.unwrap().title, "back");
        assert!(handle.state().await.error.is_none());
    }

    #[test]
    fn test_key_includes_params() {
        let (_, handle) = setup(vec![todo_response("x")]);
        let handle = handle.with_params(QueryParams::new().with("b", 2).with("a", 1));
        assert_eq!(handle.key(), "/todos/1?a=1&b=2");
    }
}
