use std::fmt;
use std::sync::Arc;

use fetchkit_core::{
    ApiResult, Decoder, ErrorContext, MutationMethod, NormalizedError, QueryParams,
    RequestDescriptor,
};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::client::ApiClient;
use crate::coordinator::FetchCoordinator;
use crate::query::QueryState;

type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&NormalizedError) + Send + Sync>;

/// A state-changing request bound to one method, URL and decoder.
///
/// Mutations never read or write the response cache. After a success the
/// keys registered with [`invalidates`](Self::invalidates) are dropped so the
/// next GET for them goes to the network.
pub struct MutationHandle<T> {
    client: ApiClient,
    coordinator: FetchCoordinator,
    method: MutationMethod,
    url: String,
    params: Option<QueryParams>,
    decoder: Arc<dyn Decoder<T>>,
    invalidates: Vec<String>,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
    state: watch::Sender<QueryState<T>>,
}

impl<T> fmt::Debug for MutationHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationHandle")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("invalidates", &self.invalidates)
            .finish_non_exhaustive()
    }
}

impl<T> MutationHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(
        client: ApiClient,
        coordinator: FetchCoordinator,
        method: MutationMethod,
        url: impl Into<String>,
        decoder: Arc<dyn Decoder<T>>,
    ) -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            client,
            coordinator,
            method,
            url: url.into(),
            params: None,
            decoder,
            invalidates: Vec::new(),
            on_success: None,
            on_error: None,
            state,
        }
    }

    /// Query string for DELETE; other methods ignore it
    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Cache key to drop after every successful mutation
    pub fn invalidates(mut self, key: impl Into<String>) -> Self {
        self.invalidates.push(key.into());
        self
    }

    /// Called with the decoded response after a success
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&NormalizedError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    /// Send `body` as the JSON payload
    pub async fn mutate<B>(&self, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body).context("Failed to serialize mutation body")?;
        self.run(Some(body)).await
    }

    /// Send without a payload, e.g. a DELETE
    pub async fn send(&self) -> ApiResult<T> {
        self.run(None).await
    }

    async fn run(&self, body: Option<serde_json::Value>) -> ApiResult<T> {
        let mut descriptor = RequestDescriptor::new(self.method.into(), &self.url);
        descriptor.params = self.params.clone();
        descriptor.body = body;

        self.state.send_modify(|state| {
            state.is_loading = true;
            state.error = None;
        });

        let result = self
            .coordinator
            .mutate(|| self.client.execute(&descriptor, self.decoder.as_ref()))
            .await;

        if result.is_ok() {
            for key in &self.invalidates {
                if self.coordinator.invalidate_cache(key).await {
                    debug!(key = %key, method = %self.method, "Invalidated after mutation");
                }
            }
        }

        self.state.send_modify(|state| {
            state.is_loading = false;
            match &result {
                Ok(data) => state.data = Some(data.clone()),
                Err(error) => state.error = Some(error.clone()),
            }
        });

        result
            .inspect(|data| {
                if let Some(callback) = &self.on_success {
                    callback(data);
                }
            })
            .inspect_err(|error| {
                if let Some(callback) = &self.on_error {
                    callback(error);
                }
            })
    }
}
