use std::sync::Arc;
use std::time::Duration;

use fetchkit_cache::{generate_key, CacheStore};
use fetchkit_core::{ApiResult, ConfigError, Decoder, MutationMethod, QueryParams};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::coordinator::{CoordinatorOptions, FetchCoordinator};
use crate::decoder::SerdeDecoder;
use crate::mutation::MutationHandle;
use crate::query::QueryHandle;

/// One client, one store and one coordinator wired together from a
/// [`ClientConfig`]; hands out query and mutation handles that share them
#[derive(Debug, Clone)]
pub struct FetchKit {
    client: ApiClient,
    coordinator: FetchCoordinator,
}

impl FetchKit {
    pub fn new(client: ApiClient, coordinator: FetchCoordinator) -> Self {
        Self {
            client,
            coordinator,
        }
    }

    /// Build everything from configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = ApiClient::from_config(config)?;
        Ok(Self::with_client(client, config))
    }

    /// Use an existing client; cache settings still come from `config`
    pub fn with_client(client: ApiClient, config: &ClientConfig) -> Self {
        let store = Arc::new(CacheStore::new(config.cache.max_entries));
        let options = CoordinatorOptions {
            default_ttl: config.default_ttl(),
            dedupe_in_flight: config.cache.dedupe_in_flight,
        };

        info!(
            base_url = ?config.base_url,
            max_entries = config.cache.max_entries,
            default_ttl_ms = config.cache.default_ttl_ms,
            dedupe_in_flight = config.cache.dedupe_in_flight,
            "FetchKit initialized"
        );
        Self::new(client, FetchCoordinator::with_options(store, options))
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        self.coordinator.store()
    }

    /// Cached GET decoded with serde
    pub fn query<T>(&self, url: impl Into<String>) -> QueryHandle<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.query_with(url, Arc::new(SerdeDecoder::new()))
    }

    pub fn query_with<T>(&self, url: impl Into<String>, decoder: Arc<dyn Decoder<T>>) -> QueryHandle<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        QueryHandle::new(self.client.clone(), self.coordinator.clone(), url, decoder)
    }

    /// Uncached state-changing request decoded with serde
    pub fn mutation<T>(&self, method: MutationMethod, url: impl Into<String>) -> MutationHandle<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.mutation_with(method, url, Arc::new(SerdeDecoder::new()))
    }

    pub fn mutation_with<T>(
        &self,
        method: MutationMethod,
        url: impl Into<String>,
        decoder: Arc<dyn Decoder<T>>,
    ) -> MutationHandle<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        MutationHandle::new(
            self.client.clone(),
            self.coordinator.clone(),
            method,
            url,
            decoder,
        )
    }

    /// One-off cached GET keyed by `url` and `params`
    pub async fn get<T>(
        &self,
        url: &str,
        params: Option<QueryParams>,
        ttl: Option<Duration>,
    ) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        let key = generate_key(url, params.as_ref());
        let client = self.client.clone();
        let url = url.to_string();

        self.coordinator
            .fetch_data(
                &key,
                move || async move { client.get::<T>(&url, params).await },
                ttl,
            )
            .await
    }

    /// Clear the store and refuse further writes
    pub async fn shutdown(&self) {
        self.store().dispose().await;
        info!("FetchKit shut down");
    }
}
