//! Latest-reading fetcher with cached resource discovery

use crate::{
    api::MeterApi,
    error::ApiError,
    types::{DiscoveredResource, MeterReading, ResourceKind},
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Fetches the most recent available reading for a resource kind.
///
/// The classifier-to-resource mapping is discovered on first use and cached
/// for the life of the fetcher; a kind absent from the account's mapping is
/// reported as [`ApiError::NotFound`], which is user-actionable and distinct
/// from transient failure.
pub struct ReadingFetcher {
    api: Arc<dyn MeterApi>,
    resources: RwLock<Option<HashMap<ResourceKind, DiscoveredResource>>>,
}

impl ReadingFetcher {
    pub fn new(api: Arc<dyn MeterApi>) -> Self {
        Self {
            api,
            resources: RwLock::new(None),
        }
    }

    /// Returns the account's resource map, discovering it once
    pub async fn discover(
        &self,
        token: &str,
    ) -> Result<HashMap<ResourceKind, DiscoveredResource>, ApiError> {
        if let Some(cached) = self.resources.read().await.as_ref() {
            return Ok(cached.clone());
        }

        let discovered = self.api.list_resources(token).await?;
        tracing::info!(count = discovered.len(), "discovered meter resources");
        *self.resources.write().await = Some(discovered.clone());
        Ok(discovered)
    }

    /// Fetches the latest available reading for one resource kind
    pub async fn fetch(&self, kind: ResourceKind, token: &str) -> Result<MeterReading, ApiError> {
        let resource = self
            .discover(token)
            .await?
            .remove(&kind)
            .ok_or(ApiError::NotFound(kind))?;

        self.api
            .latest_reading(token, &resource.resource_id, kind)
            .await
    }

    /// Drops the discovery cache so the next fetch rediscovers.
    ///
    /// Called when the account configuration is replaced.
    pub async fn reset(&self) {
        *self.resources.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;

    #[tokio::test]
    async fn test_discovery_is_cached_across_fetches() {
        let api = Arc::new(MockApi::healthy());
        let fetcher = ReadingFetcher::new(api.clone());

        let electricity = fetcher.fetch(ResourceKind::Electricity, "token").await.unwrap();
        let gas = fetcher.fetch(ResourceKind::Gas, "token").await.unwrap();

        assert!((electricity.usage_kwh - 10.5).abs() < 1e-9);
        assert!((gas.usage_kwh - 13.5).abs() < 1e-9);
        assert_eq!(api.resource_calls(), 1);
        assert_eq!(api.reading_calls(), 2);
    }

    #[tokio::test]
    async fn test_unlinked_kind_is_not_found() {
        let api = Arc::new(MockApi::healthy());
        api.unlink_resource(ResourceKind::Gas);
        let fetcher = ReadingFetcher::new(api.clone());

        let error = fetcher.fetch(ResourceKind::Gas, "token").await.unwrap_err();
        assert!(matches!(error, ApiError::NotFound(ResourceKind::Gas)));

        // The other kind keeps working off the same cached discovery
        assert!(fetcher.fetch(ResourceKind::Electricity, "token").await.is_ok());
        assert_eq!(api.resource_calls(), 1);
    }

    #[tokio::test]
    async fn test_reset_forces_rediscovery() {
        let api = Arc::new(MockApi::healthy());
        let fetcher = ReadingFetcher::new(api.clone());

        fetcher.fetch(ResourceKind::Electricity, "token").await.unwrap();
        fetcher.reset().await;
        fetcher.fetch(ResourceKind::Electricity, "token").await.unwrap();

        assert_eq!(api.resource_calls(), 2);
    }

    #[tokio::test]
    async fn test_discovery_failure_passes_through_and_is_not_cached() {
        let api = Arc::new(MockApi::healthy());
        api.set_resources(Err(ApiError::AuthRejected));
        let fetcher = ReadingFetcher::new(api.clone());

        let error = fetcher.fetch(ResourceKind::Electricity, "token").await.unwrap_err();
        assert!(matches!(error, ApiError::AuthRejected));

        // A later fetch retries discovery instead of serving a poisoned cache
        api.set_resources(Ok(HashMap::new()));
        let error = fetcher.fetch(ResourceKind::Electricity, "token").await.unwrap_err();
        assert!(matches!(error, ApiError::NotFound(ResourceKind::Electricity)));
        assert_eq!(api.resource_calls(), 2);
    }
}
