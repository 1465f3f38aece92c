//! Remote memory service client
//! All bundle and memory persistence goes through this REST API; the trait
//! seam lets tests substitute an in-memory fake

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::model::{Bundle, BundleCreate, BundlePatch, MemoryCreate, MemoryItem, MemoryPatch};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Asynchronous persistence operations the workspace core depends on
///
/// Every call may fail with a transport or server error; the core never
/// retries on its own.
#[async_trait]
pub trait MemoryService: Send + Sync {
    async fn list_bundles(&self, owner_id: Uuid) -> Result<Vec<Bundle>, ServiceError>;
    async fn list_memories(&self, bundle_id: Uuid) -> Result<Vec<MemoryItem>, ServiceError>;
    async fn create_bundle(&self, payload: &BundleCreate) -> Result<Bundle, ServiceError>;
    async fn update_bundle(
        &self,
        bundle_id: Uuid,
        patch: &BundlePatch,
    ) -> Result<Bundle, ServiceError>;
    async fn delete_bundle(&self, bundle_id: Uuid) -> Result<(), ServiceError>;
    async fn create_memory(
        &self,
        bundle_id: Uuid,
        payload: &MemoryCreate,
    ) -> Result<MemoryItem, ServiceError>;
    async fn update_memory(
        &self,
        bundle_id: Uuid,
        memory_id: Uuid,
        patch: &MemoryPatch,
    ) -> Result<MemoryItem, ServiceError>;
    async fn delete_memory(&self, bundle_id: Uuid, memory_id: Uuid) -> Result<(), ServiceError>;
}

/// REST client for the memory backend
pub struct HttpMemoryService {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpMemoryService {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ServiceError::Config(format!("bad base URL {}: {}", config.base_url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                // Extremely unlikely, but avoid panicking in production.
                tracing::error!("Failed to build HTTP client, using default client: {}", e);
                Client::new()
            });

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|e| ServiceError::Config(format!("bad endpoint {}: {}", path, e)))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Turn a non-2xx response into a ServiceError with a body snippet
    async fn check(resp: Response) -> Result<Response, ServiceError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        Err(ServiceError::Status {
            status: status.as_u16(),
            body: snippet,
        })
    }
}

#[async_trait]
impl MemoryService for HttpMemoryService {
    async fn list_bundles(&self, owner_id: Uuid) -> Result<Vec<Bundle>, ServiceError> {
        let mut url = self.endpoint("/bundles/")?;
        url.query_pairs_mut()
            .append_pair("user_id", &owner_id.to_string());
        let resp = self.authorize(self.client.get(url)).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn list_memories(&self, bundle_id: Uuid) -> Result<Vec<MemoryItem>, ServiceError> {
        let url = self.endpoint(&format!("/bundles/{}/memories", bundle_id))?;
        let resp = self.authorize(self.client.get(url)).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn create_bundle(&self, payload: &BundleCreate) -> Result<Bundle, ServiceError> {
        let url = self.endpoint("/bundles/")?;
        let resp = self
            .authorize(self.client.post(url))
            .json(payload)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn update_bundle(
        &self,
        bundle_id: Uuid,
        patch: &BundlePatch,
    ) -> Result<Bundle, ServiceError> {
        let url = self.endpoint(&format!("/bundles/{}", bundle_id))?;
        let resp = self
            .authorize(self.client.patch(url))
            .json(patch)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn delete_bundle(&self, bundle_id: Uuid) -> Result<(), ServiceError> {
        let url = self.endpoint(&format!("/bundles/{}", bundle_id))?;
        let resp = self.authorize(self.client.delete(url)).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn create_memory(
        &self,
        bundle_id: Uuid,
        payload: &MemoryCreate,
    ) -> Result<MemoryItem, ServiceError> {
        let url = self.endpoint(&format!("/bundles/{}/memories", bundle_id))?;
        let resp = self
            .authorize(self.client.post(url))
            .json(payload)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn update_memory(
        &self,
        bundle_id: Uuid,
        memory_id: Uuid,
        patch: &MemoryPatch,
    ) -> Result<MemoryItem, ServiceError> {
        let url = self.endpoint(&format!("/bundles/{}/memories/{}", bundle_id, memory_id))?;
        let resp = self
            .authorize(self.client.patch(url))
            .json(patch)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn delete_memory(&self, bundle_id: Uuid, memory_id: Uuid) -> Result<(), ServiceError> {
        let url = self.endpoint(&format!("/bundles/{}/memories/{}", bundle_id, memory_id))?;
        let resp = self.authorize(self.client.delete(url)).send().await?;
        Self::check(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        let service = HttpMemoryService::new(&ServiceConfig::default()).unwrap();
        let id = Uuid::new_v4();
        let url = service
            .endpoint(&format!("/bundles/{}/memories", id))
            .unwrap();
        assert_eq!(url.path(), format!("/bundles/{}/memories", id));
    }
}
