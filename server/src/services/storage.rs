//! Object storage for generated artifacts.
//!
//! Production uses Supabase Storage over its REST API. Objects are written
//! with upsert semantics so a retried upload of the same name is harmless.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::retry::{retry_with_backoff, RetryPolicy};
use crate::config::StorageConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("storage responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("object {bucket}/{name} not found")]
    NotFound { bucket: String, name: String },
}

impl StorageError {
    /// Transport failures and server-side errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => (500..600).contains(status),
            Self::NotFound { .. } => false,
        }
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `bucket/name`, replacing any existing object, and
    /// returns the public URL.
    async fn put(
        &self,
        bucket: &str,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    async fn get(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StorageError>;

    async fn delete(&self, bucket: &str, name: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    service_key: String,
    retry: RetryPolicy,
}

impl SupabaseStore {
    pub fn new(config: &StorageConfig, retry: RetryPolicy) -> Result<Self, StorageError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            retry,
        })
    }

    pub fn public_url(&self, bucket: &str, name: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, name)
    }

    fn object_url(&self, bucket: &str, name: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, name)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ObjectStore for SupabaseStore {
    async fn put(
        &self,
        bucket: &str,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let url = &self.object_url(bucket, name);
        let bytes = &bytes;
        retry_with_backoff(&self.retry, StorageError::is_retryable, || async move {
            let request = self
                .client
                .post(url)
                .header("content-type", content_type)
                .header("x-upsert", "true")
                .body(bytes.clone());
            check(self.authorized(request).send().await?).await
        })
        .await?;

        tracing::debug!(bucket, name, "object stored");
        Ok(self.public_url(bucket, name))
    }

    async fn get(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StorageError> {
        let url = &self.object_url(bucket, name);
        let response = retry_with_backoff(&self.retry, StorageError::is_retryable, || async move {
            let response = self.authorized(self.client.get(url)).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(StorageError::NotFound {
                    bucket: bucket.to_string(),
                    name: name.to_string(),
                });
            }
            check(response).await
        })
        .await?;

        Ok(response.bytes().await?.to_vec())
    }

    async fn delete(&self, bucket: &str, name: &str) -> Result<(), StorageError> {
        let url = &format!("{}/storage/v1/object/{}", self.base_url, bucket);
        let body = &serde_json::json!({ "prefixes": [name] });
        retry_with_backoff(&self.retry, StorageError::is_retryable, || async move {
            let request = self.client.delete(url).json(body);
            check(self.authorized(request).send().await?).await
        })
        .await?;
        Ok(())
    }
}

/// Process-local store. Used when exercising the pipeline without network
/// access; URLs use the `memory://` scheme.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, bucket: &str, name: &str) -> bool {
        self.objects
            .lock()
            .contains_key(&(bucket.to_string(), name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    pub fn public_url(bucket: &str, name: &str) -> String {
        format!("memory://{}/{}", bucket, name)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        bucket: &str,
        name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        self.objects
            .lock()
            .insert((bucket.to_string(), name.to_string()), bytes);
        Ok(Self::public_url(bucket, name))
    }

    async fn get(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            })
    }

    async fn delete(&self, bucket: &str, name: &str) -> Result<(), StorageError> {
        self.objects
            .lock()
            .remove(&(bucket.to_string(), name.to_string()));
        Ok(())
    }
}
