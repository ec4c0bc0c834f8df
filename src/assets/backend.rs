//! Object store backends
//!
//! Binary payloads move through the [`ObjectBackend`] seam.
//! [`RestObjectBackend`] talks to the remote object store;
//! [`MemoryObjectBackend`] holds objects in process and records every call
//! for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use super::Bucket;

/// Errors crossing the asset seam
#[derive(Error, Debug)]
pub enum AssetError {
    /// Payload rejected before any network call
    #[error("payload of {size} bytes exceeds the {limit} byte upload limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Payload was not decodable base64
    #[error("upload payload is not valid base64: {0}")]
    InvalidPayload(#[from] base64::DecodeError),

    /// Uploads never overwrite; the path must be fresh
    #[error("an object already exists at {path}")]
    AlreadyExists { path: String },

    /// The object store was unreachable
    #[error("asset transport failure: {0}")]
    Transport(String),

    /// The object store answered with a non-success status
    #[error("object store rejected request ({status}): {message}")]
    Backend { status: u16, message: String },
}

impl From<reqwest::Error> for AssetError {
    fn from(err: reqwest::Error) -> Self {
        AssetError::Transport(err.to_string())
    }
}

pub type AssetResult<T> = Result<T, AssetError>;

/// Operations every object store backend provides
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Store `bytes` at `path`; fails if the path is taken
    async fn put(
        &self,
        bucket: Bucket,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> AssetResult<()>;

    /// Best-effort batch delete
    async fn remove(&self, bucket: Bucket, paths: &[String]) -> AssetResult<()>;

    /// All object paths in the bucket
    async fn list(&self, bucket: Bucket) -> AssetResult<Vec<String>>;
}

// ---------------------------------------------------------------------------
// REST backend
// ---------------------------------------------------------------------------

/// Backend speaking the remote object store API
/// (`{base}/storage/v1/object/...`), authenticated with a bearer key.
pub struct RestObjectBackend {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl RestObjectBackend {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> AssetResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn check(response: reqwest::Response, path: &str) -> AssetResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == reqwest::StatusCode::CONFLICT {
            return Err(AssetError::AlreadyExists {
                path: path.to_string(),
            });
        }
        let message = response.text().await.unwrap_or_default();
        Err(AssetError::Backend {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ObjectBackend for RestObjectBackend {
    async fn put(
        &self,
        bucket: Bucket,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> AssetResult<()> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            bucket.as_str(),
            path
        );
        let response = self
            .authed(self.client.post(&url))
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        Self::check(response, path).await
    }

    async fn remove(&self, bucket: Bucket, paths: &[String]) -> AssetResult<()> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, bucket.as_str());
        let response = self
            .authed(self.client.delete(&url))
            .json(&serde_json::json!({ "prefixes": paths }))
            .send()
            .await?;
        Self::check(response, "").await
    }

    async fn list(&self, bucket: Bucket) -> AssetResult<Vec<String>> {
        let url = format!(
            "{}/storage/v1/object/list/{}",
            self.base_url,
            bucket.as_str()
        );
        let response = self
            .authed(self.client.post(&url))
            .json(&serde_json::json!({ "prefix": "", "limit": 10_000 }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AssetError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        #[derive(serde::Deserialize)]
        struct Entry {
            name: String,
        }
        let entries = response.json::<Vec<Entry>>().await?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }
}

// ---------------------------------------------------------------------------
// Memory backend
// ---------------------------------------------------------------------------

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-process object store for tests, with an op log
#[derive(Default)]
pub struct MemoryObjectBackend {
    objects: Mutex<HashMap<(Bucket, String), Vec<u8>>>,
    ops: Mutex<Vec<String>>,
}

impl MemoryObjectBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the operations performed so far, oldest first
    pub fn ops(&self) -> Vec<String> {
        lock(&self.ops).clone()
    }

    /// Whether an object exists at (bucket, path)
    pub fn contains(&self, bucket: Bucket, path: &str) -> bool {
        lock(&self.objects).contains_key(&(bucket, path.to_string()))
    }
}

#[async_trait]
impl ObjectBackend for MemoryObjectBackend {
    async fn put(
        &self,
        bucket: Bucket,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> AssetResult<()> {
        lock(&self.ops).push(format!("put {} {}", bucket.as_str(), path));
        let mut objects = lock(&self.objects);
        let key = (bucket, path.to_string());
        if objects.contains_key(&key) {
            return Err(AssetError::AlreadyExists {
                path: path.to_string(),
            });
        }
        objects.insert(key, bytes);
        Ok(())
    }

    async fn remove(&self, bucket: Bucket, paths: &[String]) -> AssetResult<()> {
        for path in paths {
            lock(&self.ops).push(format!("remove {} {}", bucket.as_str(), path));
        }
        let mut objects = lock(&self.objects);
        for path in paths {
            objects.remove(&(bucket, path.clone()));
        }
        Ok(())
    }

    async fn list(&self, bucket: Bucket) -> AssetResult<Vec<String>> {
        lock(&self.ops).push(format!("list {}", bucket.as_str()));
        let objects = lock(&self.objects);
        let mut paths: Vec<String> = objects
            .keys()
            .filter(|(b, _)| *b == bucket)
            .map(|(_, path)| path.clone())
            .collect();
        paths.sort();
        Ok(paths)
    }
}
