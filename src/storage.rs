use async_trait::async_trait;
use aws_sdk_s3 as s3;
use axum::body::Bytes;
use s3::primitives::ByteStream;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::Semaphore;

use crate::error::StorageError;

// 1. StorageService Contract
/// StorageService
///
/// Abstract contract for the blob storage collaborator that receives submitted
/// lab reports. Swapped between the real S3 client (`S3StorageClient`) and the
/// in-memory `MockStorageService` without touching the submission controller.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Used in the `Env::Local` setup to
    /// provision the MinIO bucket.
    async fn ensure_bucket_exists(&self);

    /// Stores `bytes` under `key` and returns a durable location reference for
    /// the stored object.
    ///
    /// # Arguments
    /// * `key`: Object key hint (path + filename); sanitized before use.
    /// * `content_type`: The MIME type recorded on the object (e.g. "application/pdf").
    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError>;
}

// 2. The Real Implementation (S3/MinIO/Supabase)
/// S3StorageClient
///
/// Concrete implementation on the AWS SDK. Path-style addressing is forced so
/// the same client works against MinIO locally and the Supabase Storage S3
/// gateway in production.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    endpoint: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // Path-style (http://endpoint/bucket/key) is required by MinIO and Supabase.
            .force_path_style(true)
            .build();

        let client = s3::Client::from_conf(config);

        Self {
            client,
            bucket_name: bucket.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Path-style location of an object in the configured bucket.
    pub fn object_location(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket_name, key)
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// CreateBucket is idempotent on S3-compatible services; errors for an
    /// already existing bucket are ignored.
    async fn ensure_bucket_exists(&self) {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(error = %e, bucket = %self.bucket_name, "create_bucket skipped");
        }
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let key = sanitize_key(key);
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError(e.to_string()))?;

        tracing::info!(key = %key, size, "stored object");
        Ok(self.object_location(&key))
    }
}

/// sanitize_key
///
/// Removes directory navigation components (`..`, `.`) and empty segments from
/// a caller-provided key so uploads cannot escape their prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// In-memory `StorageService` used by unit and integration tests. Stored objects
/// are kept so tests can assert on what was uploaded.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    /// When set, each `put_object` waits for one permit before storing.
    gate: Option<Arc<Semaphore>>,
    objects: Arc<Mutex<HashMap<String, (String, Bytes)>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Uploads block until `release` lets them through.
    pub fn new_gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Lets `uploads` blocked or future uploads of a gated mock proceed.
    pub fn release(&self, uploads: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(uploads);
        }
    }

    /// Returns `(content_type, bytes)` of a stored object, if any.
    pub fn object(&self, key: &str) -> Option<(String, Bytes)> {
        self.objects
            .lock()
            .ok()
            .and_then(|objects| objects.get(key).cloned())
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| StorageError("mock storage gate closed".to_string()))?
                .forget();
        }

        if self.should_fail {
            return Err(StorageError(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }

        let sanitized_key = sanitize_key(key);
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StorageError("mock storage poisoned".to_string()))?;
        objects.insert(sanitized_key.clone(), (content_type.to_string(), bytes));

        // Deterministic, local-style location for assertions.
        Ok(format!("http://localhost:9000/mock-bucket/{}", sanitized_key))
    }
}

/// StorageState
///
/// Shared handle to the storage collaborator.
pub type StorageState = Arc<dyn StorageService>;
