//! Storage-client abstraction over the S3-compatible gateway.
//!
//! `StorageClient` is the seam the merge service works against; the real
//! implementation dispatches SigV4 header-signed requests with `reqwest`.
//! Deleting a key that no longer exists is success, not an error — merge
//! retries depend on that.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::StorageConfig;
use crate::services::sigv4::{self, Credentials, Endpoint, SignError};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("storage responded with status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
    #[error(transparent)]
    Sign(#[from] SignError),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Minimal object-store capability the merge pipeline needs.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Read an object fully into memory.
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes>;

    /// Upsert-style write: overwrites any existing object at `key`.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Batch delete. Idempotent: already-deleted keys count as removed.
    async fn remove_many(&self, bucket: &str, keys: &[String]) -> StorageResult<()>;

    /// Durable public URL for an object.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// SigV4 header-signing client for the S3-compatible gateway.
pub struct S3StorageClient {
    client: Client,
    endpoint: Endpoint,
    creds: Credentials,
    public_base: String,
}

impl S3StorageClient {
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let endpoint = Endpoint::parse(&config.endpoint)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            creds: Credentials {
                access_key_id: config.access_key_id.clone(),
                secret_access_key: config.secret_access_key.clone(),
                region: config.region.clone(),
            },
            public_base: config.public_base.trim_end_matches('/').to_string(),
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}{}",
            self.endpoint.base_url(),
            self.endpoint.dispatch_path(bucket, key)
        )
    }

    /// Dispatch one signed request against an object key.
    async fn send(
        &self,
        method: reqwest::Method,
        bucket: &str,
        key: &str,
        body: Option<Bytes>,
        content_type: Option<&str>,
    ) -> StorageResult<reqwest::Response> {
        let signed = sigv4::sign_headers(
            &self.endpoint,
            &self.creds,
            method.as_str(),
            bucket,
            key,
            body.as_deref(),
            Utc::now(),
        )?;

        let mut request = self
            .client
            .request(method, self.object_url(bucket, key))
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.content_sha256)
            .header("Authorization", &signed.authorization);
        if let Some(value) = content_type {
            request = request.header("Content-Type", value);
        }
        if let Some(bytes) = body {
            request = request.body(bytes);
        }

        Ok(request.send().await?)
    }
}

#[async_trait]
impl StorageClient for S3StorageClient {
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let response = self
            .send(reqwest::Method::GET, bucket, key, None, None)
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.bytes().await?),
            StatusCode::NOT_FOUND => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            status => Err(StorageError::UnexpectedStatus {
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        let response = self
            .send(
                reqwest::Method::PUT,
                bucket,
                key,
                Some(body),
                Some(content_type),
            )
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            status => Err(StorageError::UnexpectedStatus {
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn remove_many(&self, bucket: &str, keys: &[String]) -> StorageResult<()> {
        for key in keys {
            let response = self
                .send(reqwest::Method::DELETE, bucket, key, None, None)
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::NO_CONTENT | StatusCode::ACCEPTED => {}
                // Already gone counts as removed.
                StatusCode::NOT_FOUND => {
                    debug!(bucket, key = %key, "delete target already absent");
                }
                status => {
                    return Err(StorageError::UnexpectedStatus {
                        status,
                        body: response.text().await.unwrap_or_default(),
                    });
                }
            }
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_base,
            bucket,
            sigv4::encode_key_segments(key)
        )
    }
}

/// In-memory storage double for merge tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryStorageClient {
        objects: Mutex<HashMap<(String, String), (Bytes, String)>>,
        pub fail_puts: bool,
        pub fail_removes: bool,
    }

    impl MemoryStorageClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
            self.objects.lock().unwrap().insert(
                (bucket.to_string(), key.to_string()),
                (body.into(), "application/octet-stream".to_string()),
            );
        }

        pub fn object(&self, bucket: &str, key: &str) -> Option<(Bytes, String)> {
            self.objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
        }

        pub fn contains(&self, bucket: &str, key: &str) -> bool {
            self.object(bucket, key).is_some()
        }
    }

    #[async_trait]
    impl StorageClient for MemoryStorageClient {
        async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
            self.object(bucket, key)
                .map(|(body, _)| body)
                .ok_or_else(|| StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
        }

        async fn put(
            &self,
            bucket: &str,
            key: &str,
            body: Bytes,
            content_type: &str,
        ) -> StorageResult<()> {
            if self.fail_puts {
                return Err(StorageError::UnexpectedStatus {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: "simulated upload failure".into(),
                });
            }
            self.objects.lock().unwrap().insert(
                (bucket.to_string(), key.to_string()),
                (body, content_type.to_string()),
            );
            Ok(())
        }

        async fn remove_many(&self, bucket: &str, keys: &[String]) -> StorageResult<()> {
            if self.fail_removes {
                return Err(StorageError::UnexpectedStatus {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: "simulated delete failure".into(),
                });
            }
            let mut objects = self.objects.lock().unwrap();
            for key in keys {
                // Missing keys are fine: delete is idempotent.
                objects.remove(&(bucket.to_string(), key.clone()));
            }
            Ok(())
        }

        fn public_url(&self, bucket: &str, key: &str) -> String {
            format!("memory://{}/{}", bucket, key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryStorageClient;
    use super::*;

    fn test_config() -> StorageConfig {
        StorageConfig {
            endpoint: "https://project.example.co/storage/v1/s3".into(),
            region: "us-east-1".into(),
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "secret".into(),
            url_expiry_secs: 3600,
            public_base: "https://project.example.co/storage/v1/object/public".into(),
            media_bucket: "media".into(),
            document_bucket: "documents".into(),
        }
    }

    #[test]
    fn public_url_joins_base_bucket_and_encoded_key() {
        let client = S3StorageClient::new(&test_config()).unwrap();
        assert_eq!(
            client.public_url("media", "final/my photo.jpg"),
            "https://project.example.co/storage/v1/object/public/media/final/my%20photo.jpg"
        );
    }

    #[tokio::test]
    async fn memory_double_delete_is_idempotent() {
        let client = MemoryStorageClient::new();
        client.insert("media", "a", Bytes::from_static(b"x"));
        let keys = vec!["a".to_string(), "never-existed".to_string()];

        client.remove_many("media", &keys).await.unwrap();
        assert!(!client.contains("media", "a"));

        // Second pass over already-deleted keys must also succeed.
        client.remove_many("media", &keys).await.unwrap();
    }
}
