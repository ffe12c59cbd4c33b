//! SigningService — issues presigned PUT URLs for chunked uploads.
//!
//! Purely computational: issuing URLs never touches the object store and
//! mutates nothing, so concurrent calls (even for the same upload) are safe.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::config::StorageConfig;
use crate::models::upload::chunk_key;
use crate::services::sigv4::{self, Credentials, Endpoint, SignError};

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Sign(#[from] SignError),
}

pub type IssueResult<T> = Result<T, IssueError>;

/// Presigned-URL issuer for chunk uploads.
pub struct SigningService {
    endpoint: Endpoint,
    creds: Credentials,
    url_expiry_secs: u64,
}

impl SigningService {
    pub fn new(config: &StorageConfig) -> Result<Self, SignError> {
        Ok(Self {
            endpoint: Endpoint::parse(&config.endpoint)?,
            creds: Credentials {
                access_key_id: config.access_key_id.clone(),
                secret_access_key: config.secret_access_key.clone(),
                region: config.region.clone(),
            },
            url_expiry_secs: config.url_expiry_secs,
        })
    }

    /// Issue one presigned PUT URL per chunk of `file_id`, in ascending
    /// chunk-index order.
    ///
    /// With `total_chunks == 1` and a `single_file_path`, issues exactly one
    /// URL for that literal path instead of the temp-chunk convention.
    /// All URLs in one call share a single issue timestamp.
    pub fn issue_upload_urls(
        &self,
        file_id: &str,
        total_chunks: u32,
        bucket: &str,
        single_file_path: Option<&str>,
    ) -> IssueResult<Vec<String>> {
        self.issue_upload_urls_at(file_id, total_chunks, bucket, single_file_path, Utc::now())
    }

    fn issue_upload_urls_at(
        &self,
        file_id: &str,
        total_chunks: u32,
        bucket: &str,
        single_file_path: Option<&str>,
        now: DateTime<Utc>,
    ) -> IssueResult<Vec<String>> {
        if file_id.trim().is_empty() {
            return Err(IssueError::InvalidInput("fileId must be non-empty".into()));
        }
        if bucket.trim().is_empty() {
            return Err(IssueError::InvalidInput(
                "bucketName must be non-empty".into(),
            ));
        }
        if total_chunks < 1 {
            return Err(IssueError::InvalidInput(
                "totalChunks must be at least 1".into(),
            ));
        }

        let keys: Vec<String> = match single_file_path {
            Some(path) if total_chunks == 1 && !path.trim().is_empty() => vec![path.to_string()],
            _ => (0..total_chunks).map(|i| chunk_key(file_id, i)).collect(),
        };

        let urls = keys
            .iter()
            .map(|key| {
                sigv4::presign_put(
                    &self.endpoint,
                    &self.creds,
                    bucket,
                    key,
                    self.url_expiry_secs,
                    now,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            file_id,
            total_chunks,
            bucket,
            expiry_secs = self.url_expiry_secs,
            "issued presigned upload URLs"
        );
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn service() -> SigningService {
        SigningService::new(&StorageConfig {
            endpoint: "https://project.example.co/storage/v1/s3".into(),
            region: "us-east-1".into(),
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "secret-key-material".into(),
            url_expiry_secs: 3600,
            public_base: "https://project.example.co/storage/v1/object/public".into(),
            media_bucket: "media".into(),
            document_bucket: "documents".into(),
        })
        .unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 45).unwrap()
    }

    #[test]
    fn issues_one_url_per_chunk_in_index_order() {
        let urls = service()
            .issue_upload_urls_at("abc123", 3, "media", None, fixed_now())
            .unwrap();

        assert_eq!(urls.len(), 3);
        for (i, url) in urls.iter().enumerate() {
            assert!(
                url.contains(&format!("/media/temp/chunks/abc123/chunk_{}?", i)),
                "url {} addresses the wrong chunk: {}",
                i,
                url
            );
        }
    }

    #[test]
    fn single_chunk_fast_path_uses_literal_path() {
        let urls = service()
            .issue_upload_urls_at("abc123", 1, "media", Some("avatars/user42.jpg"), fixed_now())
            .unwrap();

        assert_eq!(urls.len(), 1);
        assert!(urls[0].contains("/media/avatars/user42.jpg?"));
        assert!(!urls[0].contains("temp/chunks"));
    }

    #[test]
    fn file_path_ignored_when_chunked() {
        let urls = service()
            .issue_upload_urls_at("abc123", 2, "media", Some("avatars/user42.jpg"), fixed_now())
            .unwrap();

        assert_eq!(urls.len(), 2);
        assert!(urls[0].contains("temp/chunks/abc123/chunk_0"));
        assert!(urls[1].contains("temp/chunks/abc123/chunk_1"));
    }

    #[test]
    fn repeated_calls_are_byte_identical() {
        let svc = service();
        let a = svc
            .issue_upload_urls_at("abc123", 2, "media", None, fixed_now())
            .unwrap();
        let b = svc
            .issue_upload_urls_at("abc123", 2, "media", None, fixed_now())
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_inputs() {
        let svc = service();
        assert!(matches!(
            svc.issue_upload_urls("", 1, "media", None),
            Err(IssueError::InvalidInput(_))
        ));
        assert!(matches!(
            svc.issue_upload_urls("abc", 1, "", None),
            Err(IssueError::InvalidInput(_))
        ));
        assert!(matches!(
            svc.issue_upload_urls("abc", 0, "media", None),
            Err(IssueError::InvalidInput(_))
        ));
    }
}
