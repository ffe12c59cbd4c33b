//! MergeService — assembles previously uploaded chunks into one final object
//! and garbage-collects the temporaries.
//!
//! One merge moves through Downloading -> Assembling -> Uploading -> Cleaning.
//! Any unreadable chunk aborts before anything is written; a failed upload
//! leaves the chunks in place so the merge can be retried cheaply; a failed
//! cleanup is logged and does not change the outcome. Nothing ever rolls back
//! a successful upload.

use bytes::Bytes;
use futures::{StreamExt, pin_mut, stream};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::upload::{FileCategory, chunk_key};
use crate::services::storage_client::{StorageClient, StorageError};

/// Upper bound on concurrent chunk downloads per merge.
const MAX_PARALLEL_DOWNLOADS: usize = 4;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error("chunk {index} is missing or unreadable")]
    ChunkMissing {
        index: u32,
        #[source]
        source: StorageError,
    },
    #[error("failed to upload merged object")]
    Upload(#[source] StorageError),
}

pub type MergeResult<T> = Result<T, MergeError>;

/// Outcome of a successful merge.
#[derive(Debug)]
pub struct MergedObject {
    /// Durable public URL of the final object.
    pub public_url: String,
    /// Total size of the assembled bytes.
    pub size_bytes: usize,
}

/// Assembles chunk objects into final objects. One routine for every file
/// category; bucket and content type are parameters, not variants.
pub struct MergeService {
    storage: Arc<dyn StorageClient>,
}

impl MergeService {
    pub fn new(storage: Arc<dyn StorageClient>) -> Self {
        Self { storage }
    }

    /// Download chunks `0..total_chunks` of `file_id`, concatenate them in
    /// index order, upload the result to `final_path`, then delete the
    /// temporary chunks.
    ///
    /// Every chunk must already exist; the caller is responsible for having
    /// completed all chunk PUTs first. Upload is upsert-style, so retrying a
    /// merge with the same inputs overwrites any earlier result.
    pub async fn merge_chunks(
        &self,
        bucket: &str,
        file_id: &str,
        total_chunks: u32,
        final_path: &str,
        category: FileCategory,
    ) -> MergeResult<MergedObject> {
        if file_id.trim().is_empty() {
            return Err(MergeError::InvalidInput("fileId must be non-empty".into()));
        }
        if final_path.trim().is_empty() {
            return Err(MergeError::InvalidInput(
                "finalPath must be non-empty".into(),
            ));
        }
        if total_chunks < 1 {
            return Err(MergeError::InvalidInput(
                "totalChunks must be at least 1".into(),
            ));
        }

        let keys: Vec<String> = (0..total_chunks).map(|i| chunk_key(file_id, i)).collect();

        info!(file_id, total_chunks, bucket, final_path, "merging chunks");

        // Bounded fan-out; `buffered` preserves index order, so the first
        // error observed is the lowest failing index.
        let downloads = stream::iter(keys.iter().cloned().enumerate().map(|(index, key)| {
            let storage = Arc::clone(&self.storage);
            let bucket = bucket.to_string();
            async move { (index, storage.get(&bucket, &key).await) }
        }))
        .buffered(MAX_PARALLEL_DOWNLOADS);
        pin_mut!(downloads);

        let mut chunks: Vec<Bytes> = Vec::with_capacity(total_chunks as usize);
        while let Some((index, result)) = downloads.next().await {
            match result {
                Ok(bytes) => {
                    debug!(file_id, index, len = bytes.len(), "downloaded chunk");
                    chunks.push(bytes);
                }
                Err(source) => {
                    return Err(MergeError::ChunkMissing {
                        index: index as u32,
                        source,
                    });
                }
            }
        }

        // Single exact-size allocation; each chunk lands at its precomputed
        // offset, no reallocation.
        let size_bytes: usize = chunks.iter().map(Bytes::len).sum();
        let mut merged = vec![0u8; size_bytes];
        let mut offset = 0;
        for chunk in &chunks {
            merged[offset..offset + chunk.len()].copy_from_slice(chunk);
            offset += chunk.len();
        }

        let content_type = category.content_type();
        self.storage
            .put(bucket, final_path, Bytes::from(merged), content_type)
            .await
            .map_err(MergeError::Upload)?;

        info!(file_id, final_path, size_bytes, content_type, "merged object stored");

        // Cleanup failure is non-fatal: the final object is already durable,
        // orphaned chunks are left for an out-of-band reaper.
        if let Err(err) = self.storage.remove_many(bucket, &keys).await {
            warn!(file_id, error = %err, "chunk cleanup failed after successful merge");
        }

        Ok(MergedObject {
            public_url: self.storage.public_url(bucket, final_path),
            size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage_client::testing::MemoryStorageClient;
    use sha2::{Digest, Sha256};

    fn patterned(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
    }

    fn stage_chunks(client: &MemoryStorageClient, file_id: &str, chunks: &[Vec<u8>]) {
        for (i, chunk) in chunks.iter().enumerate() {
            client.insert("media", &chunk_key(file_id, i as u32), chunk.clone());
        }
    }

    #[tokio::test]
    async fn three_chunk_image_round_trip() {
        let client = Arc::new(MemoryStorageClient::new());
        let chunks = vec![patterned(100, 1), patterned(150, 7), patterned(90, 13)];
        stage_chunks(&client, "abc123", &chunks);

        let merged = MergeService::new(client.clone())
            .merge_chunks("media", "abc123", 3, "photos/final.jpg", FileCategory::Image)
            .await
            .unwrap();

        assert_eq!(merged.size_bytes, 340);
        assert_eq!(merged.public_url, "memory://media/photos/final.jpg");

        let (body, content_type) = client.object("media", "photos/final.jpg").unwrap();
        assert_eq!(content_type, "image/jpeg");
        assert_eq!(body.len(), 340);

        // Byte fidelity: hash of the stored object equals the hash of the
        // manual concatenation in index order.
        let expected: Vec<u8> = chunks.concat();
        assert_eq!(Sha256::digest(&body[..]), Sha256::digest(&expected));

        // Temporary chunks are gone.
        for i in 0..3 {
            assert!(!client.contains("media", &chunk_key("abc123", i)));
        }
    }

    #[tokio::test]
    async fn missing_chunk_aborts_with_its_index() {
        let client = Arc::new(MemoryStorageClient::new());
        client.insert("media", &chunk_key("abc123", 0), patterned(10, 1));
        // chunk_1 never uploaded
        client.insert("media", &chunk_key("abc123", 2), patterned(10, 3));

        let err = MergeService::new(client.clone())
            .merge_chunks("media", "abc123", 3, "photos/final.jpg", FileCategory::Image)
            .await
            .unwrap_err();

        match err {
            MergeError::ChunkMissing { index, .. } => assert_eq!(index, 1),
            other => panic!("expected ChunkMissing, got {:?}", other),
        }

        // No partial object was written and the staged chunks survive.
        assert!(!client.contains("media", "photos/final.jpg"));
        assert!(client.contains("media", &chunk_key("abc123", 0)));
        assert!(client.contains("media", &chunk_key("abc123", 2)));
    }

    #[tokio::test]
    async fn upload_failure_preserves_chunks_for_retry() {
        let mut client = MemoryStorageClient::new();
        client.fail_puts = true;
        let client = Arc::new(client);
        let chunks = vec![patterned(20, 1), patterned(20, 2)];
        stage_chunks(&client, "abc123", &chunks);

        let err = MergeService::new(client.clone())
            .merge_chunks("media", "abc123", 2, "docs/out.bin", FileCategory::Document)
            .await
            .unwrap_err();

        assert!(matches!(err, MergeError::Upload(_)));
        assert!(client.contains("media", &chunk_key("abc123", 0)));
        assert!(client.contains("media", &chunk_key("abc123", 1)));
    }

    #[tokio::test]
    async fn cleanup_failure_is_not_an_error() {
        let mut client = MemoryStorageClient::new();
        client.fail_removes = true;
        let client = Arc::new(client);
        stage_chunks(&client, "abc123", &[patterned(5, 1)]);

        let merged = MergeService::new(client.clone())
            .merge_chunks("media", "abc123", 1, "docs/out.bin", FileCategory::Other)
            .await
            .unwrap();

        assert_eq!(merged.size_bytes, 5);
        // The merge succeeded even though the chunk was left behind.
        assert!(client.contains("media", "docs/out.bin"));
        assert!(client.contains("media", &chunk_key("abc123", 0)));
    }

    #[tokio::test]
    async fn video_category_sets_video_content_type() {
        let client = Arc::new(MemoryStorageClient::new());
        stage_chunks(&client, "vid1", &[patterned(8, 1), patterned(8, 2)]);

        MergeService::new(client.clone())
            .merge_chunks("media", "vid1", 2, "videos/clip.mp4", FileCategory::Video)
            .await
            .unwrap();

        let (_, content_type) = client.object("media", "videos/clip.mp4").unwrap();
        assert_eq!(content_type, "video/mp4");
    }

    #[tokio::test]
    async fn rejects_invalid_inputs() {
        let client = Arc::new(MemoryStorageClient::new());
        let service = MergeService::new(client);

        assert!(matches!(
            service
                .merge_chunks("media", "", 1, "out", FileCategory::Image)
                .await,
            Err(MergeError::InvalidInput(_))
        ));
        assert!(matches!(
            service
                .merge_chunks("media", "abc", 0, "out", FileCategory::Image)
                .await,
            Err(MergeError::InvalidInput(_))
        ));
        assert!(matches!(
            service
                .merge_chunks("media", "abc", 1, "  ", FileCategory::Image)
                .await,
            Err(MergeError::InvalidInput(_))
        ));
    }
}
