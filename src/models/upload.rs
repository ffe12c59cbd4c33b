//! Request and response bodies for the chunked-upload coordination endpoints,
//! plus the shared temporary-chunk naming convention.

use serde::{Deserialize, Serialize};

/// Declared category of the file being assembled.
///
/// Drives the content type the merged object is stored with. Unknown
/// categories deserialize to `Other` rather than failing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Video,
    Document,
    #[serde(other)]
    Other,
}

impl FileCategory {
    /// Content type the merged object is uploaded with.
    pub fn content_type(self) -> &'static str {
        match self {
            FileCategory::Image => "image/jpeg",
            FileCategory::Video => "video/mp4",
            FileCategory::Document | FileCategory::Other => "application/octet-stream",
        }
    }
}

/// Temporary object key for chunk `index` of upload `file_id`.
///
/// URL issuing and chunk merging never call each other; this naming
/// convention is the only thing they agree on. The storage namespace under
/// this prefix *is* the upload session state — nothing else is persisted.
pub fn chunk_key(file_id: &str, index: u32) -> String {
    format!("temp/chunks/{}/chunk_{}", file_id, index)
}

/// Body of `POST /issue-upload-urls`.
///
/// Required fields are `Option` so missing values surface as a 400 with the
/// documented JSON error shape instead of a body-rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueUploadUrlsRequest {
    /// Client-generated opaque upload identifier, unique per attempt.
    pub file_id: Option<String>,

    /// Number of chunks the client will PUT. Must be >= 1.
    pub total_chunks: Option<u32>,

    /// Target bucket for both the temporary chunks and the final object.
    pub bucket_name: Option<String>,

    /// Literal object path for the non-chunked fast path
    /// (honored only when `total_chunks == 1`).
    pub file_path: Option<String>,
}

/// Success body of `POST /issue-upload-urls`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueUploadUrlsResponse {
    pub success: bool,
    /// One presigned PUT URL per chunk, in ascending chunk-index order.
    pub urls: Vec<String>,
    pub file_id: String,
    pub total_chunks: u32,
    pub bucket_name: String,
    pub message: String,
}

/// Body of `POST /merge-chunks`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeChunksRequest {
    /// Upload identifier the chunks were staged under.
    pub file_id: Option<String>,

    /// Number of chunks that must already exist in temporary storage.
    pub total_chunks: Option<u32>,

    /// Destination object key for the assembled file.
    pub final_path: Option<String>,

    /// Declared category; selects the stored content type.
    pub file_category: Option<FileCategory>,
}

/// Success body of `POST /merge-chunks`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeChunksResponse {
    pub success: bool,
    /// The destination key, echoed back.
    pub file_url: String,
    /// Durable public URL of the merged object.
    pub public_url: String,
    pub message: String,
}
