//! HTTP handlers for the upload-coordination operations.
//! Validates caller input (400s) and delegates to the signing and merge
//! services; CORS preflight is handled by the router layer.

use axum::{Json, extract::State};
use tracing::info;

use crate::errors::ApiError;
use crate::models::upload::{
    FileCategory, IssueUploadUrlsRequest, IssueUploadUrlsResponse, MergeChunksRequest,
    MergeChunksResponse,
};
use crate::state::AppState;

/// `POST /issue-upload-urls` — mint one presigned PUT URL per chunk.
pub async fn issue_upload_urls(
    State(state): State<AppState>,
    Json(req): Json<IssueUploadUrlsRequest>,
) -> Result<Json<IssueUploadUrlsResponse>, ApiError> {
    let file_id = require_string(req.file_id, "fileId")?;
    let bucket_name = require_string(req.bucket_name, "bucketName")?;
    let total_chunks = req
        .total_chunks
        .ok_or_else(|| ApiError::bad_request("Missing required field: totalChunks"))?;
    if total_chunks < 1 {
        return Err(ApiError::bad_request("totalChunks must be at least 1"));
    }

    let urls = state.signer.issue_upload_urls(
        &file_id,
        total_chunks,
        &bucket_name,
        req.file_path.as_deref(),
    )?;

    info!(
        file_id = %file_id,
        total_chunks,
        bucket_name = %bucket_name,
        "issued upload URLs"
    );

    Ok(Json(IssueUploadUrlsResponse {
        success: true,
        message: format!("Issued {} presigned upload URL(s)", urls.len()),
        urls,
        file_id,
        total_chunks,
        bucket_name,
    }))
}

/// `POST /merge-chunks` — assemble staged chunks into the final object.
pub async fn merge_chunks(
    State(state): State<AppState>,
    Json(req): Json<MergeChunksRequest>,
) -> Result<Json<MergeChunksResponse>, ApiError> {
    let file_id = require_string(req.file_id, "fileId")?;
    let final_path = require_string(req.final_path, "finalPath")?;
    let total_chunks = req
        .total_chunks
        .ok_or_else(|| ApiError::bad_request("Missing required field: totalChunks"))?;
    if total_chunks < 1 {
        return Err(ApiError::bad_request("totalChunks must be at least 1"));
    }
    let category = req.file_category.unwrap_or(FileCategory::Other);

    // The merge routine is one generic path; only the destination bucket and
    // content type vary with the declared category.
    let bucket = match category {
        FileCategory::Image | FileCategory::Video => &state.storage.media_bucket,
        FileCategory::Document | FileCategory::Other => &state.storage.document_bucket,
    };

    let merged = state
        .merger
        .merge_chunks(bucket, &file_id, total_chunks, &final_path, category)
        .await?;

    info!(
        file_id = %file_id,
        final_path = %final_path,
        size_bytes = merged.size_bytes,
        "merge complete"
    );

    Ok(Json(MergeChunksResponse {
        success: true,
        file_url: final_path,
        public_url: merged.public_url,
        message: format!(
            "Merged {} chunk(s) into {} bytes",
            total_chunks, merged.size_bytes
        ),
    }))
}

fn require_string(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("Missing required field: {}", field)))
}
