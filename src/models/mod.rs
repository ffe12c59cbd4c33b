//! Data models for the upload-coordination API.
//!
//! Wire-facing request/response types plus the temporary-chunk naming
//! convention shared by the signing and merging services. Everything here
//! serializes naturally as JSON via `serde`.

pub mod upload;
