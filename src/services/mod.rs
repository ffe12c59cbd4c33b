//! Service layer: the SigV4 engine, the presigned-URL issuer, the storage
//! client, and the chunk merger.

pub mod merge_service;
pub mod signing_service;
pub mod sigv4;
pub mod storage_client;
