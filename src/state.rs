//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::config::StorageConfig;
use crate::services::merge_service::MergeService;
use crate::services::signing_service::SigningService;

#[derive(Clone)]
pub struct AppState {
    pub signer: Arc<SigningService>,
    pub merger: Arc<MergeService>,
    /// Kept for readiness checks and per-category bucket selection.
    pub storage: Arc<StorageConfig>,
}
