//! Defines routes for the upload-coordination API.
//!
//! ## Structure
//! - **Upload endpoints**
//!   - `POST /issue-upload-urls` — mint presigned PUT URLs for chunks
//!   - `POST /merge-chunks` — assemble staged chunks into the final object
//!
//! - **Health endpoints**
//!   - `GET /healthz` — liveness
//!   - `GET /readyz`  — readiness (configuration checks)
//!
//! `OPTIONS` preflight requests on every route are answered by the CORS
//! layer with an empty 200 and permissive headers; the browser client PUTs
//! chunks directly to presigned URLs and only calls these endpoints to
//! coordinate.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        upload_handlers::{issue_upload_urls, merge_chunks},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

/// Build and return the router for all coordination routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // upload coordination
        .route("/issue-upload-urls", post(issue_upload_urls))
        .route("/merge-chunks", post(merge_chunks))
        .layer(cors())
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
