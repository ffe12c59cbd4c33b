use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use services::merge_service::MergeService;
use services::signing_service::SigningService;
use services::storage_client::S3StorageClient;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    // Credentials are never logged; absence of any of them aborts here.
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!(
        endpoint = %cfg.storage.endpoint,
        region = %cfg.storage.region,
        url_expiry_secs = cfg.storage.url_expiry_secs,
        "Starting upload-coordinator"
    );

    // --- Initialize core services ---
    let storage_client = Arc::new(S3StorageClient::new(&cfg.storage)?);
    let app_state = AppState {
        signer: Arc::new(SigningService::new(&cfg.storage)?),
        merger: Arc::new(MergeService::new(storage_client)),
        storage: Arc::new(cfg.storage.clone()),
    };

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(app_state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
