//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that re-validates the storage configuration

use crate::services::sigv4::Endpoint;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that re-checks the two things this stateless service
/// depends on: a parseable gateway endpoint and present credentials.
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let endpoint_check = match Endpoint::parse(&state.storage.endpoint) {
        Ok(_) => (true, None::<String>),
        Err(err) => (false, Some(err.to_string())),
    };

    let credentials_ok = !state.storage.access_key_id.is_empty()
        && !state.storage.secret_access_key.is_empty()
        && !state.storage.region.is_empty();
    let credentials_check = if credentials_ok {
        (true, None::<String>)
    } else {
        (false, Some("credentials incomplete".to_string()))
    };

    let overall_ok = endpoint_check.0 && credentials_check.0;

    let mut checks = HashMap::new();
    checks.insert(
        "endpoint",
        CheckStatus {
            ok: endpoint_check.0,
            error: endpoint_check.1,
        },
    );
    checks.insert(
        "credentials",
        CheckStatus {
            ok: credentials_check.0,
            error: credentials_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
