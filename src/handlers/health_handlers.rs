//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks media host credentials and the upload policy

use crate::services::upload_service::UploadService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness probe: always returns 200 OK with a plain JSON body.
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
/// Readiness probe that:
/// 1. Confirms media host credentials were supplied at startup.
/// 2. Confirms the upload policy admits at least one type and a non-zero size.
///
/// HTTP 200 when all checks pass, HTTP 503 when any check fails.
pub async fn readyz(State(service): State<UploadService>) -> impl IntoResponse {
    let host_ok = service.host_ready();
    let policy = service.policy();
    let policy_ok = policy.max_bytes() > 0 && policy.has_types();

    let mut checks = HashMap::new();
    checks.insert(
        "media_host",
        CheckStatus {
            ok: host_ok,
            error: (!host_ok).then(|| "credentials missing".to_string()),
        },
    );
    checks.insert(
        "policy",
        CheckStatus {
            ok: policy_ok,
            error: (!policy_ok).then(|| "no file type or size admitted".to_string()),
        },
    );

    let overall_ok = host_ok && policy_ok;
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
