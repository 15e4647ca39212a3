//! Defines routes for the upload service.
//!
//! ## Structure
//! - `GET  /healthz`   : liveness
//! - `GET  /readyz`    : readiness
//! - `POST /api/upload`: upload one file (multipart)
//! - `GET  /api/upload`: list uploads (always empty, nothing is stored)

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        upload_handlers::{list_uploads, upload_media},
    },
    services::upload_service::UploadService,
};
use axum::{Router, extract::DefaultBodyLimit, routing::get};

/// Room for multipart boundaries and the text fields on top of the file itself.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Build and return the router.
///
/// The request body limit follows the configured file size ceiling so that
/// the policy, not the framework default, decides what is too large.
pub fn routes(max_file_bytes: u64) -> Router<UploadService> {
    let body_limit = usize::try_from(max_file_bytes.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/upload", get(list_uploads).post(upload_media))
        .layer(DefaultBodyLimit::max(body_limit))
}
