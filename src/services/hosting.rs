//! Boundary to the third-party media host.

use crate::models::media::MediaKind;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("media host is not configured")]
    NotConfigured,
    #[error("media host rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected media host response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// One file ready to be pushed to the host.
#[derive(Debug, Clone)]
pub struct HostUpload {
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: String,
    pub kind: MediaKind,
}

/// What the host reports back for a stored asset.
#[derive(Debug, Clone, PartialEq)]
pub struct HostedAsset {
    pub public_id: String,
    pub secure_url: String,
}

#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Store the bytes and return the asset location. No retries.
    async fn upload(&self, upload: HostUpload) -> Result<HostedAsset, HostError>;

    /// URL of a resized, format-optimized rendition, when the host offers one.
    fn rendition_url(&self, public_id: &str, kind: MediaKind) -> Option<String>;

    /// Whether credentials are present. Drives the readiness probe.
    fn is_configured(&self) -> bool;
}
