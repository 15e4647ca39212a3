//! UploadService validates one incoming file and forwards it to the media
//! host. Nothing is persisted: the normalized record is built from the host's
//! answer and returned to the handler.

use crate::{
    models::media::{MediaKind, UploadedFileRecord},
    models::upload::UploaderInfo,
    services::{
        hosting::{HostError, HostUpload, MediaHost},
        media_policy::{MediaPolicy, PolicyError},
    },
};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// A file received by the endpoint, fully buffered.
#[derive(Debug, Clone)]
pub struct IncomingUpload {
    pub file_id: Option<String>,
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
    pub uploader: UploaderInfo,
}

/// Endpoint-side result: the record plus an optional gallery rendition URL.
#[derive(Debug, Clone)]
pub struct AcceptedUpload {
    pub record: UploadedFileRecord,
    pub thumbnail_url: Option<String>,
}

#[derive(Clone)]
pub struct UploadService {
    policy: MediaPolicy,
    host: Arc<dyn MediaHost>,
}

impl UploadService {
    pub fn new(policy: MediaPolicy, host: Arc<dyn MediaHost>) -> Self {
        Self { policy, host }
    }

    pub fn policy(&self) -> &MediaPolicy {
        &self.policy
    }

    pub fn host_ready(&self) -> bool {
        self.host.is_configured()
    }

    /// Validate and forward one file.
    ///
    /// Validation happens before the host is contacted; a policy failure
    /// never produces a remote call.
    pub async fn accept(&self, incoming: IncomingUpload) -> Result<AcceptedUpload, UploadError> {
        let size = incoming.bytes.len() as u64;
        let kind: MediaKind = self.policy.validate(&incoming.content_type, size)?;
        let correlation = incoming.file_id.as_deref().unwrap_or("-");

        let asset = self
            .host
            .upload(HostUpload {
                bytes: incoming.bytes,
                filename: incoming.filename.clone(),
                content_type: incoming.content_type.clone(),
                kind,
            })
            .await
            .inspect_err(|err| {
                warn!(
                    "upload {} ({}) failed at media host: {}",
                    correlation, incoming.filename, err
                )
            })?;

        info!(
            "upload {} stored {} as {}",
            correlation, incoming.filename, asset.public_id
        );

        let thumbnail_url = self.host.rendition_url(&asset.public_id, kind);
        let record = UploadedFileRecord {
            id: Uuid::new_v4().to_string(),
            url: asset.secure_url,
            public_id: asset.public_id,
            filename: incoming.filename,
            size,
            kind,
            uploaded_at: Utc::now(),
            uploader_name: incoming.uploader.name,
            uploader_email: incoming.uploader.email,
        };

        Ok(AcceptedUpload {
            record,
            thumbnail_url,
        })
    }
}
