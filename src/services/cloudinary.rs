//! Cloudinary implementation of [`MediaHost`] over the REST upload API.
//!
//! Uploads are signed requests: the signed parameters (`folder`,
//! `timestamp`) are serialized in key order, the API secret is appended and
//! the whole string is hashed with SHA-256. The account must have SHA-256
//! signatures enabled.

use crate::{
    config::CloudinaryConfig,
    models::media::MediaKind,
    services::hosting::{HostError, HostUpload, HostedAsset, MediaHost},
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{
    Body, Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Transformation chain for gallery renditions: 800x600 fill with automatic
/// gravity, automatic quality and format.
const RENDITION_TRANSFORM: &str = "w_800,h_600,c_fill,g_auto/q_auto,f_auto";

const DELIVERY_BASE: &str = "https://res.cloudinary.com";

#[derive(Clone)]
pub struct CloudinaryClient {
    http: Client,
    config: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct UploadApiResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ApiErrorMessage {
    message: String,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> Result<Self, HostError> {
        let http = Client::builder().build()?;
        Ok(Self { http, config })
    }

    fn upload_url(&self, kind: MediaKind) -> String {
        format!(
            "{}/v1_1/{}/{}/upload",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name,
            kind.as_str()
        )
    }
}

/// Hex SHA-256 of the sorted `key=value` pairs joined by `&`, followed by the secret.
pub fn sign_params(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl MediaHost for CloudinaryClient {
    async fn upload(&self, upload: HostUpload) -> Result<HostedAsset, HostError> {
        if !self.config.is_configured() {
            return Err(HostError::NotConfigured);
        }

        let timestamp = Utc::now().timestamp().to_string();
        let mut signed = vec![("timestamp", timestamp)];
        if !self.config.folder.is_empty() {
            signed.push(("folder", self.config.folder.clone()));
        }
        let signature = sign_params(&signed, &self.config.api_secret);

        let size = upload.bytes.len() as u64;
        let file_part = Part::stream_with_length(Body::from(upload.bytes), size)
            .file_name(upload.filename.clone())
            .mime_str(&upload.content_type)?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature);
        for (key, value) in signed {
            form = form.text(key, value);
        }

        let url = self.upload_url(upload.kind);
        debug!(
            "uploading {} ({} bytes, {}) to {}",
            upload.filename,
            size,
            upload.kind.as_str(),
            url
        );

        let response = self.http.post(&url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            warn!("cloudinary rejected {}: {} {}", upload.filename, status, message);
            return Err(HostError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: UploadApiResponse = response
            .json()
            .await
            .map_err(|err| HostError::InvalidResponse(err.to_string()))?;
        debug!("stored {} as {}", upload.filename, parsed.public_id);

        Ok(HostedAsset {
            public_id: parsed.public_id,
            secure_url: parsed.secure_url,
        })
    }

    fn rendition_url(&self, public_id: &str, kind: MediaKind) -> Option<String> {
        if self.config.cloud_name.is_empty() || public_id.is_empty() {
            return None;
        }
        Some(format!(
            "{}/{}/{}/upload/{}/{}",
            DELIVERY_BASE,
            self.config.cloud_name,
            kind.as_str(),
            RENDITION_TRANSFORM,
            public_id
        ))
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }
}
