//! Records describing an uploaded photo or video.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse media category used to pick the hosting service's resource type.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// `image/*` maps to [`MediaKind::Image`]; everything else is video.
    pub fn from_mime(content_type: &str) -> Self {
        if content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
        {
            MediaKind::Image
        } else {
            MediaKind::Video
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// The durable result of one successful upload, handed back to the caller.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFileRecord {
    /// Identifier assigned by the endpoint.
    pub id: String,

    /// Public HTTPS URL of the hosted asset.
    pub url: String,

    /// Hosting service identifier of the asset.
    pub public_id: String,

    /// Original filename as selected by the uploader.
    pub filename: String,

    /// Size in bytes.
    pub size: u64,

    #[serde(rename = "type")]
    pub kind: MediaKind,

    pub uploaded_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader_email: Option<String>,
}

/// JSON body of a successful `POST /api/upload`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(default)]
    pub id: String,
    pub url: String,
    pub public_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_mime_prefix() {
        assert_eq!(MediaKind::from_mime("image/png"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("IMAGE/heic"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("video/avi"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("video/mov"), MediaKind::Video);
    }

    #[test]
    fn response_tolerates_missing_optional_fields() {
        let parsed: UploadResponse =
            serde_json::from_str(r#"{"url":"https://x/y.jpg","publicId":"memories-app/y"}"#)
                .expect("minimal body should parse");
        assert!(parsed.id.is_empty());
        assert_eq!(parsed.public_id, "memories-app/y");
        assert!(parsed.thumbnail_url.is_none());
    }

    #[test]
    fn response_without_url_is_rejected() {
        assert!(serde_json::from_str::<UploadResponse>(r#"{"publicId":"y"}"#).is_err());
    }

    #[test]
    fn record_serializes_kind_as_type() {
        let record = UploadedFileRecord {
            id: "1".into(),
            url: "https://x".into(),
            public_id: "p".into(),
            filename: "a.jpg".into(),
            size: 3,
            kind: MediaKind::Image,
            uploaded_at: Utc::now(),
            uploader_name: None,
            uploader_email: None,
        };
        let value = serde_json::to_value(&record).expect("record serializes");
        assert_eq!(value["type"], "image");
        assert_eq!(value["publicId"], "p");
        assert!(value.get("uploaderName").is_none());
    }
}
