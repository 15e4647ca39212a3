//! Type and size rules applied to every file before it leaves the caller.
//!
//! The same policy runs in two places: the orchestrator pre-flights local
//! files with it, and the upload endpoint re-checks each request before any
//! bytes go to the hosting service.

use crate::models::media::MediaKind;
use thiserror::Error;

/// MIME types accepted when no explicit list is configured.
pub const DEFAULT_ALLOWED_TYPES: [&str; 7] = [
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/heic",
    "video/mp4",
    "video/mov",
    "video/avi",
];

const MIB: u64 = 1024 * 1024;

/// Validation failures. The `Display` text is the wire message returned by
/// the endpoint, so keep it stable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("No file provided")]
    MissingFile,
    #[error("Invalid file type")]
    InvalidType(String),
    #[error("File too large")]
    TooLarge { size: u64, max: u64 },
}

impl PolicyError {
    /// Longer explanation for logs and client-side rejection reports.
    pub fn describe(&self) -> String {
        match self {
            PolicyError::MissingFile => "no file provided".into(),
            PolicyError::InvalidType(ct) if ct.is_empty() => "missing content type".into(),
            PolicyError::InvalidType(ct) => format!("content type `{}` is not allowed", ct),
            PolicyError::TooLarge { size, max } => format!(
                "{} exceeds the {} limit",
                format_file_size(*size),
                format_file_size(*max)
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaPolicy {
    allowed: Vec<String>,
    max_bytes: u64,
}

impl MediaPolicy {
    pub fn new(allowed: Vec<String>, max_file_size_mb: u64) -> Self {
        Self {
            allowed,
            max_bytes: max_file_size_mb.saturating_mul(MIB),
        }
    }

    pub fn with_defaults(max_file_size_mb: u64) -> Self {
        Self::new(
            DEFAULT_ALLOWED_TYPES.iter().map(|t| t.to_string()).collect(),
            max_file_size_mb,
        )
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn has_types(&self) -> bool {
        !self.allowed.is_empty()
    }

    /// Check the declared content type against the allow-list.
    ///
    /// Parameters such as `; charset=...` are ignored and comparison is
    /// case-insensitive.
    pub fn check_type(&self, content_type: &str) -> Result<MediaKind, PolicyError> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if self.allowed.iter().any(|t| t.eq_ignore_ascii_case(&essence)) {
            Ok(MediaKind::from_mime(&essence))
        } else {
            Err(PolicyError::InvalidType(content_type.to_string()))
        }
    }

    pub fn check_size(&self, size: u64) -> Result<(), PolicyError> {
        if size > self.max_bytes {
            Err(PolicyError::TooLarge {
                size,
                max: self.max_bytes,
            })
        } else {
            Ok(())
        }
    }

    /// Full validation: type first, then size.
    pub fn validate(&self, content_type: &str, size: u64) -> Result<MediaKind, PolicyError> {
        let kind = self.check_type(content_type)?;
        self.check_size(size)?;
        Ok(kind)
    }
}

/// Render a byte count with binary units, e.g. `1.5 MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".into();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_types_and_derives_kind() {
        let policy = MediaPolicy::with_defaults(100);
        assert_eq!(policy.validate("image/jpeg", 10), Ok(MediaKind::Image));
        assert_eq!(policy.validate("image/HEIC", 10), Ok(MediaKind::Image));
        assert_eq!(policy.validate("video/mov", 10), Ok(MediaKind::Video));
        assert_eq!(
            policy.validate("video/mp4; codecs=avc1", 10),
            Ok(MediaKind::Video)
        );
    }

    #[test]
    fn rejects_types_outside_allow_list() {
        let policy = MediaPolicy::with_defaults(100);
        assert_eq!(
            policy.validate("application/pdf", 10),
            Err(PolicyError::InvalidType("application/pdf".into()))
        );
        assert!(matches!(
            policy.validate("image/gif", 10),
            Err(PolicyError::InvalidType(_))
        ));
    }

    #[test]
    fn size_limit_is_inclusive() {
        let policy = MediaPolicy::with_defaults(1);
        assert!(policy.validate("image/png", MIB).is_ok());
        assert_eq!(
            policy.validate("image/png", MIB + 1),
            Err(PolicyError::TooLarge {
                size: MIB + 1,
                max: MIB
            })
        );
    }

    #[test]
    fn type_is_checked_before_size() {
        let policy = MediaPolicy::with_defaults(1);
        assert!(matches!(
            policy.validate("text/plain", 10 * MIB),
            Err(PolicyError::InvalidType(_))
        ));
    }

    #[test]
    fn wire_messages_are_stable() {
        assert_eq!(PolicyError::MissingFile.to_string(), "No file provided");
        assert_eq!(
            PolicyError::InvalidType("x".into()).to_string(),
            "Invalid file type"
        );
        assert_eq!(
            PolicyError::TooLarge { size: 2, max: 1 }.to_string(),
            "File too large"
        );
    }

    #[test]
    fn describe_mentions_sizes() {
        let err = PolicyError::TooLarge {
            size: 60 * MIB,
            max: 50 * MIB,
        };
        assert_eq!(err.describe(), "60 MB exceeds the 50 MB limit");
    }

    #[test]
    fn formats_file_sizes() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(100 * MIB), "100 MB");
        assert_eq!(format_file_size(3 * 1024 * MIB), "3 GB");
    }
}
