//! HTTP handlers for `/api/upload`.
//! Reads one multipart file per request, enforces the media policy while the
//! body streams in, and delegates hosting to `UploadService`.

use crate::{
    errors::AppError,
    models::{
        media::{UploadResponse, UploadedFileRecord},
        upload::UploaderInfo,
    },
    services::{
        media_policy::PolicyError,
        upload_service::{IncomingUpload, UploadService},
    },
};
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use bytes::{Bytes, BytesMut};
use tracing::{debug, info};

struct FilePart {
    filename: String,
    content_type: String,
    bytes: Bytes,
}

/// `POST /api/upload`: multipart fields `file`, `fileId`, `uploaderName`, `uploaderEmail`.
pub async fn upload_media(
    State(service): State<UploadService>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file: Option<FilePart> = None;
    let mut file_id = None;
    let mut uploader_name = None;
    let mut uploader_email = None;
    let mut rejection: Option<PolicyError> = None;

    'fields: while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();

                if let Err(err) = service.policy().check_type(&content_type) {
                    rejection = Some(err);
                }
                // After a rejection the rest of the body is read and dropped so
                // the client gets the 400 rather than a reset connection.
                // DefaultBodyLimit bounds how much that can be.
                let mut buf = BytesMut::new();
                let mut received = 0u64;
                loop {
                    let chunk = match field.chunk().await {
                        Ok(Some(chunk)) => chunk,
                        Ok(None) => break,
                        // The body limit cut the file off, so it is over the ceiling.
                        Err(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                            if rejection.is_none() {
                                rejection = Some(PolicyError::TooLarge {
                                    size: received,
                                    max: service.policy().max_bytes(),
                                });
                            }
                            break 'fields;
                        }
                        Err(err) => return Err(err.into()),
                    };
                    received += chunk.len() as u64;
                    if rejection.is_some() {
                        continue;
                    }
                    buf.extend_from_slice(&chunk);
                    if let Err(err) = service.policy().check_size(received) {
                        rejection = Some(err);
                        buf.clear();
                    }
                }
                file = Some(FilePart {
                    filename,
                    content_type,
                    bytes: buf.freeze(),
                });
            }
            "fileId" => file_id = Some(field.text().await?),
            "uploaderName" => uploader_name = Some(field.text().await?),
            "uploaderEmail" => uploader_email = Some(field.text().await?),
            other => debug!("ignoring multipart field `{}`", other),
        }
    }

    if let Some(err) = rejection {
        info!("rejected upload: {}", err.describe());
        return Err(err.into());
    }

    let file = file
        .filter(|f| !(f.filename.is_empty() && f.bytes.is_empty()))
        .ok_or(PolicyError::MissingFile)?;

    info!(
        "received upload {} ({}, {} bytes)",
        file.filename,
        file.content_type,
        file.bytes.len()
    );

    let accepted = service
        .accept(IncomingUpload {
            file_id: file_id.filter(|id: &String| !id.is_empty()),
            filename: file.filename,
            content_type: file.content_type,
            bytes: file.bytes,
            uploader: UploaderInfo::new(uploader_name, uploader_email),
        })
        .await?;

    Ok(Json(UploadResponse {
        id: accepted.record.id,
        url: accepted.record.url,
        public_id: accepted.record.public_id,
        thumbnail_url: accepted.thumbnail_url,
        message: "File uploaded successfully".into(),
    }))
}

/// `GET /api/upload`: nothing is stored server side, so the list is always empty.
pub async fn list_uploads() -> Json<Vec<UploadedFileRecord>> {
    Json(Vec::new())
}
