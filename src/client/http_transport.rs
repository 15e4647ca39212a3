//! reqwest-backed transport posting one multipart request per file to
//! `{endpoint}/api/upload`.

use crate::{
    client::{
        progress_stream::ProgressStream,
        transport::{ProgressFn, TransferError, TransferRequest, UploadTransport},
    },
    models::media::UploadResponse,
};
use async_trait::async_trait;
use reqwest::{
    Body, Client, StatusCode,
    multipart::{Form, Part},
};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    upload_url: String,
}

impl HttpTransport {
    /// `timeout` bounds each request; `None` waits indefinitely.
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> Result<Self, TransferError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            upload_url: format!("{}/api/upload", endpoint.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn send(
        &self,
        request: TransferRequest<'_>,
        progress: ProgressFn,
    ) -> Result<UploadResponse, TransferError> {
        let file = request.file;
        let stream = file.open_stream().await?;
        let body = Body::wrap_stream(ProgressStream::new(stream, file.size, progress));
        let part = Part::stream_with_length(body, file.size)
            .file_name(file.filename.clone())
            .mime_str(&file.content_type)?;

        let mut form = Form::new()
            .part("file", part)
            .text("fileId", request.task_id.to_string());
        if let Some(name) = &request.uploader.name {
            form = form.text("uploaderName", name.clone());
        }
        if let Some(email) = &request.uploader.email {
            form = form.text("uploaderEmail", email.clone());
        }

        debug!("posting {} as task {}", file.filename, request.task_id);
        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .map(|body| body.error);
            return Err(TransferError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        serde_json::from_str::<UploadResponse>(&text)
            .map_err(|err| TransferError::InvalidResponse(err.to_string()))
    }
}
