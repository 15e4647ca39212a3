//! The seam between the orchestrator and the wire.

use crate::models::{
    media::UploadResponse,
    upload::{LocalFile, TaskId, UploaderInfo},
};
use async_trait::async_trait;
use std::{io, sync::Arc};
use thiserror::Error;

/// Why a single upload did not produce a record. The `Display` text is what
/// ends up in the task's error field.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}{}", .message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    Status { status: u16, message: Option<String> },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Could not read file: {0}")]
    Io(#[from] io::Error),
}

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        TransferError::Network(err.to_string())
    }
}

/// Called with `(bytes_sent, total_bytes)` as the body goes out.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

pub struct TransferRequest<'a> {
    pub task_id: TaskId,
    pub file: &'a LocalFile,
    pub uploader: &'a UploaderInfo,
}

#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Send one file. Progress may be reported any number of times before
    /// the call returns.
    async fn send(
        &self,
        request: TransferRequest<'_>,
        progress: ProgressFn,
    ) -> Result<UploadResponse, TransferError>;
}
