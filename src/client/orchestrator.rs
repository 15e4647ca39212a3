//! UploadOrchestrator fans a batch of files out into independent uploads
//! and folds the settled results into a [`BatchResult`].
//!
//! Each accepted file becomes a task with its own progress record. All
//! uploads are in flight at once; the batch resolves after every one of them
//! reaches a terminal state, and a failing upload never cancels its siblings.

use crate::{
    client::{
        tracker::{ProgressTracker, TaskHandle},
        transport::{ProgressFn, TransferRequest, UploadTransport},
    },
    models::{
        media::{MediaKind, UploadedFileRecord},
        upload::{
            BatchResult, FailedUpload, LocalFile, RejectedFile, TaskId, TaskState, UploaderInfo,
        },
    },
    services::media_policy::MediaPolicy,
};
use chrono::Utc;
use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("{count} files selected, at most {max} allowed per batch")]
    TooManyFiles { count: usize, max: usize },
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_files: usize,
    pub policy: MediaPolicy,
    /// How long the progress view stays populated after a batch settles.
    pub clear_after: Duration,
}

enum TaskOutcome {
    Completed(UploadedFileRecord),
    Failed(FailedUpload),
}

pub struct UploadOrchestrator {
    transport: Arc<dyn UploadTransport>,
    tracker: ProgressTracker,
    config: OrchestratorConfig,
}

impl UploadOrchestrator {
    pub fn new(transport: Arc<dyn UploadTransport>, config: OrchestratorConfig) -> Self {
        Self {
            transport,
            tracker: ProgressTracker::new(),
            config,
        }
    }

    /// Live view of the current batch.
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Upload a batch and wait for every task to settle.
    ///
    /// Per-file failures are reported inside the result; only a batch that
    /// exceeds `max_files` is an error. An empty batch returns immediately.
    pub async fn upload_batch(
        &self,
        files: Vec<LocalFile>,
        uploader: UploaderInfo,
    ) -> Result<BatchResult, BatchError> {
        if files.is_empty() {
            return Ok(BatchResult::default());
        }
        if files.len() > self.config.max_files {
            return Err(BatchError::TooManyFiles {
                count: files.len(),
                max: self.config.max_files,
            });
        }

        let mut result = BatchResult::default();
        let mut accepted = Vec::with_capacity(files.len());
        for file in files {
            match self.config.policy.validate(&file.content_type, file.size) {
                Ok(_) => accepted.push(file),
                Err(err) => {
                    info!("skipping {}: {}", file.filename, err.describe());
                    result.rejected.push(RejectedFile {
                        filename: file.filename,
                        reason: err.describe(),
                    });
                }
            }
        }
        if accepted.is_empty() {
            return Ok(result);
        }

        let pending = accepted
            .iter()
            .map(|file| TaskState::pending(TaskId::new(), file.filename.clone()))
            .collect();
        let (generation, handles) = self.tracker.begin(pending);

        for handle in &handles {
            handle.start();
        }

        let uploads = accepted
            .iter()
            .zip(handles.iter())
            .map(|(file, handle)| self.run_task(file, handle, &uploader));
        let outcomes = join_all(uploads).await;

        for outcome in outcomes {
            match outcome {
                TaskOutcome::Completed(record) => result.records.push(record),
                TaskOutcome::Failed(failure) => result.failed.push(failure),
            }
        }

        if !result.failed.is_empty() {
            warn!("{} upload(s) failed", result.failed.len());
        }
        info!(
            "batch settled: {} uploaded, {} failed, {} rejected",
            result.records.len(),
            result.failed.len(),
            result.rejected.len()
        );

        self.schedule_clear(generation);
        Ok(result)
    }

    async fn run_task(
        &self,
        file: &LocalFile,
        handle: &TaskHandle,
        uploader: &UploaderInfo,
    ) -> TaskOutcome {
        let on_progress: ProgressFn = {
            let handle = handle.clone();
            Arc::new(move |sent: u64, total: u64| {
                if total > 0 {
                    let percent = ((sent.min(total) * 100 + total / 2) / total) as u8;
                    handle.progress(percent);
                }
            })
        };

        let request = TransferRequest {
            task_id: handle.id(),
            file,
            uploader,
        };

        match self.transport.send(request, on_progress).await {
            Ok(response) => {
                handle.complete();
                debug!("task {} completed: {}", handle.id(), response.url);
                let id = if response.id.is_empty() {
                    Uuid::new_v4().to_string()
                } else {
                    response.id
                };
                TaskOutcome::Completed(UploadedFileRecord {
                    id,
                    url: response.url,
                    public_id: response.public_id,
                    filename: file.filename.clone(),
                    size: file.size,
                    kind: MediaKind::from_mime(&file.content_type),
                    uploaded_at: Utc::now(),
                    uploader_name: uploader.name.clone(),
                    uploader_email: uploader.email.clone(),
                })
            }
            Err(err) => {
                let error = err.to_string();
                handle.fail(error.clone());
                debug!("task {} failed: {}", handle.id(), error);
                TaskOutcome::Failed(FailedUpload {
                    task_id: handle.id(),
                    filename: file.filename.clone(),
                    error,
                })
            }
        }
    }

    fn schedule_clear(&self, generation: u64) {
        let tracker = self.tracker.clone();
        let delay = self.config.clear_after;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tracker.clear_if_current(generation) {
                debug!("cleared progress view for batch {}", generation);
            }
        });
    }
}
