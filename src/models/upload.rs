//! Client-side upload tasks, local files and batch outcomes.

use crate::models::media::UploadedFileRecord;
use bytes::Bytes;
use futures::{StreamExt, stream::BoxStream};
use serde::{Deserialize, Serialize};
use std::{
    fmt, io,
    path::{Path, PathBuf},
};
use tokio::fs::{self, File};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Size of the pieces an in-memory file is streamed in.
#[cfg(test)]
const MEMORY_CHUNK_SIZE: usize = 64 * 1024;

/// Opaque identifier of one upload task, generated on the client.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Observable state of one task.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskState {
    pub id: TaskId,
    pub filename: String,
    /// Percentage 0–100, never decreasing.
    pub progress: u8,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskState {
    pub fn pending(id: TaskId, filename: impl Into<String>) -> Self {
        Self {
            id,
            filename: filename.into(),
            progress: 0,
            status: TaskStatus::Pending,
            error: None,
        }
    }
}

/// Optional uploader identity attached to every file of a batch.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UploaderInfo {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UploaderInfo {
    /// Blank strings are treated as absent.
    pub fn new(name: Option<String>, email: Option<String>) -> Self {
        let keep = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            name: keep(name),
            email: keep(email),
        }
    }
}

#[derive(Clone, Debug)]
pub enum FileSource {
    Path(PathBuf),
    #[cfg(test)]
    Memory(Bytes),
}

/// A file selected for upload.
#[derive(Clone, Debug)]
pub struct LocalFile {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub source: FileSource,
}

impl LocalFile {
    #[cfg(test)]
    pub fn from_bytes(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// Describe a file on disk. The content type is guessed from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let meta = fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let content_type = guess_content_type(path);

        Ok(Self {
            filename,
            content_type,
            size: meta.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Open the file contents as a byte stream.
    pub async fn open_stream(&self) -> io::Result<BoxStream<'static, io::Result<Bytes>>> {
        match &self.source {
            FileSource::Path(path) => {
                let file = File::open(path).await?;
                Ok(ReaderStream::new(file).boxed())
            }
            #[cfg(test)]
            FileSource::Memory(bytes) => {
                let bytes = bytes.clone();
                let chunks: Vec<io::Result<Bytes>> = (0..bytes.len())
                    .step_by(MEMORY_CHUNK_SIZE)
                    .map(|start| {
                        let end = (start + MEMORY_CHUNK_SIZE).min(bytes.len());
                        Ok(bytes.slice(start..end))
                    })
                    .collect();
                Ok(futures::stream::iter(chunks).boxed())
            }
        }
    }
}

/// Extension based MIME lookup. QuickTime and AVI use the short names the
/// allow-list is written in rather than the registered ones.
fn guess_content_type(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mov" => "video/mov".into(),
        "avi" => "video/avi".into(),
        _ => mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}

/// A task that reached `failed`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailedUpload {
    pub task_id: TaskId,
    pub filename: String,
    pub error: String,
}

/// A file that never left the client because pre-flight validation refused it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RejectedFile {
    pub filename: String,
    pub reason: String,
}

/// Outcome of one batch: successes plus diagnostics for everything else.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// Records of completed tasks, in submission order.
    pub records: Vec<UploadedFileRecord>,
    pub failed: Vec<FailedUpload>,
    pub rejected: Vec<RejectedFile>,
}

impl BatchResult {
    pub fn submitted(&self) -> usize {
        self.records.len() + self.failed.len() + self.rejected.len()
    }

    /// True when at least one file did not make it.
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty() || !self.rejected.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::io::Write;

    #[test]
    fn uploader_info_drops_blank_values() {
        let info = UploaderInfo::new(Some("  Ayşe ".into()), Some("   ".into()));
        assert_eq!(info.name.as_deref(), Some("Ayşe"));
        assert!(info.email.is_none());
    }

    #[tokio::test]
    async fn memory_file_streams_in_chunks() {
        let data = vec![7u8; MEMORY_CHUNK_SIZE * 2 + 10];
        let file = LocalFile::from_bytes("a.jpg", "image/jpeg", data.clone());
        let chunks: Vec<Bytes> = file
            .open_stream()
            .await
            .expect("stream opens")
            .try_collect()
            .await
            .expect("stream reads");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), data);
    }

    #[tokio::test]
    async fn path_file_guesses_type_and_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("party.png");
        let mut handle = std::fs::File::create(&path).expect("create file");
        handle.write_all(b"not really a png").expect("write file");

        let file = LocalFile::from_path(&path).await.expect("file described");
        assert_eq!(file.filename, "party.png");
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.size, 16);

        let body: Vec<Bytes> = file
            .open_stream()
            .await
            .expect("stream opens")
            .try_collect()
            .await
            .expect("stream reads");
        assert_eq!(body.concat(), b"not really a png");
    }

    #[test]
    fn video_extensions_map_to_allow_list_names() {
        assert_eq!(guess_content_type(Path::new("clip.MOV")), "video/mov");
        assert_eq!(guess_content_type(Path::new("clip.avi")), "video/avi");
        assert_eq!(guess_content_type(Path::new("clip.mp4")), "video/mp4");
        assert_eq!(guess_content_type(Path::new("photo.jpg")), "image/jpeg");
        assert_eq!(
            guess_content_type(Path::new("notes")),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn directories_are_not_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = LocalFile::from_path(dir.path()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn partial_batches_are_detected() {
        let mut result = BatchResult::default();
        assert!(!result.is_partial());
        result.rejected.push(RejectedFile {
            filename: "big.mp4".into(),
            reason: "too big".into(),
        });
        assert!(result.is_partial());
        assert_eq!(result.submitted(), 1);
    }
}
