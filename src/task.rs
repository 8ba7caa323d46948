//! Upload task - one file, one attempt, one terminal outcome

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::UploadError;

/// Lifecycle state of an upload task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    InFlight,
    Completed,
    Failed,
    Aborted,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InFlight => write!(f, "in-flight"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// File handed over by the host editor
#[derive(Debug, Clone)]
pub struct FileBlob {
    pub name: String,
    pub bytes: Bytes,
    pub mime: Option<String>,
}

impl FileBlob {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Load a file from disk, guessing the mime type from the extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow!("path has no file name: {}", path.display()))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;

        let mut blob = Self::new(name, bytes);
        blob.mime = guess_mime(path).map(str::to_string);
        Ok(blob)
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(mime)
}

/// Snapshot of upload progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

/// Receiver of progress notifications
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: UploadProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(UploadProgress) + Send + Sync,
{
    fn on_progress(&self, progress: UploadProgress) {
        self(progress)
    }
}

#[derive(Debug)]
struct Shared {
    state: TaskState,
    bytes_sent: u64,
    bytes_total: Option<u64>,
}

struct TaskInner {
    id: Uuid,
    file: FileBlob,
    shared: Mutex<Shared>,
    cancel: CancellationToken,
    sink: Option<Arc<dyn ProgressSink>>,
}

/// Handle to a single upload attempt.
///
/// Clones share state, so one clone can be uploaded while another is kept
/// around to call `abort`.
#[derive(Clone)]
pub struct UploadTask {
    inner: Arc<TaskInner>,
}

impl fmt::Debug for UploadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadTask")
            .field("id", &self.inner.id)
            .field("file", &self.inner.file.name)
            .field("state", &self.state())
            .finish()
    }
}

impl UploadTask {
    pub fn new(file: FileBlob) -> Self {
        Self::build(file, None)
    }

    pub fn with_progress(file: FileBlob, sink: Arc<dyn ProgressSink>) -> Self {
        Self::build(file, Some(sink))
    }

    fn build(file: FileBlob, sink: Option<Arc<dyn ProgressSink>>) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: Uuid::new_v4(),
                file,
                shared: Mutex::new(Shared {
                    state: TaskState::Pending,
                    bytes_sent: 0,
                    bytes_total: None,
                }),
                cancel: CancellationToken::new(),
                sink,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn file(&self) -> &FileBlob {
        &self.inner.file
    }

    pub fn state(&self) -> TaskState {
        self.lock().state
    }

    pub fn bytes_sent(&self) -> u64 {
        self.lock().bytes_sent
    }

    pub fn bytes_total(&self) -> Option<u64> {
        self.lock().bytes_total
    }

    /// Request cancellation. Returns true if an in-flight upload was signalled.
    ///
    /// The pending `upload` call settles as aborted afterwards; this call
    /// does not wait for it.
    pub fn abort(&self) -> bool {
        let shared = self.lock();
        if shared.state != TaskState::InFlight {
            return false;
        }
        self.inner.cancel.cancel();
        true
    }

    /// Pending -> InFlight. Hands out the token the transport must watch.
    pub(crate) fn begin(&self) -> std::result::Result<CancellationToken, UploadError> {
        let mut shared = self.lock();
        if shared.state != TaskState::Pending {
            return Err(UploadError::InvalidState {
                state: shared.state,
            });
        }
        shared.state = TaskState::InFlight;
        shared.bytes_sent = 0;
        shared.bytes_total = Some(self.inner.file.len());
        Ok(self.inner.cancel.clone())
    }

    /// Account for `n` more bytes handed to the transport
    pub(crate) fn record_sent(&self, n: u64) {
        let progress = {
            let mut shared = self.lock();
            if shared.state != TaskState::InFlight {
                return;
            }
            let total = shared.bytes_total.unwrap_or(u64::MAX);
            shared.bytes_sent = shared.bytes_sent.saturating_add(n).min(total);
            UploadProgress {
                sent: shared.bytes_sent,
                total,
            }
        };

        if let Some(sink) = &self.inner.sink {
            sink.on_progress(progress);
        }
    }

    /// InFlight -> terminal. A cancellation observed here wins over any
    /// other outcome.
    pub(crate) fn settle<T>(
        &self,
        outcome: std::result::Result<T, UploadError>,
    ) -> std::result::Result<T, UploadError> {
        let mut shared = self.lock();
        if shared.state != TaskState::InFlight {
            return Err(UploadError::InvalidState {
                state: shared.state,
            });
        }

        if self.inner.cancel.is_cancelled() {
            shared.state = TaskState::Aborted;
            return Err(UploadError::Aborted);
        }

        shared.state = match &outcome {
            Ok(_) => TaskState::Completed,
            Err(UploadError::Aborted) => TaskState::Aborted,
            Err(_) => TaskState::Failed,
        };
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}
