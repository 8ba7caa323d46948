//! Error taxonomy for configuration and uploads

use thiserror::Error;

use crate::task::TaskState;

/// Configuration problems detected at plugin initialization
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("simple-upload-adapter-missing-uploadurl: uploadUrl is not configured")]
    MissingUploadUrl,

    #[error("invalid URL for {field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("invalid simpleUpload configuration: {0}")]
    InvalidBlock(String),
}

/// Coarse classification of an upload failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadErrorKind {
    Transport,
    Aborted,
    ServerRejected,
    InvalidState,
}

/// Failure outcome of a single upload
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    /// Network level failure, the request never produced a response
    #[error("upload failed for file {file}")]
    Transport { file: String },

    /// Cancelled by the caller
    #[error("upload aborted")]
    Aborted,

    /// A response arrived but the active interpreter refused it
    #[error("{message}")]
    ServerRejected { message: String },

    /// `upload` was called on a task that is not pending
    #[error("upload task is {state}, expected pending")]
    InvalidState { state: TaskState },
}

impl UploadError {
    pub fn transport(file: &str) -> Self {
        Self::Transport {
            file: file.to_string(),
        }
    }

    pub fn kind(&self) -> UploadErrorKind {
        match self {
            Self::Transport { .. } => UploadErrorKind::Transport,
            Self::Aborted => UploadErrorKind::Aborted,
            Self::ServerRejected { .. } => UploadErrorKind::ServerRejected,
            Self::InvalidState { .. } => UploadErrorKind::InvalidState,
        }
    }

    /// Message suitable for user-facing error UI.
    ///
    /// Cancellation carries no message so hosts can suppress the error
    /// notification when the user aborted the upload themselves.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Aborted => None,
            other => Some(other.to_string()),
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}
