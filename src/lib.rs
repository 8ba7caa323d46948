//! editor-upload library - upload adapter for rich-text editor hosts

pub mod adapter;
pub mod config;
pub mod error;
pub mod http_logger;
pub mod interpreter;
pub mod plugin;
pub mod task;

// Re-export commonly used types
pub use adapter::{UploadAdapter, UploadSuccess, UploadUrls};
pub use config::{ResponseFormat, UploadConfig};
pub use error::{ConfigError, UploadError, UploadErrorKind};
pub use interpreter::{Rejection, ResponseInterpreter};
pub use plugin::{
    ConfigSource, FileRepository, InMemoryFileRepository, PluginStatus, SimpleUploadPlugin,
};
pub use task::{FileBlob, ProgressSink, TaskState, UploadProgress, UploadTask};
