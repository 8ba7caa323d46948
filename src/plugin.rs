//! Plugin wiring against the host editor
//!
//! The host is only seen through two collaborators: a configuration source
//! and a file repository that receives the adapter.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{info, warn};

use crate::adapter::UploadAdapter;
use crate::config::{UploadConfig, CONFIG_KEY};
use crate::error::ConfigError;

/// Diagnostic code emitted when the block exists but has no `uploadUrl`
pub const DIAG_MISSING_UPLOAD_URL: &str = "simple-upload-adapter-missing-uploadurl";

/// Diagnostic code for any other invalid `simpleUpload` block
pub const DIAG_INVALID_CONFIG: &str = "simple-upload-adapter-invalid-config";

/// Host configuration resolution
pub trait ConfigSource {
    fn get(&self, key: &str) -> Option<Value>;
}

/// Dot-separated lookup into a JSON document; `null` counts as absent
impl ConfigSource for Value {
    fn get(&self, key: &str) -> Option<Value> {
        let mut current = self;
        for segment in key.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        (!current.is_null()).then(|| current.clone())
    }
}

/// Host capability that hands files to an upload adapter
pub trait FileRepository: Send + Sync {
    fn register_upload_adapter(&self, adapter: Arc<UploadAdapter>);
}

/// File repository keeping the registered adapter in memory
#[derive(Debug, Default)]
pub struct InMemoryFileRepository {
    adapter: Mutex<Option<Arc<UploadAdapter>>>,
}

impl InMemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adapter(&self) -> Option<Arc<UploadAdapter>> {
        self.adapter
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn has_adapter(&self) -> bool {
        self.adapter().is_some()
    }
}

impl FileRepository for InMemoryFileRepository {
    fn register_upload_adapter(&self, adapter: Arc<UploadAdapter>) {
        *self.adapter.lock().unwrap_or_else(|e| e.into_inner()) = Some(adapter);
    }
}

/// Result of plugin initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginStatus {
    /// Adapter handed to the file repository
    Registered,
    /// No `simpleUpload` block, nothing to do
    NotConfigured,
    /// Block present but unusable; a diagnostic was emitted
    Misconfigured(ConfigError),
}

impl PluginStatus {
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered)
    }
}

pub struct SimpleUploadPlugin;

impl SimpleUploadPlugin {
    pub const PLUGIN_NAME: &'static str = "SimpleUploadAdapter";

    /// Read `simpleUpload` from the host and register an adapter if it is valid.
    ///
    /// Configuration problems never fail the host: they are reported once
    /// as a warning and the adapter simply stays inactive.
    pub fn init(config: &dyn ConfigSource, repository: &dyn FileRepository) -> PluginStatus {
        let Some(block) = config.get(CONFIG_KEY) else {
            return PluginStatus::NotConfigured;
        };

        let adapter = UploadConfig::from_value(block).and_then(UploadAdapter::new);

        match adapter {
            Ok(adapter) => {
                info!(
                    "{} registered for {} ({})",
                    Self::PLUGIN_NAME,
                    adapter.config().upload_url,
                    adapter.interpreter().name()
                );
                repository.register_upload_adapter(Arc::new(adapter));
                PluginStatus::Registered
            }
            Err(err) => {
                let code = match err {
                    ConfigError::MissingUploadUrl => DIAG_MISSING_UPLOAD_URL,
                    _ => DIAG_INVALID_CONFIG,
                };
                warn!(code, "{} not activated: {}", Self::PLUGIN_NAME, err);
                PluginStatus::Misconfigured(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_source_dot_path() {
        let host = json!({ "simpleUpload": { "uploadUrl": "https://up.example" }, "empty": null });
        assert_eq!(
            ConfigSource::get(&host, "simpleUpload.uploadUrl"),
            Some(json!("https://up.example"))
        );
        assert_eq!(ConfigSource::get(&host, "missing"), None);
        assert_eq!(ConfigSource::get(&host, "empty"), None);
        assert_eq!(ConfigSource::get(&host, "simpleUpload.uploadUrl.deeper"), None);
    }

    #[test]
    fn test_absent_block_is_silent_noop() {
        let repo = InMemoryFileRepository::new();
        let status = SimpleUploadPlugin::init(&json!({ "toolbar": [] }), &repo);
        assert_eq!(status, PluginStatus::NotConfigured);
        assert!(!repo.has_adapter());
    }

    #[test]
    fn test_missing_upload_url_is_misconfigured() {
        let repo = InMemoryFileRepository::new();
        let host = json!({ "simpleUpload": { "headers": { "X-Token": "t" } } });
        let status = SimpleUploadPlugin::init(&host, &repo);
        assert_eq!(status, PluginStatus::Misconfigured(ConfigError::MissingUploadUrl));
        assert!(!repo.has_adapter());
    }

    #[test]
    fn test_valid_block_registers_adapter() {
        let repo = InMemoryFileRepository::new();
        let host = json!({ "simpleUpload": { "uploadUrl": "https://up.example/upload" } });
        let status = SimpleUploadPlugin::init(&host, &repo);
        assert!(status.is_registered());
        let adapter = repo.adapter().unwrap();
        assert_eq!(adapter.config().upload_url, "https://up.example/upload");
    }
}
