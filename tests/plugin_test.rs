//! Tests for plugin registration against host collaborators

use std::sync::Arc;

use editor_upload::{
    ConfigError, ConfigSource, FileBlob, FileRepository, InMemoryFileRepository, PluginStatus,
    SimpleUploadPlugin, UploadAdapter, UploadTask,
};
use serde_json::{json, Value};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Host configuration backed by a flat list of resolved keys
struct StaticHostConfig(Vec<(&'static str, Value)>);

impl ConfigSource for StaticHostConfig {
    fn get(&self, key: &str) -> Option<Value> {
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
    }
}

/// Repository that only counts registrations
#[derive(Default)]
struct CountingRepository {
    count: std::sync::atomic::AtomicUsize,
}

impl FileRepository for CountingRepository {
    fn register_upload_adapter(&self, _adapter: Arc<UploadAdapter>) {
        self.count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_missing_upload_url_never_sends_a_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let host = json!({
        "simpleUpload": {
            "baseOrigin": mock_server.uri(),
            "headers": { "X-Token": "t" }
        }
    });
    let repository = InMemoryFileRepository::new();

    let status = SimpleUploadPlugin::init(&host, &repository);

    assert_eq!(status, PluginStatus::Misconfigured(ConfigError::MissingUploadUrl));
    assert!(!repository.has_adapter());
}

#[test]
fn test_no_block_registers_nothing() {
    let repository = CountingRepository::default();
    let status = SimpleUploadPlugin::init(&StaticHostConfig(vec![]), &repository);

    assert_eq!(status, PluginStatus::NotConfigured);
    assert_eq!(repository.count.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[test]
fn test_invalid_block_registers_nothing() {
    let repository = CountingRepository::default();
    let host = StaticHostConfig(vec![(
        "simpleUpload",
        json!({ "uploadUrl": "not a url" }),
    )]);

    let status = SimpleUploadPlugin::init(&host, &repository);

    assert!(matches!(
        status,
        PluginStatus::Misconfigured(ConfigError::InvalidUrl { field: "uploadUrl", .. })
    ));
    assert_eq!(repository.count.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[test]
fn test_custom_config_source_registers_once() {
    let repository = CountingRepository::default();
    let host = StaticHostConfig(vec![(
        "simpleUpload",
        json!({ "uploadUrl": "https://up.example/upload", "withCredentials": true }),
    )]);

    let status = SimpleUploadPlugin::init(&host, &repository);

    assert_eq!(status, PluginStatus::Registered);
    assert_eq!(repository.count.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_registered_adapter_uploads() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "return_code": 0,
            "data": { "downloadPath": "/f/9.png" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let host = json!({
        "simpleUpload": {
            "uploadUrl": format!("{}/api/upload", mock_server.uri()),
            "baseOrigin": "https://cdn.example",
            "responseFormat": "returnCode"
        }
    });
    let repository = InMemoryFileRepository::new();
    assert!(SimpleUploadPlugin::init(&host, &repository).is_registered());

    let adapter = repository.adapter().unwrap();
    let success = adapter
        .upload(&UploadTask::new(FileBlob::new("9.png", vec![1u8, 2, 3])))
        .await
        .unwrap();

    assert_eq!(success.urls.default, "https://cdn.example/f/9.png");
}
