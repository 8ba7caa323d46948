//! Upload adapter - one multipart POST per task, normalized result

use std::time::Instant;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::UploadConfig;
use crate::error::{ConfigError, UploadError};
use crate::http_logger::{self, HttpRequestLog, HttpResponseLog};
use crate::interpreter::{generic_error_text, ResponseInterpreter};
use crate::task::UploadTask;

/// Size of the chunks the file part is streamed in
const CHUNK_SIZE: usize = 64 * 1024;

const DEFAULT_MIME: &str = "application/octet-stream";

/// Normalized URLs of an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadUrls {
    pub default: String,
}

/// Successful upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSuccess {
    pub urls: UploadUrls,
    /// Response fields as sent by the server, with `urls` replaced by the
    /// normalized value
    pub raw: Map<String, Value>,
}

impl UploadSuccess {
    pub fn into_json(self) -> Value {
        Value::Object(self.raw)
    }
}

/// Turn a response body into the upload result using `interpreter`
pub fn normalize_response(
    interpreter: &ResponseInterpreter,
    file_name: &str,
    body: &str,
) -> Result<UploadSuccess, UploadError> {
    let mut raw = match serde_json::from_str::<Value>(body.trim()) {
        Ok(Value::Object(map)) => map,
        _ => {
            return Err(UploadError::ServerRejected {
                message: generic_error_text(file_name),
            })
        }
    };

    let url = interpreter
        .interpret(&raw)
        .map_err(|rejection| UploadError::ServerRejected {
            message: rejection.into_message(file_name),
        })?;

    let urls = UploadUrls { default: url };
    raw.insert(
        "urls".to_string(),
        serde_json::json!({ "default": urls.default }),
    );

    Ok(UploadSuccess { urls, raw })
}

/// Uploads files to the configured endpoint.
///
/// One adapter serves any number of tasks, concurrently if the host wants;
/// each task carries its own state and cancellation.
#[derive(Debug, Clone)]
pub struct UploadAdapter {
    config: UploadConfig,
    interpreter: ResponseInterpreter,
    client: Client,
}

impl UploadAdapter {
    pub fn new(config: UploadConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut builder = Client::builder().cookie_store(config.with_credentials);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::InvalidBlock(format!("Failed to build HTTP client: {}", e)))?;

        Self::with_client(config, client)
    }

    /// Use a caller-provided client; `withCredentials` and `timeoutSecs`
    /// are then the client's business.
    pub fn with_client(config: UploadConfig, client: Client) -> Result<Self, ConfigError> {
        config.validate()?;
        let interpreter = config.interpreter()?;
        Ok(Self {
            config,
            interpreter,
            client,
        })
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn interpreter(&self) -> &ResponseInterpreter {
        &self.interpreter
    }

    /// Cancel `task` if it is in flight. See `UploadTask::abort`.
    pub fn abort(&self, task: &UploadTask) -> bool {
        let signalled = task.abort();
        if signalled {
            info!("Abort requested for upload {} ({})", task.id(), task.file().name);
        }
        signalled
    }

    /// Upload the task's file. The task must be pending.
    pub async fn upload(&self, task: &UploadTask) -> Result<UploadSuccess, UploadError> {
        let cancel = task.begin()?;
        let file = task.file();
        let start_time = Instant::now();

        info!(
            "Uploading {} ({} bytes) to {} [task {}, {}]",
            file.name,
            file.len(),
            self.config.upload_url,
            task.id(),
            self.interpreter.name()
        );

        let request_log = http_logger::build_request_log_if_enabled(
            &self.config.upload_url,
            &self.config.headers,
            &self.config.file_field,
            file,
            &self.config.body,
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if let Some(log) = &request_log {
                    let duration_ms = start_time.elapsed().as_millis() as u64;
                    http_logger::log_upload(None, log, None, duration_ms, Some("aborted"));
                }
                Err(UploadError::Aborted)
            }
            result = self.send(task, request_log.as_ref(), start_time) => result,
        };

        let result = task.settle(outcome);
        let duration_ms = start_time.elapsed().as_millis() as u64;

        match &result {
            Ok(success) => info!(
                "Upload of {} completed in {}ms: {}",
                file.name, duration_ms, success.urls.default
            ),
            Err(UploadError::Aborted) => info!("Upload of {} aborted after {}ms", file.name, duration_ms),
            Err(e) => warn!("Upload of {} failed after {}ms: {}", file.name, duration_ms, e),
        }

        result
    }

    fn build_form(&self, task: &UploadTask) -> Result<Form, UploadError> {
        let file = task.file();

        let mut chunks = Vec::with_capacity(file.bytes.len() / CHUNK_SIZE + 1);
        let mut offset = 0;
        while offset < file.bytes.len() {
            let end = (offset + CHUNK_SIZE).min(file.bytes.len());
            chunks.push(file.bytes.slice(offset..end));
            offset = end;
        }

        let progress_task = task.clone();
        let body_stream = stream::iter(chunks).map(move |chunk: Bytes| {
            progress_task.record_sent(chunk.len() as u64);
            debug!(
                "Upload {} progress: {}/{}",
                progress_task.id(),
                progress_task.bytes_sent(),
                progress_task.bytes_total().unwrap_or_default()
            );
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let mime = file.mime.as_deref().unwrap_or(DEFAULT_MIME);
        let part = Part::stream_with_length(reqwest::Body::wrap_stream(body_stream), file.len())
            .file_name(file.name.clone())
            .mime_str(mime)
            .map_err(|e| {
                warn!("Invalid mime type '{}' for {}: {}", mime, file.name, e);
                UploadError::transport(&file.name)
            })?;

        let mut form = Form::new().part(self.config.file_field.clone(), part);
        for (name, value) in &self.config.body {
            form = form.text(name.clone(), value.clone());
        }
        Ok(form)
    }

    async fn send(
        &self,
        task: &UploadTask,
        request_log: Option<&HttpRequestLog>,
        start_time: Instant,
    ) -> Result<UploadSuccess, UploadError> {
        let file = task.file();
        let form = self.build_form(task)?;

        let mut request = self.client.post(&self.config.upload_url).multipart(form);
        for (name, value) in &self.config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Upload request for {} failed: {}", file.name, e);
                if let Some(log) = request_log {
                    let duration_ms = start_time.elapsed().as_millis() as u64;
                    http_logger::log_upload(None, log, None, duration_ms, Some(&e.to_string()));
                }
                return Err(UploadError::transport(&file.name));
            }
        };

        let status = response.status();
        let response_headers = request_log
            .map(|_| http_logger::extract_response_headers(&response))
            .unwrap_or_default();

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Reading upload response for {} failed: {}", file.name, e);
                if let Some(log) = request_log {
                    let duration_ms = start_time.elapsed().as_millis() as u64;
                    http_logger::log_upload(None, log, None, duration_ms, Some(&e.to_string()));
                }
                return Err(UploadError::transport(&file.name));
            }
        };

        if let Some(log) = request_log {
            let duration_ms = start_time.elapsed().as_millis() as u64;
            let response_log = HttpResponseLog {
                status: status.as_u16(),
                headers: response_headers,
                body: Some(body.clone()),
            };
            http_logger::log_upload(None, log, Some(&response_log), duration_ms, None);
        }

        if !status.is_success() {
            debug!("Upload endpoint answered {} for {}", status, file.name);
        }

        normalize_response(&self.interpreter, &file.name, &body)
    }
}
