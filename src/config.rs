//! Configuration module - the `simpleUpload` block supplied by the host

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::interpreter::ResponseInterpreter;

/// Key of the adapter's block in the host configuration
pub const CONFIG_KEY: &str = "simpleUpload";

/// Multipart field carrying the file unless configured otherwise
pub const DEFAULT_FILE_FIELD: &str = "smfile";

/// Environment variables read by `UploadConfig::from_env`
pub const ENV_UPLOAD_URL: &str = "EDITOR_UPLOAD_URL";
pub const ENV_BASE_ORIGIN: &str = "EDITOR_UPLOAD_BASE_ORIGIN";
pub const ENV_RESPONSE_FORMAT: &str = "EDITOR_UPLOAD_FORMAT";
pub const ENV_WITH_CREDENTIALS: &str = "EDITOR_UPLOAD_WITH_CREDENTIALS";
pub const ENV_FILE_FIELD: &str = "EDITOR_UPLOAD_FILE_FIELD";
pub const ENV_TIMEOUT_SECS: &str = "EDITOR_UPLOAD_TIMEOUT_SECS";

/// Which response interpreter the adapter applies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseFormat {
    /// `{success, data: {url}}` / `{error: {message}}` envelopes
    #[default]
    Envelope,
    /// `{return_code: 0, data: {downloadPath}}` responses
    ReturnCode,
}

impl std::fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Envelope => write!(f, "envelope"),
            Self::ReturnCode => write!(f, "returnCode"),
        }
    }
}

impl ResponseFormat {
    /// Parse from environment variable string
    pub fn from_env_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "returncode" | "return_code" | "return-code" => Self::ReturnCode,
            _ => Self::Envelope, // default
        }
    }
}

fn default_body() -> BTreeMap<String, String> {
    BTreeMap::from([("format".to_string(), "json".to_string())])
}

fn default_file_field() -> String {
    DEFAULT_FILE_FIELD.to_string()
}

/// Upload adapter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfig {
    #[serde(default)]
    pub upload_url: String,
    #[serde(default)]
    pub base_origin: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub with_credentials: bool,
    /// Extra multipart text fields sent alongside the file
    #[serde(default = "default_body", alias = "extraFields")]
    pub body: BTreeMap<String, String>,
    #[serde(default = "default_file_field")]
    pub file_field: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
    /// No timeout unless set; a hung request otherwise never settles by itself
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl UploadConfig {
    /// Config with defaults for everything except the endpoint
    pub fn new(upload_url: impl Into<String>) -> Self {
        Self {
            upload_url: upload_url.into(),
            base_origin: None,
            headers: BTreeMap::new(),
            with_credentials: false,
            body: default_body(),
            file_field: default_file_field(),
            response_format: ResponseFormat::default(),
            timeout_secs: None,
        }
    }

    /// Deserialize and validate a `simpleUpload` block
    pub fn from_value(value: serde_json::Value) -> std::result::Result<Self, ConfigError> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| ConfigError::InvalidBlock(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document holding either the block itself or a host
    /// configuration containing a `simpleUpload` key
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| anyhow!("Failed to parse config: {}", e))?;

        let block = match value.get(CONFIG_KEY) {
            Some(inner) => inner.clone(),
            None => value,
        };

        Ok(Self::from_value(block)?)
    }

    /// Load from `EDITOR_UPLOAD_*` environment variables
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let upload_url = non_empty(ENV_UPLOAD_URL).ok_or(ConfigError::MissingUploadUrl)?;
        let mut config = Self::new(upload_url);
        config.base_origin = non_empty(ENV_BASE_ORIGIN);

        if let Some(format) = non_empty(ENV_RESPONSE_FORMAT) {
            config.response_format = ResponseFormat::from_env_str(&format);
        }

        if let Some(flag) = non_empty(ENV_WITH_CREDENTIALS) {
            let flag = flag.to_lowercase();
            config.with_credentials = flag == "1" || flag == "true" || flag == "yes" || flag == "on";
        }

        if let Some(field) = non_empty(ENV_FILE_FIELD) {
            config.file_field = field;
        }

        if let Some(secs) = non_empty(ENV_TIMEOUT_SECS) {
            let secs = secs.parse::<u64>().map_err(|e| {
                ConfigError::InvalidBlock(format!("{} must be an integer: {}", ENV_TIMEOUT_SECS, e))
            })?;
            config.timeout_secs = Some(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let upload_url = self.upload_url.trim();
        if upload_url.is_empty() {
            return Err(ConfigError::MissingUploadUrl);
        }
        parse_http_url("uploadUrl", upload_url)?;

        if let Some(origin) = &self.base_origin {
            parse_http_url("baseOrigin", origin.trim())?;
        }

        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ConfigError::InvalidBlock(format!("invalid header name '{}'", name)))?;
            HeaderValue::from_str(value)
                .map_err(|_| ConfigError::InvalidBlock(format!("invalid value for header '{}'", name)))?;
        }

        if self.file_field.trim().is_empty() {
            return Err(ConfigError::InvalidBlock("fileField cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Origin prepended to `downloadPath` by the return-code interpreter.
    /// Falls back to the origin of `uploadUrl`.
    pub fn resolved_base_origin(&self) -> std::result::Result<String, ConfigError> {
        if let Some(origin) = &self.base_origin {
            let origin = origin.trim().trim_end_matches('/');
            if !origin.is_empty() {
                return Ok(origin.to_string());
            }
        }

        let url = parse_http_url("uploadUrl", self.upload_url.trim())?;
        Ok(url.origin().ascii_serialization())
    }

    /// Build the interpreter selected by `responseFormat`
    pub fn interpreter(&self) -> std::result::Result<ResponseInterpreter, ConfigError> {
        Ok(match self.response_format {
            ResponseFormat::Envelope => ResponseInterpreter::EnvelopeFlag,
            ResponseFormat::ReturnCode => ResponseInterpreter::ReturnCode {
                base_origin: self.resolved_base_origin()?,
            },
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn parse_http_url(field: &'static str, raw: &str) -> std::result::Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            field,
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_from_minimal_block() {
        let config = UploadConfig::from_value(json!({ "uploadUrl": "https://up.example/api" })).unwrap();
        assert_eq!(config.file_field, "smfile");
        assert_eq!(config.body.get("format").map(String::as_str), Some("json"));
        assert!(!config.with_credentials);
        assert!(config.headers.is_empty());
        assert_eq!(config.response_format, ResponseFormat::Envelope);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_explicit_body_replaces_default() {
        let config = UploadConfig::from_value(json!({
            "uploadUrl": "https://up.example/api",
            "extraFields": { "bucket": "img" }
        }))
        .unwrap();
        assert_eq!(config.body.len(), 1);
        assert_eq!(config.body.get("bucket").map(String::as_str), Some("img"));
    }

    #[test]
    fn test_missing_upload_url() {
        let err = UploadConfig::from_value(json!({ "headers": {} })).unwrap_err();
        assert_eq!(err, ConfigError::MissingUploadUrl);

        let err = UploadConfig::from_value(json!({ "uploadUrl": "   " })).unwrap_err();
        assert_eq!(err, ConfigError::MissingUploadUrl);
    }

    #[test]
    fn test_invalid_url_scheme() {
        let err = UploadConfig::from_value(json!({ "uploadUrl": "ftp://up.example" })).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { field: "uploadUrl", .. }));
    }

    #[test]
    fn test_wrong_type_is_invalid_block() {
        let err = UploadConfig::from_value(json!({ "uploadUrl": 42 })).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBlock(_)));
    }

    #[test]
    fn test_invalid_header_rejected() {
        let err = UploadConfig::from_value(json!({
            "uploadUrl": "https://up.example",
            "headers": { "bad header": "x" }
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBlock(_)));
    }

    #[test]
    fn test_from_lookup() {
        let vars = std::collections::HashMap::from([
            (ENV_UPLOAD_URL, "https://up.example/api"),
            (ENV_RESPONSE_FORMAT, "returnCode"),
            (ENV_WITH_CREDENTIALS, "yes"),
            (ENV_TIMEOUT_SECS, "30"),
        ]);
        let config = UploadConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.upload_url, "https://up.example/api");
        assert_eq!(config.response_format, ResponseFormat::ReturnCode);
        assert!(config.with_credentials);
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.file_field, DEFAULT_FILE_FIELD);
    }

    #[test]
    fn test_from_lookup_requires_url() {
        let err = UploadConfig::from_lookup(|_| None).unwrap_err();
        assert_eq!(err, ConfigError::MissingUploadUrl);

        let vars = std::collections::HashMap::from([
            (ENV_UPLOAD_URL, "https://up.example"),
            (ENV_TIMEOUT_SECS, "soon"),
        ]);
        let err = UploadConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBlock(_)));
    }

    #[test]
    fn test_base_origin_defaults_to_upload_origin() {
        let config = UploadConfig::new("https://up.example:8443/api/v1/upload");
        assert_eq!(config.resolved_base_origin().unwrap(), "https://up.example:8443");
    }

    #[test]
    fn test_base_origin_trailing_slash_trimmed() {
        let mut config = UploadConfig::new("https://up.example/api");
        config.base_origin = Some("https://cdn.example/".to_string());
        assert_eq!(config.resolved_base_origin().unwrap(), "https://cdn.example");
    }

    #[test]
    fn test_response_format_from_env_str() {
        assert_eq!(ResponseFormat::from_env_str("returnCode"), ResponseFormat::ReturnCode);
        assert_eq!(ResponseFormat::from_env_str(" RETURN_CODE "), ResponseFormat::ReturnCode);
        assert_eq!(ResponseFormat::from_env_str("envelope"), ResponseFormat::Envelope);
        assert_eq!(ResponseFormat::from_env_str("whatever"), ResponseFormat::Envelope);
    }

    #[test]
    fn test_from_json_str_accepts_host_document() {
        let config = UploadConfig::from_json_str(
            r#"{ "toolbar": [], "simpleUpload": { "uploadUrl": "https://up.example", "responseFormat": "returnCode" } }"#,
        )
        .unwrap();
        assert_eq!(config.response_format, ResponseFormat::ReturnCode);
    }
}
