//! HTTP upload logger
//!
//! Appends every upload request and its outcome to a file when enabled.
//! Set `EDITOR_UPLOAD_HTTP_LOG=1` (or `true`/`yes`/`on`) to enable.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use chrono::Local;
use tracing::warn;

use crate::task::FileBlob;

/// Environment variable to control HTTP logging
const ENV_HTTP_LOG: &str = "EDITOR_UPLOAD_HTTP_LOG";

/// Directory (relative to the log root) holding the log file
const LOG_DIR_NAME: &str = ".editor-upload";

const LOG_FILE_NAME: &str = "http_requests.log";

/// Maximum response body size to log (10KB)
const MAX_BODY_SIZE: usize = 10000;

/// Headers whose values never reach the log in clear text
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "set-cookie",
    "cookie",
    "x-api-key",
    "x-auth-token",
    "x-csrf-token",
    "proxy-authorization",
];

/// Serializes writers from concurrent uploads
static LOG_MUTEX: Mutex<()> = Mutex::new(());

/// Check if HTTP logging is enabled
pub fn is_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var(ENV_HTTP_LOG)
            .map(|v| is_truthy_flag(&v))
            .unwrap_or(false)
    })
}

fn is_truthy_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn log_file_path(root: Option<&Path>) -> PathBuf {
    let dir = root.unwrap_or_else(|| Path::new(".")).join(LOG_DIR_NAME);
    if !dir.exists() {
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("Failed to create {} directory: {}", LOG_DIR_NAME, e);
        }
    }
    dir.join(LOG_FILE_NAME)
}

/// Outgoing upload as it appears in the log
#[derive(Debug, Clone)]
pub struct HttpRequestLog {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// One line per multipart field
    pub fields: Vec<String>,
}

/// Response as it appears in the log
#[derive(Debug, Clone)]
pub struct HttpResponseLog {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Describe an upload request, or None when logging is disabled
pub fn build_request_log_if_enabled(
    url: &str,
    headers: &BTreeMap<String, String>,
    file_field: &str,
    file: &FileBlob,
    extra_fields: &BTreeMap<String, String>,
) -> Option<HttpRequestLog> {
    if !is_enabled() {
        return None;
    }
    Some(build_request_log(url, headers, file_field, file, extra_fields))
}

pub fn build_request_log(
    url: &str,
    headers: &BTreeMap<String, String>,
    file_field: &str,
    file: &FileBlob,
    extra_fields: &BTreeMap<String, String>,
) -> HttpRequestLog {
    let mut fields = vec![format!(
        "{}: <file {} ({} bytes, {})>",
        file_field,
        file.name,
        file.len(),
        file.mime.as_deref().unwrap_or("application/octet-stream")
    )];
    fields.extend(extra_fields.iter().map(|(k, v)| format!("{}: {}", k, v)));

    HttpRequestLog {
        method: "POST".to_string(),
        url: url.to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        fields,
    }
}

/// Render one log entry
pub fn format_entry(
    request: &HttpRequestLog,
    response: Option<&HttpResponseLog>,
    duration_ms: u64,
    error: Option<&str>,
) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let separator = "=".repeat(80);

    let mut out = format!(
        "\n{}\n[{}] {} {}\n{}\n",
        separator, timestamp, request.method, request.url, separator
    );

    out.push_str("\n--- Request Headers ---\n");
    for (name, value) in &request.headers {
        out.push_str(&format!("{}: {}\n", name, mask_sensitive_header(name, value)));
    }

    out.push_str("\n--- Multipart Fields ---\n");
    for field in &request.fields {
        out.push_str(field);
        out.push('\n');
    }

    if let Some(resp) = response {
        out.push_str(&format!("\n--- Response ({}ms) ---\n", duration_ms));
        out.push_str(&format!("Status: {}\n", resp.status));

        out.push_str("\n--- Response Headers ---\n");
        for (name, value) in &resp.headers {
            out.push_str(&format!("{}: {}\n", name, mask_sensitive_header(name, value)));
        }

        if let Some(body) = &resp.body {
            out.push_str("\n--- Response Body ---\n");
            out.push_str(&format_body(body));
            out.push('\n');
        }
    }

    if let Some(err) = error {
        out.push_str(&format!("\n--- Error ({}ms) ---\n", duration_ms));
        out.push_str(err);
        out.push('\n');
    }

    out.push_str(&format!("\n{}\n", separator));
    out
}

/// Append an entry for a finished upload (no-op unless enabled)
pub fn log_upload(
    root: Option<&Path>,
    request: &HttpRequestLog,
    response: Option<&HttpResponseLog>,
    duration_ms: u64,
    error: Option<&str>,
) {
    if !is_enabled() {
        return;
    }

    let entry = format_entry(request, response, duration_ms, error);
    if let Err(e) = write_log(&log_file_path(root), &entry) {
        warn!("Failed to write HTTP log: {}", e);
    }
}

fn write_log(path: &Path, content: &str) -> std::io::Result<()> {
    let _guard = LOG_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

pub fn is_sensitive_header(name: &str) -> bool {
    let name = name.to_lowercase();
    SENSITIVE_HEADERS.iter().any(|h| name == *h)
}

fn mask_sensitive_header(name: &str, value: &str) -> String {
    if is_sensitive_header(name) {
        mask_token(value)
    } else {
        value.to_string()
    }
}

/// Keep an auth scheme prefix and the first/last four characters
pub fn mask_token(value: &str) -> String {
    match value.split_once(' ') {
        Some((scheme, secret)) if scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("basic") => {
            format!("{} {}", scheme, mask_middle(secret))
        }
        _ => mask_middle(value),
    }
}

fn mask_middle(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn format_body(body: &str) -> String {
    let rendered = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or_else(|| body.to_string());
    truncate_utf8_safe(&rendered, MAX_BODY_SIZE)
}

/// Truncate at a char boundary at or before `max_len` bytes
pub fn truncate_utf8_safe(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...\n[truncated, total {} bytes]", &s[..end], s.len())
}

/// Collect response headers for the log
pub fn extract_response_headers(response: &reqwest::Response) -> Vec<(String, String)> {
    response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                value.to_str().unwrap_or("<binary>").to_string(),
            )
        })
        .collect()
}
