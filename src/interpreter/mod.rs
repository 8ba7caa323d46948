//! Response interpreters - map a server response to a URL or a rejection

mod envelope;
mod return_code;

use serde_json::{Map, Value};

pub use envelope::interpret_envelope;
pub use return_code::{interpret_return_code, join_origin};

/// Why a response was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The server explained the failure
    Message(String),
    /// No usable explanation, the caller substitutes a generic text
    Generic,
}

impl Rejection {
    /// Resolve into user-facing text
    pub fn into_message(self, file_name: &str) -> String {
        match self {
            Self::Message(message) => message,
            Self::Generic => generic_error_text(file_name),
        }
    }
}

pub fn generic_error_text(file_name: &str) -> String {
    format!("couldn't upload file: {}", file_name)
}

/// Policy turning a raw (object) response into the default URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseInterpreter {
    /// Success flagged by `success` / absence of `error`, URL in `data.url`
    EnvelopeFlag,
    /// Success flagged by `return_code == 0`, URL is `base_origin + data.downloadPath`
    ReturnCode { base_origin: String },
}

impl ResponseInterpreter {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EnvelopeFlag => "envelope",
            Self::ReturnCode { .. } => "returnCode",
        }
    }

    pub fn interpret(&self, response: &Map<String, Value>) -> Result<String, Rejection> {
        match self {
            Self::EnvelopeFlag => interpret_envelope(response),
            Self::ReturnCode { base_origin } => interpret_return_code(base_origin, response),
        }
    }
}

/// Loose truthiness as JSON APIs tend to use it: null, false, 0, "" are false
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Non-empty string at `value`, if any
pub(crate) fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
