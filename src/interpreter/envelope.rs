//! Envelope-flag responses, e.g. image hosts answering
//! `{"success": true, "data": {"url": ...}}`

use serde_json::{Map, Value};

use super::{is_truthy, non_empty_str, Rejection};

/// An explicit `error` wins; otherwise `data.url` on success, with the
/// legacy top-level `images` string as fallback.
pub fn interpret_envelope(response: &Map<String, Value>) -> Result<String, Rejection> {
    if let Some(error) = response.get("error").filter(|e| is_truthy(e)) {
        return Err(match non_empty_str(error.get("message")) {
            Some(message) => Rejection::Message(message.to_string()),
            None => Rejection::Generic,
        });
    }

    let success = response.get("success").map(is_truthy).unwrap_or(false);

    let primary = if success {
        non_empty_str(response.get("data").and_then(|d| d.get("url")))
    } else {
        None
    };

    // Duplicate uploads come back unsuccessful but still carry the
    // existing image under `images`.
    let url = primary.or_else(|| non_empty_str(response.get("images")));

    url.map(str::to_string).ok_or(Rejection::Generic)
}
