//! Return-code responses: `{"return_code": 0, "data": {"downloadPath": ...}}`

use serde_json::{Map, Value};

use super::{non_empty_str, Rejection};

pub fn interpret_return_code(
    base_origin: &str,
    response: &Map<String, Value>,
) -> Result<String, Rejection> {
    let code_is_zero = response
        .get("return_code")
        .and_then(Value::as_f64)
        .map(|code| code == 0.0)
        .unwrap_or(false);

    if !code_is_zero {
        let message = non_empty_str(response.get("message"))
            .or_else(|| non_empty_str(response.get("msg")));
        return Err(match message {
            Some(message) => Rejection::Message(message.to_string()),
            None => Rejection::Generic,
        });
    }

    let path = non_empty_str(response.get("data").and_then(|d| d.get("downloadPath")))
        .ok_or(Rejection::Generic)?;

    Ok(join_origin(base_origin, path))
}

/// Concatenate origin and path with exactly one `/` between them
pub fn join_origin(origin: &str, path: &str) -> String {
    let origin = origin.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}", origin, path)
}
