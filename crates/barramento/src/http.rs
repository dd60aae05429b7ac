//! Pieces shared by the two HTTP collaborators.

use reqwest::{StatusCode, Url};
use serde_json::Value;

use crate::error::{ClientError, ConfigError};
use crate::sanitize;

/// Parses a service base URL, adding the trailing slash `Url::join` needs.
pub(crate) fn base_url(raw: &str) -> Result<Url, ConfigError> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&with_slash).map_err(|e| ConfigError::Validation {
        message: format!("Invalid URL '{}': {}", sanitize::redact_url(raw), e),
    })
}

/// Turns a non-2xx response into `ClientError::Status`, using the body's
/// `message` when there is one.
pub(crate) fn status_error(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| json["message"].as_str().map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            let body = sanitize::truncate_body(body);
            if body.is_empty() || body.starts_with('<') {
                status.canonical_reason().unwrap_or("Request failed").to_string()
            } else {
                body
            }
        });
    ClientError::Status {
        status: status.as_u16(),
        message,
    }
}
