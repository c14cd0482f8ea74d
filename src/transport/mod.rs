//! Transport module for talking to the console backend.
//!
//! Every request goes through [`Backend::send`], which normalizes transport
//! failures and non-success statuses into a single [`TransportError`]
//! carrying a human-readable message.

mod api;
mod http;

pub use api::*;
pub use http::*;

use serde_json::Value;
use std::future::Future;
use thiserror::Error;

/// Transport error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// No response was received.
    #[error("network request failed: {0}")]
    Network(String),
    /// The backend answered with a non-success status.
    #[error("{message}")]
    Status { status: u16, message: String },
    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// A file sent as the `file` part of a multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    File(FilePart),
}

/// A request to the backend, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Body,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: Body::Empty,
        }
    }

    pub fn post(path: impl Into<String>, body: Body) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: Body::Empty,
        }
    }
}

/// Anything that can carry a [`Request`] to the backend.
///
/// The response body is returned parsed as JSON when possible, as a JSON
/// string when it is plain text, and as `null` when it is empty.
pub trait Backend: Send + Sync + 'static {
    fn send(&self, request: Request) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

/// Parse a raw response body.
pub fn parse_body(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Pick the message shown for a non-success response.
///
/// Order: `detail`, then `message`, then a plain-text body, then the bare
/// status code.
pub fn error_message(status: u16, body: &Value) -> String {
    let field = |key: &str| match body.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };

    field("detail")
        .or_else(|| field("message"))
        .or_else(|| match body {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_else(|| format!("HTTP {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body(r#"{"ok": true}"#), json!({"ok": true}));
        assert_eq!(parse_body("Internal Server Error"), json!("Internal Server Error"));
    }

    #[test]
    fn test_error_message_precedence() {
        assert_eq!(
            error_message(502, &json!({"detail": "slack down", "message": "ignored"})),
            "slack down"
        );
        assert_eq!(error_message(400, &json!({"message": "bad input"})), "bad input");
        assert_eq!(error_message(500, &json!("boom")), "boom");
        assert_eq!(error_message(404, &Value::Null), "HTTP 404");
        assert_eq!(error_message(422, &json!({"detail": ""})), "HTTP 422");
    }

    #[test]
    fn test_status_error_displays_message_only() {
        let err = TransportError::Status {
            status: 502,
            message: "Slack API error".to_string(),
        };
        assert_eq!(err.to_string(), "Slack API error");
    }
}
