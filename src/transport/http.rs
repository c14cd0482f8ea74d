//! HTTP transport implementation.

use std::time::Duration;

use serde_json::Value;

use super::{error_message, parse_body, Backend, Body, Method, Request, TransportError};

/// Backend reached over HTTP with JSON bodies.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport for the given base URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base_url = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            base_url.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", base_url.trim_end_matches('/'))
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Backend for HttpTransport {
    async fn send(&self, request: Request) -> Result<Value, TransportError> {
        let url = self.url(&request.path);
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };

        let builder = match request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::File(file) => {
                let part = reqwest::multipart::Part::bytes(file.bytes)
                    .file_name(file.file_name)
                    .mime_str(&file.mime)
                    .map_err(|e| TransportError::Network(e.to_string()))?;
                builder.multipart(reqwest::multipart::Form::new().part("file", part))
            }
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Network(format!("request to {} timed out", request.path))
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let data = parse_body(&raw);

        if !status.is_success() {
            let message = error_message(status.as_u16(), &data);
            tracing::debug!(
                path = %request.path,
                status = status.as_u16(),
                "backend rejected request"
            );
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(data)
    }
}
