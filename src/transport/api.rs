//! Typed backend endpoints.

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{Backend, Body, FilePart, Request, TransportError};
use crate::snapshot::{EmailRecipient, ReferenceDocument, Snapshot};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackPayload {
    pub token: String,
    pub workspace: String,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrometheusPayload {
    pub url: String,
    pub http_query: String,
    pub http_threshold: String,
    pub cpu_query: String,
    pub cpu_threshold: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrometheusTestPayload {
    pub url: String,
    pub http_query: String,
    pub cpu_query: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SlackTestResult {
    pub team: Option<String>,
    pub team_name: Option<String>,
}

impl SlackTestResult {
    pub fn team(&self) -> Option<&str> {
        self.team
            .as_deref()
            .or(self.team_name.as_deref())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PrometheusTestResult {
    pub http: Option<f64>,
    pub cpu: Option<f64>,
}

/// Acknowledgement carrying an optional human-readable message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MessageResponse {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct EmailListResponse {
    emails: Vec<EmailRecipient>,
}

/// Typed access to the backend endpoints.
pub struct Api<B> {
    backend: Arc<B>,
}

impl<B> Clone for Api<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

impl<B: Backend> Api<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn fetch_snapshot(&self) -> Result<Snapshot, TransportError> {
        decode(self.backend.send(Request::get("/state")).await?)
    }

    /// List reference documents. The backend returns either an array or a
    /// keyed object under `documents`.
    pub async fn list_documents(&self) -> Result<Vec<ReferenceDocument>, TransportError> {
        let response = self.backend.send(Request::get("/rag/documents")).await?;
        let documents = match response.get("documents") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Object(map)) => map.values().cloned().collect(),
            _ => Vec::new(),
        };
        documents
            .into_iter()
            .filter(Value::is_object)
            .map(|doc| serde_json::from_value(doc).map_err(TransportError::from))
            .collect()
    }

    pub async fn upload_document(&self, path: &Path) -> Result<MessageResponse, TransportError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| {
                TransportError::Network(format!("cannot read {}: {}", path.display(), e))
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime = mime_guess::from_path(path).first_or_octet_stream().to_string();

        let file = FilePart {
            file_name,
            mime,
            bytes,
        };
        decode(self.backend.send(Request::post("/rag/upload", Body::File(file))).await?)
    }

    pub async fn slack_test(
        &self,
        payload: &SlackPayload,
    ) -> Result<SlackTestResult, TransportError> {
        self.post_json("/slack/test", serde_json::to_value(payload)?).await
    }

    pub async fn slack_save(
        &self,
        payload: &SlackPayload,
    ) -> Result<MessageResponse, TransportError> {
        self.post_json("/slack/save", serde_json::to_value(payload)?).await
    }

    pub async fn prometheus_test(
        &self,
        payload: &PrometheusTestPayload,
    ) -> Result<PrometheusTestResult, TransportError> {
        self.post_json("/prometheus/test", serde_json::to_value(payload)?).await
    }

    pub async fn prometheus_save(
        &self,
        payload: &PrometheusPayload,
    ) -> Result<MessageResponse, TransportError> {
        self.post_json("/prometheus/save", serde_json::to_value(payload)?).await
    }

    pub async fn ai_save(&self, api_key: &str) -> Result<MessageResponse, TransportError> {
        self.post_json("/ai/save", json!({ "api_key": api_key })).await
    }

    pub async fn update_preferences(&self, slack: bool) -> Result<(), TransportError> {
        self.backend
            .send(Request::post(
                "/notifications/preferences",
                Body::Json(json!({ "slack": slack })),
            ))
            .await?;
        Ok(())
    }

    pub async fn list_emails(&self) -> Result<Vec<EmailRecipient>, TransportError> {
        let response: EmailListResponse =
            decode(self.backend.send(Request::get("/notifications/emails")).await?)?;
        Ok(response.emails)
    }

    pub async fn add_email(&self, email: &str) -> Result<(), TransportError> {
        self.backend
            .send(Request::post("/notifications/emails", Body::Json(json!({ "email": email }))))
            .await?;
        Ok(())
    }

    pub async fn delete_email(&self, id: &str) -> Result<(), TransportError> {
        let path = format!("/notifications/emails/{}", urlencoding::encode(id));
        self.backend.send(Request::delete(path)).await?;
        Ok(())
    }

    pub async fn acknowledge_report(&self, id: &str) -> Result<(), TransportError> {
        let path = format!("/notifications/pending/{}/ack", urlencoding::encode(id));
        self.backend.send(Request::post(path, Body::Empty)).await?;
        Ok(())
    }

    pub async fn execute_action(&self, id: &str) -> Result<(), TransportError> {
        let path = format!("/actions/{}/execute", urlencoding::encode(id));
        self.backend.send(Request::post(path, Body::Empty)).await?;
        Ok(())
    }

    pub async fn defer_action(&self, id: &str) -> Result<(), TransportError> {
        let path = format!("/actions/{}/defer", urlencoding::encode(id));
        self.backend.send(Request::post(path, Body::Empty)).await?;
        Ok(())
    }

    pub async fn verify_alerts(&self) -> Result<(), TransportError> {
        self.backend.send(Request::post("/alerts/verify", Body::Empty)).await?;
        Ok(())
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
    ) -> Result<T, TransportError> {
        decode(self.backend.send(Request::post(path, Body::Json(body))).await?)
    }
}

/// Decode a response body; an empty body decodes as an empty object.
fn decode<T: DeserializeOwned>(value: Value) -> Result<T, TransportError> {
    let value = match value {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records requests and answers with a fixed body.
    struct Recorder {
        requests: Mutex<Vec<Request>>,
        response: Value,
    }

    impl Backend for Recorder {
        async fn send(&self, request: Request) -> Result<Value, TransportError> {
            self.requests.lock().unwrap().push(request);
            Ok(self.response.clone())
        }
    }

    fn api(response: Value) -> (Api<Recorder>, Arc<Recorder>) {
        let backend = Arc::new(Recorder {
            requests: Mutex::new(Vec::new()),
            response,
        });
        (Api::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn test_list_documents_accepts_keyed_object() {
        let (api, _) = api(json!({
            "documents": {"a": {"title": "One"}, "b": {"metadata": {"title": "Two"}}}
        }));
        let docs = api.list_documents().await.unwrap();
        let mut titles: Vec<_> = docs.iter().filter_map(|d| d.attr("title")).collect();
        titles.sort();
        assert_eq!(titles, vec!["One", "Two"]);
    }

    #[tokio::test]
    async fn test_resolve_paths_are_keyed_by_id() {
        let (api, backend) = api(Value::Null);
        api.acknowledge_report("r 1").await.unwrap();
        api.delete_email("ops/team@example.com").await.unwrap();
        api.execute_action("a1").await.unwrap();
        api.defer_action("a2").await.unwrap();

        let paths: Vec<_> = backend
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.path.clone())
            .collect();
        assert_eq!(
            paths,
            vec![
                "/notifications/pending/r%201/ack",
                "/notifications/emails/ops%2Fteam%40example.com",
                "/actions/a1/execute",
                "/actions/a2/defer"
            ]
        );
    }

    #[test]
    fn test_empty_body_decodes_message_response() {
        let response: MessageResponse = decode(Value::Null).unwrap();
        assert_eq!(response.message, None);
    }

    #[test]
    fn test_slack_team_fallback() {
        let result: SlackTestResult = decode(json!({"team_name": "ops"})).unwrap();
        assert_eq!(result.team(), Some("ops"));
    }
}
