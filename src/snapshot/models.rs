//! Wire types for the backend state snapshot.
//!
//! Every field is optional on the wire; missing values fall back to the
//! defaults below and unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One full backend state payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub slack: SlackSettings,
    pub jira: JiraSettings,
    pub prometheus: PrometheusSettings,
    pub ai: AiState,
    pub preferences: Option<Preferences>,
    pub scenarios: Vec<Scenario>,
    pub monitor: Monitor,
    pub alert_history: Vec<String>,
    pub feed: Vec<String>,
    pub email_recipients: Vec<EmailRecipient>,
    pub pending_reports: Vec<IncidentReport>,
    pub action_executions: Vec<ActionExecution>,
    pub last_report: Option<IncidentReport>,
    pub last_alert: Option<Scenario>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackSettings {
    pub token: String,
    pub channel: String,
    pub workspace: String,
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            channel: "#ops-incident".to_string(),
            workspace: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraSettings {
    pub site: String,
    pub project: String,
    pub email: String,
    pub token: String,
}

/// Prometheus settings. Thresholds travel as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusSettings {
    pub url: String,
    pub http_query: String,
    pub http_threshold: String,
    pub cpu_query: String,
    pub cpu_threshold: String,
}

pub const DEFAULT_HTTP_THRESHOLD: &str = "0.05";
pub const DEFAULT_CPU_THRESHOLD: &str = "0.80";

impl Default for PrometheusSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            http_query: String::new(),
            http_threshold: DEFAULT_HTTP_THRESHOLD.to_string(),
            cpu_query: String::new(),
            cpu_threshold: DEFAULT_CPU_THRESHOLD.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiState {
    pub configured: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub slack: bool,
    pub jira: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self { slack: true, jira: true }
    }
}

/// A known incident scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub code: String,
    pub title: String,
    pub source: String,
    pub description: String,
    pub hypotheses: Vec<String>,
    pub evidences: Vec<String>,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitor {
    /// Oldest first; the backend appends.
    pub samples: Vec<MetricSample>,
    pub incident_active: bool,
    pub active_incidents: Vec<String>,
}

/// A single metric observation. Missing readings stay `None`, which is
/// not the same thing as a reading of zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSample {
    pub timestamp: String,
    pub node: Option<String>,
    pub http: Option<f64>,
    pub http_threshold: Option<f64>,
    pub http_exceeded: bool,
    pub cpu: Option<f64>,
    pub cpu_threshold: Option<f64>,
    pub cpu_exceeded: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailRecipient {
    pub id: String,
    pub email: String,
    pub created_at: Option<String>,
}

/// An automatically generated report awaiting acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncidentReport {
    pub id: String,
    pub scenario_code: String,
    pub title: String,
    pub created_at: String,
    pub report_body: String,
    pub metrics: Option<MetricSample>,
    pub summary: String,
    pub root_cause: String,
    pub impact: String,
    pub action_items: Vec<String>,
    pub follow_up: Vec<String>,
    pub recipients_sent: Vec<String>,
    pub recipients_missing: Vec<String>,
}

/// Lifecycle status of an action execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionStatus {
    #[default]
    Pending,
    Executed,
    Deferred,
    Other(String),
}

impl From<String> for ActionStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "pending" => Self::Pending,
            "executed" => Self::Executed,
            "deferred" => Self::Deferred,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<ActionStatus> for String {
    fn from(value: ActionStatus) -> Self {
        value.as_str().to_string()
    }
}

impl ActionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Executed => "executed",
            Self::Deferred => "deferred",
            Self::Other(s) => s,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Executed => "Executed",
            Self::Deferred => "Deferred",
            Self::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionResult {
    pub action: String,
    pub status: String,
    pub detail: String,
    pub executed_at: String,
}

/// A proposed remediation plan awaiting approval, or its outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionExecution {
    pub id: String,
    pub report_id: String,
    pub scenario_code: String,
    pub scenario_title: String,
    pub created_at: String,
    pub actions: Vec<String>,
    pub status: ActionStatus,
    pub executed_at: Option<String>,
    pub results: Vec<ActionResult>,
}

/// A reference document as listed by the backend.
///
/// Attributes may live under `metadata` or at the top level; `metadata`
/// wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDocument {
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ReferenceDocument {
    /// Look up a string attribute, `metadata` first.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|meta| meta.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| self.fields.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()))
    }
}
