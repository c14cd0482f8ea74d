use crate::display::format_number;
use crate::snapshot::{
    format_timestamp, ActionExecution, ActionStatus, IncidentReport, MetricSample,
};
use crate::transport::{Api, Backend, TransportError};

use super::ApprovalItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDecision {
    Acknowledge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionDecision {
    Approve,
    Defer,
}

impl ApprovalItem for IncidentReport {
    type Decision = ReportDecision;
    const KIND: &'static str = "reports";

    fn id(&self) -> &str {
        &self.id
    }

    async fn resolve<B: Backend>(
        api: &Api<B>,
        id: &str,
        decision: ReportDecision,
    ) -> Result<(), TransportError> {
        match decision {
            ReportDecision::Acknowledge => api.acknowledge_report(id).await,
        }
    }

    fn resolved_message(_: ReportDecision) -> &'static str {
        "Report acknowledged."
    }
}

impl ApprovalItem for ActionExecution {
    type Decision = ActionDecision;
    const KIND: &'static str = "actions";

    fn id(&self) -> &str {
        &self.id
    }

    fn awaiting_decision(&self) -> bool {
        self.status == ActionStatus::Pending
    }

    async fn resolve<B: Backend>(
        api: &Api<B>,
        id: &str,
        decision: ActionDecision,
    ) -> Result<(), TransportError> {
        match decision {
            ActionDecision::Approve => api.execute_action(id).await,
            ActionDecision::Defer => api.defer_action(id).await,
        }
    }

    fn resolved_message(decision: ActionDecision) -> &'static str {
        match decision {
            ActionDecision::Approve => "Actions approved and executed.",
            ActionDecision::Defer => "Actions deferred.",
        }
    }
}

/// A titled block of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: &'static str,
    pub body: SectionBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    Text(String),
    List(Vec<String>),
}

fn text_or(value: &str, fallback: &str) -> SectionBody {
    if value.trim().is_empty() {
        SectionBody::Text(fallback.to_string())
    } else {
        SectionBody::Text(value.to_string())
    }
}

fn list_or(items: &[String], fallback: &str) -> SectionBody {
    if items.is_empty() {
        SectionBody::List(vec![fallback.to_string()])
    } else {
        SectionBody::List(items.to_vec())
    }
}

/// `HTTP value / threshold · CPU value / threshold`
pub fn metrics_line(sample: Option<&MetricSample>) -> String {
    let field = |f: fn(&MetricSample) -> Option<f64>| format_number(sample.and_then(f));
    format!(
        "HTTP {} / {} · CPU {} / {}",
        field(|s| s.http),
        field(|s| s.http_threshold),
        field(|s| s.cpu),
        field(|s| s.cpu_threshold),
    )
}

/// The sections shared by the report dialog and the analysis panel.
pub fn report_sections(report: &IncidentReport) -> Vec<Section> {
    vec![
        Section {
            heading: "Summary",
            body: text_or(&report.summary, "No summary available."),
        },
        Section {
            heading: "Root Cause",
            body: text_or(&report.root_cause, "Root cause analysis required."),
        },
        Section {
            heading: "Impact",
            body: text_or(&report.impact, "Impact is being assessed."),
        },
        Section {
            heading: "Action Items",
            body: list_or(&report.action_items, "No action items registered."),
        },
        Section {
            heading: "Follow-up",
            body: list_or(&report.follow_up, "No further follow-up."),
        },
        Section {
            heading: "Metrics",
            body: SectionBody::Text(metrics_line(report.metrics.as_ref())),
        },
    ]
}

/// What the report dialog shows for the presented report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportView {
    pub title: String,
    pub timestamp: String,
    pub status: &'static str,
    pub sections: Vec<Section>,
    pub hint: String,
}

impl ReportView {
    pub fn new(report: &IncidentReport) -> Self {
        let title = if report.title.trim().is_empty() {
            "Automatic detection report".to_string()
        } else {
            report.title.clone()
        };
        let created = if report.created_at.is_empty() {
            report.metrics.as_ref().map(|m| m.timestamp.as_str()).unwrap_or("")
        } else {
            report.created_at.as_str()
        };

        let sent: Vec<&str> = non_empty(&report.recipients_sent);
        let missing: Vec<&str> = non_empty(&report.recipients_missing);
        let status = if missing.is_empty() {
            "delivered"
        } else {
            "manual follow-up required"
        };

        let mut hints = Vec::new();
        if !sent.is_empty() {
            hints.push(format!("Delivered to: {}", sent.join(", ")));
        }
        if !missing.is_empty() {
            hints.push(format!("Still to notify: {}", missing.join(", ")));
        }
        let hint = if hints.is_empty() {
            "Review the report, then acknowledge it.".to_string()
        } else {
            hints.join(" · ")
        };

        Self {
            title,
            timestamp: format_timestamp(created),
            status,
            sections: report_sections(report),
            hint,
        }
    }
}

fn non_empty(items: &[String]) -> Vec<&str> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

/// What the action dialog shows for the presented plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionView {
    pub title: String,
    pub subtitle: String,
    pub status: String,
    pub steps: Vec<String>,
}

impl ActionView {
    pub fn new(execution: &ActionExecution) -> Self {
        let title = match (execution.scenario_title.trim(), execution.scenario_code.trim()) {
            ("", "") => "Remediation plan".to_string(),
            ("", code) => code.to_string(),
            (title, _) => title.to_string(),
        };
        let steps = if execution.actions.is_empty() {
            vec!["No action items registered.".to_string()]
        } else {
            execution.actions.clone()
        };
        Self {
            title,
            subtitle: format_timestamp(&execution.created_at),
            status: execution.status.label().to_string(),
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_view_status_and_hint() {
        let report: IncidentReport = serde_json::from_value(json!({
            "id": "r1",
            "title": "HTTP 5xx surge",
            "created_at": "2024-05-01T10:00:00Z",
            "recipients_sent": ["slack", ""],
            "recipients_missing": ["jira"],
        }))
        .unwrap();

        let view = ReportView::new(&report);
        assert_eq!(view.status, "manual follow-up required");
        assert_eq!(view.hint, "Delivered to: slack · Still to notify: jira");
        assert_eq!(view.timestamp, "2024-05-01 10:00:00");
        assert_eq!(
            view.sections[0].body,
            SectionBody::Text("No summary available.".to_string())
        );
    }

    #[test]
    fn test_report_without_recipients_is_delivered() {
        let view = ReportView::new(&IncidentReport::default());
        assert_eq!(view.status, "delivered");
        assert_eq!(view.title, "Automatic detection report");
        assert_eq!(view.hint, "Review the report, then acknowledge it.");
    }

    #[test]
    fn test_metrics_line_marks_missing_values() {
        let sample = MetricSample {
            http: Some(0.12),
            http_threshold: Some(0.05),
            ..Default::default()
        };
        assert_eq!(metrics_line(Some(&sample)), "HTTP 0.1200 / 0.0500 · CPU -- / --");
        assert_eq!(metrics_line(None), "HTTP -- / -- · CPU -- / --");
    }

    #[test]
    fn test_action_view() {
        let execution = ActionExecution {
            id: "a1".to_string(),
            scenario_code: "cpu_spike_core".to_string(),
            actions: vec!["scale out".to_string()],
            ..Default::default()
        };
        let view = ActionView::new(&execution);
        assert_eq!(view.title, "cpu_spike_core");
        assert_eq!(view.status, "Pending");
        assert_eq!(view.steps, vec!["scale out"]);
    }
}
