//! Computed views derived from a snapshot. Everything here is rebuilt from
//! scratch on every reconcile.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;

use crate::approval::{report_sections, Section};
use crate::display::{format_number, parse_number, truncate, Reading};
use crate::snapshot::{
    format_timestamp, parse_timestamp, ActionExecution, EmailRecipient, IncidentReport,
    MetricSample, Monitor, PrometheusSettings, ReferenceDocument, Scenario,
};

pub const FEED_PAGE_SIZE: usize = 5;
pub const RECIPIENT_PAGE_SIZE: usize = 5;
pub const DOCUMENT_PAGE_SIZE: usize = 5;
pub const ALERT_HISTORY_LIMIT: usize = 20;
pub const DOCUMENT_SUMMARY_LIMIT: usize = 160;

const FEED_KEYWORDS: [&str; 4] = ["설정", "settings saved", "api key", "configured"];

/// Only configuration-change entries make it into the feed.
pub fn is_config_entry(entry: &str) -> bool {
    let lower = entry.to_lowercase();
    FEED_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Localize the English backend phrasing of a feed entry.
pub fn translate_feed_entry(entry: &str) -> String {
    static API_KEY: OnceLock<Option<Regex>> = OnceLock::new();

    if entry.contains("settings saved") {
        return entry.replacen("settings saved", "설정을 저장했습니다", 1);
    }
    match API_KEY
        .get_or_init(|| Regex::new(r"(?i)api key configured").ok())
        .as_ref()
    {
        Some(re) => re.replacen(entry, 1, "API Key가 설정되었습니다").into_owned(),
        None => entry.to_string(),
    }
}

/// Filter, reverse to most-recent-first and translate.
pub fn config_feed(feed: &[String]) -> Vec<String> {
    feed.iter()
        .filter(|entry| is_config_entry(entry))
        .rev()
        .map(|entry| translate_feed_entry(entry))
        .collect()
}

/// Normalize addresses, drop blanks and duplicates (first wins), then order
/// most recent first. A missing timestamp counts as the epoch; unparsable
/// ones sort after everything else. Ties keep their input order.
pub fn normalize_recipients(recipients: &[EmailRecipient]) -> Vec<EmailRecipient> {
    let mut seen = HashSet::new();
    let mut normalized: Vec<EmailRecipient> = recipients
        .iter()
        .filter_map(|recipient| {
            let email = recipient.email.trim().to_lowercase();
            if email.is_empty() || !seen.insert(email.clone()) {
                return None;
            }
            Some(EmailRecipient {
                email,
                ..recipient.clone()
            })
        })
        .collect();

    normalized.sort_by(|a, b| {
        let a = created_at(a);
        let b = created_at(b);
        match (a, b) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
    normalized
}

fn created_at(recipient: &EmailRecipient) -> Option<DateTime<Utc>> {
    match recipient.created_at.as_deref().map(str::trim) {
        None | Some("") => Utc.timestamp_opt(0, 0).single(),
        Some(value) => parse_timestamp(value),
    }
}

/// One gauge: current value against its threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricReading {
    pub value: Reading,
    pub threshold: Reading,
    pub exceeded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsPanel {
    pub http: MetricReading,
    pub cpu: MetricReading,
}

impl MetricsPanel {
    /// Readings come from the latest sample. With no samples the values
    /// are "no data" and thresholds fall back to the configured ones.
    pub fn new(monitor: &Monitor, settings: &PrometheusSettings) -> Self {
        match monitor.samples.last() {
            Some(latest) => Self {
                http: MetricReading {
                    value: Reading::from_option(latest.http),
                    threshold: Reading::from_option(latest.http_threshold),
                    exceeded: latest.http_exceeded,
                },
                cpu: MetricReading {
                    value: Reading::from_option(latest.cpu),
                    threshold: Reading::from_option(latest.cpu_threshold),
                    exceeded: latest.cpu_exceeded,
                },
            },
            None => Self {
                http: MetricReading {
                    value: Reading::NoData,
                    threshold: Reading::from_option(parse_number(&settings.http_threshold)),
                    exceeded: false,
                },
                cpu: MetricReading {
                    value: Reading::NoData,
                    threshold: Reading::from_option(parse_number(&settings.cpu_threshold)),
                    exceeded: false,
                },
            },
        }
    }
}

/// A sample list row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRow {
    pub line: String,
    pub alert: bool,
}

impl SampleRow {
    pub fn new(sample: &MetricSample) -> Self {
        let node = match sample.node.as_deref() {
            Some(node) if !node.is_empty() => format!("{} · ", node),
            _ => String::new(),
        };
        Self {
            line: format!(
                "{} · {}HTTP {} / {} · CPU {} / {}",
                format_timestamp(&sample.timestamp),
                node,
                format_number(sample.http),
                format_number(sample.http_threshold),
                format_number(sample.cpu),
                format_number(sample.cpu_threshold),
            ),
            alert: sample.http_exceeded || sample.cpu_exceeded,
        }
    }
}

/// Most recent first.
pub fn sample_rows(monitor: &Monitor) -> Vec<SampleRow> {
    monitor.samples.iter().rev().map(SampleRow::new).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricKind {
    Http,
    Cpu,
}

struct HotspotHint {
    code: &'static str,
    kind: MetricKind,
    metric: &'static str,
    title: &'static str,
    hint: &'static str,
    detail: &'static str,
}

const HOTSPOTS: [HotspotHint; 2] = [
    HotspotHint {
        code: "http_5xx_surge",
        kind: MetricKind::Http,
        metric: "http_error_rate",
        title: "HTTP 5xx surge",
        hint: "5xx over threshold on checkout/gateway paths",
        detail: "http_error_rate crossed its threshold on the checkout or gateway path.",
    },
    HotspotHint {
        code: "cpu_spike_core",
        kind: MetricKind::Cpu,
        metric: "cpu_usage",
        title: "CPU usage spike",
        hint: "CPU over threshold on an edge node or hot pod",
        detail: "cpu_usage crossed its threshold on a node or pod.",
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct Hotspot {
    pub code: String,
    pub metric: String,
    pub title: String,
    pub hint: String,
    pub detail: String,
    pub value: Reading,
    pub threshold: Reading,
    pub exceeded: bool,
    /// The backend lists the scenario among its active incidents.
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotspotBadge {
    WaitingForSamples,
    Clear,
    Alerting(usize),
}

/// Alerting hotspots only.
#[derive(Debug, Clone, PartialEq)]
pub struct HotspotPanel {
    pub badge: HotspotBadge,
    pub entries: Vec<Hotspot>,
}

impl HotspotPanel {
    pub fn new(monitor: &Monitor, scenarios: &[Scenario]) -> Self {
        let latest = monitor.samples.last();
        let has_data = latest.is_some() || !monitor.active_incidents.is_empty();

        let entries: Vec<Hotspot> = HOTSPOTS
            .iter()
            .map(|hint| build_hotspot(hint, monitor, scenarios))
            .filter(|entry| entry.exceeded || entry.active)
            .collect();

        let badge = if !has_data {
            HotspotBadge::WaitingForSamples
        } else if entries.is_empty() {
            HotspotBadge::Clear
        } else {
            HotspotBadge::Alerting(entries.len())
        };
        Self { badge, entries }
    }
}

fn build_hotspot(hint: &HotspotHint, monitor: &Monitor, scenarios: &[Scenario]) -> Hotspot {
    let exceeded = |sample: &MetricSample| match hint.kind {
        MetricKind::Http => sample.http_exceeded,
        MetricKind::Cpu => sample.cpu_exceeded,
    };
    // Most recent sample where this metric tripped, else the latest.
    let sample = monitor
        .samples
        .iter()
        .rev()
        .find(|s| exceeded(s))
        .or(monitor.samples.last());

    let scenario = scenarios.iter().find(|s| s.code == hint.code);
    let title = scenario
        .map(|s| s.title.as_str())
        .filter(|t| !t.is_empty())
        .unwrap_or(hint.title);

    let node = sample
        .and_then(|s| s.node.as_deref())
        .or_else(|| monitor.samples.last().and_then(|s| s.node.as_deref()))
        .filter(|n| !n.is_empty());
    let detail = match node {
        Some(node) => format!("{} crossed its threshold on {}.", hint.metric, node),
        None => hint.detail.to_string(),
    };

    let (value, threshold) = match (sample, hint.kind) {
        (Some(s), MetricKind::Http) => (s.http, s.http_threshold),
        (Some(s), MetricKind::Cpu) => (s.cpu, s.cpu_threshold),
        (None, _) => (None, None),
    };

    Hotspot {
        code: hint.code.to_string(),
        metric: hint.metric.to_string(),
        title: title.to_string(),
        hint: hint.hint.to_string(),
        detail,
        value: Reading::from_option(value),
        threshold: Reading::from_option(threshold),
        exceeded: sample.is_some_and(exceeded),
        active: monitor.active_incidents.iter().any(|code| code == hint.code),
    }
}

/// The incident analysis panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisPanel {
    Report {
        title: String,
        sections: Vec<Section>,
    },
    Scenario {
        title: String,
        description: String,
        hypotheses: Vec<String>,
        evidences: Vec<String>,
        actions: Vec<String>,
    },
    Empty,
}

impl AnalysisPanel {
    /// The last report wins over the last alert.
    pub fn new(last_report: Option<&IncidentReport>, last_alert: Option<&Scenario>) -> Self {
        if let Some(report) = last_report {
            return Self::Report {
                title: report.title.clone(),
                sections: report_sections(report),
            };
        }
        match last_alert {
            Some(scenario) => Self::Scenario {
                title: scenario.title.clone(),
                description: if scenario.description.is_empty() {
                    "No scenario description.".to_string()
                } else {
                    scenario.description.clone()
                },
                hypotheses: scenario.hypotheses.clone(),
                evidences: scenario.evidences.clone(),
                actions: scenario.actions.clone(),
            },
            None => Self::Empty,
        }
    }
}

/// An entry of the action execution history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResultRow {
    pub id: String,
    pub title: String,
    pub status: String,
    pub meta: String,
    pub actions: Vec<String>,
    pub results: Vec<String>,
}

impl ActionResultRow {
    pub fn new(execution: &ActionExecution) -> Self {
        let created = format_timestamp(&execution.created_at);
        let meta = match execution.executed_at.as_deref().filter(|s| !s.is_empty()) {
            Some(executed) => {
                format!("requested {} · executed {}", created, format_timestamp(executed))
            }
            None => format!("requested {}", created),
        };
        let results = execution
            .results
            .iter()
            .map(|result| {
                let action = non_empty(&result.action, "action");
                let status = non_empty(&result.status, "check result");
                let mut line = format!("{}: {}", action, status);
                if !result.executed_at.is_empty() {
                    line.push_str(&format!(" · {}", format_timestamp(&result.executed_at)));
                }
                if !result.detail.is_empty() {
                    line.push_str(&format!(" ({})", result.detail));
                }
                line
            })
            .collect();

        Self {
            id: execution.id.clone(),
            title: if execution.scenario_title.is_empty() {
                "Remediation plan".to_string()
            } else {
                execution.scenario_title.clone()
            },
            status: execution.status.label().to_string(),
            meta,
            actions: execution.actions.clone(),
            results,
        }
    }
}

/// Most recent first.
pub fn action_results(executions: &[ActionExecution]) -> Vec<ActionResultRow> {
    executions.iter().rev().map(ActionResultRow::new).collect()
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

/// A reference document table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRow {
    pub title: String,
    pub doc_type: Option<String>,
    pub scenario_code: String,
    pub status: String,
    pub recovery: String,
    pub created_at: String,
    pub summary: String,
}

impl DocumentRow {
    pub fn new(doc: &ReferenceDocument) -> Self {
        let status = doc.attr("status").unwrap_or("reference").to_lowercase();
        let recovery = doc.attr("recovery_status").unwrap_or("unknown").to_lowercase();
        let created_at = doc
            .attr("created_at")
            .map(format_timestamp)
            .unwrap_or_else(|| "--".to_string());
        let summary = doc
            .attr("summary")
            .map(|s| truncate(s, DOCUMENT_SUMMARY_LIMIT))
            .unwrap_or_else(|| "--".to_string());

        Self {
            title: doc.attr("title").unwrap_or("Untitled").to_string(),
            doc_type: doc.attr("type").map(str::to_string),
            scenario_code: doc.attr("scenario_code").unwrap_or("--").to_string(),
            status: status_label(&status),
            recovery: recovery_label(&recovery),
            created_at,
            summary,
        }
    }
}

fn status_label(key: &str) -> String {
    match key {
        "executed" => "Approved",
        "deferred" => "Deferred",
        "report" => "Report",
        "reference" => "Reference",
        other => other,
    }
    .to_string()
}

fn recovery_label(key: &str) -> String {
    match key {
        "recovered" => "Recovered",
        "pending" => "Pending",
        "not_executed" => "Not Executed",
        "not_applicable" => "N/A",
        "unknown" => "Unknown",
        other => other,
    }
    .to_string()
}
