//! Plain-text rendering of the console state for the operator terminal.

use std::fmt::Write;

use crate::approval::{ActionView, ReportView, Section, SectionBody};
use crate::fields::FieldId;
use crate::notify::{Notifier, Phase};
use crate::pagination::{self, PageView};
use crate::reconcile::{AnalysisPanel, ConsoleState, HotspotBadge, MetricReading};

/// Rows of samples and alerts shown by the status screen.
const PREVIEW_ROWS: usize = 5;

/// Render everything the console currently shows.
pub fn render_status(state: &ConsoleState, notifier: &Notifier) -> String {
    let mut out = String::new();
    // Writing into a String can't fail.
    let _ = write_status(&mut out, state, notifier);
    out
}

fn write_status(out: &mut String, state: &ConsoleState, notifier: &Notifier) -> std::fmt::Result {
    writeln!(out, "== Incident Console (snapshots merged: {}) ==", state.reconcile_count())?;
    if let Some((toast, phase)) = notifier.current() {
        let fading = if phase == Phase::Fading { " (fading)" } else { "" };
        writeln!(out, "[{:?}] {}{}", toast.variant, toast.message, fading)?;
    }

    write_settings(out, state)?;
    write_monitor(out, state)?;
    write_analysis(out, &state.analysis)?;
    write_queues(out, state)?;
    write_lists(out, state)?;
    Ok(())
}

fn write_settings(out: &mut String, state: &ConsoleState) -> std::fmt::Result {
    let fields = &state.fields;
    let selected = fields.value(FieldId::SlackChannel);

    writeln!(out, "-- Settings --")?;
    writeln!(out, "Slack workspace: {}", or_dash(fields.value(FieldId::SlackWorkspace)))?;
    let options: Vec<String> = state
        .channels
        .options(selected)
        .iter()
        .map(|c| {
            if c.as_str() == selected {
                format!("[{}]", c)
            } else {
                c.to_string()
            }
        })
        .collect();
    writeln!(out, "Slack channel: {}", options.join(" "))?;
    if state.channels.removable(selected) {
        writeln!(out, "  {} is a custom channel and can be removed", selected)?;
    }
    writeln!(
        out,
        "Slack notifications: {}",
        if fields.flag(FieldId::NotifySlack) { "on" } else { "off" }
    )?;
    writeln!(out, "Prometheus: {}", or_dash(fields.value(FieldId::PromUrl)))?;
    writeln!(out, "AI: {}", state.ai_status())?;

    let dirty: Vec<String> = FieldId::SLACK
        .iter()
        .chain(FieldId::PROMETHEUS.iter())
        .filter(|f| fields.is_dirty(**f))
        .map(|f| format!("{:?}", f))
        .collect();
    if !dirty.is_empty() {
        writeln!(out, "Unsaved: {}", dirty.join(", "))?;
    }
    Ok(())
}

fn reading_line(name: &str, reading: &MetricReading) -> String {
    let flag = if reading.exceeded && !reading.value.is_no_data() { " ALERT" } else { "" };
    format!("{} {} / {}{}", name, reading.value, reading.threshold, flag)
}

fn write_monitor(out: &mut String, state: &ConsoleState) -> std::fmt::Result {
    writeln!(out, "-- Monitor --")?;
    writeln!(out, "{}", reading_line("HTTP", &state.metrics.http))?;
    writeln!(out, "{}", reading_line("CPU", &state.metrics.cpu))?;

    match state.hotspots.badge {
        HotspotBadge::WaitingForSamples => writeln!(out, "Hotspots: waiting for samples")?,
        HotspotBadge::Clear => writeln!(out, "Hotspots: clear")?,
        HotspotBadge::Alerting(n) => writeln!(out, "Hotspots: {} alerting", n)?,
    }
    for spot in &state.hotspots.entries {
        let active = if spot.active { " [active incident]" } else { "" };
        writeln!(
            out,
            "  {} ({}){}: {} / {}",
            spot.title, spot.code, active, spot.value, spot.threshold
        )?;
        writeln!(out, "    {} {}", spot.hint, spot.detail)?;
        writeln!(out, "    metric: {}", spot.metric)?;
    }

    let samples = pagination::view(&state.samples, PREVIEW_ROWS, 1);
    if samples.has_records() {
        writeln!(out, "Recent samples ({} total):", samples.total_items)?;
        for sample in samples.items {
            let mark = if sample.alert { "!" } else { " " };
            writeln!(out, " {} {}", mark, sample.line)?;
        }
    }
    let alerts = pagination::view(&state.alerts, PREVIEW_ROWS, 1);
    if alerts.has_records() {
        writeln!(out, "Alert history ({} total):", alerts.total_items)?;
        for alert in alerts.items {
            writeln!(out, "  {}", alert)?;
        }
    }
    Ok(())
}

fn write_sections(out: &mut String, sections: &[Section]) -> std::fmt::Result {
    for section in sections {
        match &section.body {
            SectionBody::Text(text) => writeln!(out, "  {}: {}", section.heading, text)?,
            SectionBody::List(items) => {
                writeln!(out, "  {}:", section.heading)?;
                for item in items {
                    writeln!(out, "    - {}", item)?;
                }
            }
        }
    }
    Ok(())
}

fn write_list(out: &mut String, heading: &str, items: &[String]) -> std::fmt::Result {
    if !items.is_empty() {
        writeln!(out, "  {}:", heading)?;
        for item in items {
            writeln!(out, "    - {}", item)?;
        }
    }
    Ok(())
}

fn write_analysis(out: &mut String, analysis: &AnalysisPanel) -> std::fmt::Result {
    writeln!(out, "-- Analysis --")?;
    match analysis {
        AnalysisPanel::Report { title, sections } => {
            writeln!(out, "Last report: {}", title)?;
            write_sections(out, sections)
        }
        AnalysisPanel::Scenario {
            title,
            description,
            hypotheses,
            evidences,
            actions,
        } => {
            writeln!(out, "Last alert: {}", title)?;
            writeln!(out, "  {}", description)?;
            write_list(out, "Hypotheses", hypotheses)?;
            write_list(out, "Evidence", evidences)?;
            write_list(out, "Suggested actions", actions)
        }
        AnalysisPanel::Empty => writeln!(out, "No analysis yet."),
    }
}

fn write_queues(out: &mut String, state: &ConsoleState) -> std::fmt::Result {
    if let Some(report) = state.reports.presented() {
        let view = ReportView::new(report);
        writeln!(out, "-- Report awaiting acknowledgement ({}) --", report.id)?;
        writeln!(out, "{} · {} · {}", view.title, view.timestamp, view.status)?;
        write_sections(out, &view.sections)?;
        writeln!(out, "{}", view.hint)?;
        writeln!(out, "{}", controls(state.reports.is_busy(), "ack"))?;
    }

    if let Some(execution) = state.actions.presented() {
        let view = ActionView::new(execution);
        writeln!(out, "-- Remediation awaiting approval ({}) --", execution.id)?;
        writeln!(out, "{} · {} · {}", view.title, view.subtitle, view.status)?;
        for (i, step) in view.steps.iter().enumerate() {
            writeln!(out, "  {}. {}", i + 1, step)?;
        }
        writeln!(out, "{}", controls(state.actions.is_busy(), "approve | defer"))?;
    }

    if !state.action_results.is_empty() {
        writeln!(out, "-- Action results --")?;
        for row in &state.action_results {
            writeln!(out, "{} [{}] {} · {}", row.title, row.id, row.status, row.meta)?;
            for action in &row.actions {
                writeln!(out, "  - {}", action)?;
            }
            for result in &row.results {
                writeln!(out, "    {}", result)?;
            }
        }
    }
    Ok(())
}

fn controls(busy: bool, verbs: &str) -> String {
    if busy {
        "Sending decision...".to_string()
    } else {
        format!("Commands: {}", verbs)
    }
}

fn write_lists(out: &mut String, state: &ConsoleState) -> std::fmt::Result {
    let feed = state.feed_page();
    writeln!(out, "-- Config feed {} --", page_label(&feed))?;
    for entry in feed.items {
        writeln!(out, "  {}", entry)?;
    }

    let recipients = state.recipients_page();
    writeln!(out, "-- Email recipients {} --", page_label(&recipients))?;
    if !recipients.has_records() {
        writeln!(out, "  No recipients registered.")?;
    }
    for recipient in recipients.items {
        let added = recipient.created_at.as_deref().map(crate::snapshot::format_timestamp);
        let added = added.as_deref().unwrap_or("--");
        writeln!(out, "  {} [{}] {}", recipient.email, recipient.id, added)?;
    }

    writeln!(out, "-- Reference documents --")?;
    if !state.documents_loaded() {
        return writeln!(out, "  Loading...");
    }
    let documents = state.documents_page();
    if !documents.has_records() {
        return writeln!(out, "  No records");
    }
    writeln!(out, "  {}", page_label(&documents))?;
    for doc in documents.items {
        let doc_type = doc.doc_type.as_deref().map(|t| format!(" ({})", t)).unwrap_or_default();
        writeln!(
            out,
            "  {}{} · {} · {} · {}",
            doc.title, doc_type, doc.scenario_code, doc.status, doc.recovery
        )?;
        writeln!(out, "    {} · {}", doc.created_at, doc.summary)?;
    }
    Ok(())
}

/// `page 2/3 <prev next>` style position marker.
fn page_label<T>(view: &PageView<'_, T>) -> String {
    if view.total_pages == 0 {
        return "no records".to_string();
    }
    let mut label = format!("page {}/{}", view.page, view.total_pages);
    if view.has_prev() {
        label.push_str(" <prev");
    }
    if view.has_next() {
        label.push_str(" next>");
    }
    label
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "--"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ChannelSet, ChannelStore};
    use crate::fields::FocusSet;
    use crate::notify::ManualClock;
    use crate::snapshot::Snapshot;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn state() -> (ConsoleState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let channels = ChannelSet::load(ChannelStore::new(dir.path().join("channels.json")));
        (ConsoleState::new(channels), dir)
    }

    fn notifier() -> Notifier {
        Notifier::new(Arc::new(ManualClock::new()), Duration::from_secs(4))
    }

    #[test]
    fn test_empty_console() {
        let (state, _dir) = state();
        let text = render_status(&state, &notifier());
        assert!(text.contains("HTTP no data / 0.0500"));
        assert!(text.contains("Hotspots: waiting for samples"));
        assert!(text.contains("No analysis yet."));
        assert!(text.contains("-- Email recipients no records --"));
        assert!(text.contains("No recipients registered."));
        assert!(text.contains("Loading..."));
        assert!(!text.contains("awaiting"));
    }

    #[test]
    fn test_presented_items_and_pages() {
        let (mut state, _dir) = state();
        let snapshot: Snapshot = serde_json::from_value(json!({
            "slack": {"channel": "#war-room"},
            "feed": ["settings saved", "a", "settings saved", "settings saved", "settings saved",
                     "settings saved", "settings saved"],
            "pending_reports": [
                {"id": "r1", "title": "HTTP 5xx surge", "recipients_missing": ["jira"]}
            ],
            "action_executions": [
                {"id": "a1", "scenario_code": "cpu_spike_core", "actions": ["restart pod"]}
            ],
        }))
        .unwrap();
        state.reconcile(&snapshot, &FocusSet::default());
        state.apply_documents(&[], false);

        let mut notifier = notifier();
        notifier.warn("Enter a Slack bot token.");
        let text = render_status(&state, &notifier);

        assert!(text.contains("[Warn] Enter a Slack bot token."));
        assert!(text.contains("#ops-incident #eng-incident #site-reliability [#war-room]"));
        assert!(text.contains("-- Report awaiting acknowledgement (r1) --"));
        assert!(text.contains("manual follow-up required"));
        assert!(text.contains("Still to notify: jira"));
        assert!(text.contains("cpu_spike_core"));
        assert!(text.contains("  1. restart pod"));
        assert!(text.contains("Commands: approve | defer"));
        assert!(text.contains("-- Config feed page 1/2 next> --"));
        assert!(text.contains("  No records"));
    }

    #[test]
    fn test_busy_queue_hides_controls() {
        let (mut state, _dir) = state();
        let snapshot: Snapshot = serde_json::from_value(json!({
            "pending_reports": [{"id": "r1"}],
        }))
        .unwrap();
        state.reconcile(&snapshot, &FocusSet::default());
        state.reports.begin_resolve(crate::approval::ReportDecision::Acknowledge);

        let text = render_status(&state, &notifier());
        assert!(text.contains("Sending decision..."));
        assert!(!text.contains("Commands: ack"));
    }
}
