//! The console session state and the snapshot merge.
//!
//! [`ConsoleState`] is owned by the poll scheduler task. Every snapshot
//! goes through [`ConsoleState::reconcile`], which is idempotent: applying
//! the same snapshot twice leaves the state as it was after the first.

mod views;

pub use views::*;

use crate::approval::{ApprovalQueue, Transition};
use crate::channels::ChannelSet;
use crate::fields::{EditSurface, FieldId, FieldTracker};
use crate::pagination::{EmptyPages, PageView, Pager};
use crate::snapshot::{
    ActionExecution, EmailRecipient, IncidentReport, ReferenceDocument, Snapshot,
    DEFAULT_CPU_THRESHOLD, DEFAULT_HTTP_THRESHOLD,
};

/// Queue transitions produced by one reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub reports: Transition,
    pub actions: Transition,
}

/// Everything the console shows, minus transient notifications.
#[derive(Debug)]
pub struct ConsoleState {
    pub fields: FieldTracker,
    pub channels: ChannelSet,
    pub reports: ApprovalQueue<IncidentReport>,
    pub actions: ApprovalQueue<ActionExecution>,

    pub metrics: MetricsPanel,
    pub hotspots: HotspotPanel,
    pub samples: Vec<SampleRow>,
    pub alerts: Vec<String>,
    pub analysis: AnalysisPanel,
    pub action_results: Vec<ActionResultRow>,
    pub ai_configured: bool,

    feed: Vec<String>,
    feed_pager: Pager,
    recipients: Vec<EmailRecipient>,
    recipients_pager: Pager,
    documents: Vec<DocumentRow>,
    documents_pager: Pager,
    documents_loaded: bool,

    /// Slack notification preference as last confirmed by the backend.
    saved_notify_slack: bool,
    reconciles: u64,
}

impl ConsoleState {
    pub fn new(channels: ChannelSet) -> Self {
        let empty = Snapshot::default();
        Self {
            fields: FieldTracker::new(),
            channels,
            reports: ApprovalQueue::new(),
            actions: ApprovalQueue::new(),
            metrics: MetricsPanel::new(&empty.monitor, &empty.prometheus),
            hotspots: HotspotPanel::new(&empty.monitor, &empty.scenarios),
            samples: Vec::new(),
            alerts: Vec::new(),
            analysis: AnalysisPanel::Empty,
            action_results: Vec::new(),
            ai_configured: false,
            feed: Vec::new(),
            feed_pager: Pager::new(FEED_PAGE_SIZE, EmptyPages::Placeholder),
            recipients: Vec::new(),
            recipients_pager: Pager::new(RECIPIENT_PAGE_SIZE, EmptyPages::NoRecords),
            documents: Vec::new(),
            documents_pager: Pager::new(DOCUMENT_PAGE_SIZE, EmptyPages::NoRecords),
            documents_loaded: false,
            saved_notify_slack: true,
            reconciles: 0,
        }
    }

    /// Merge a snapshot into the session.
    ///
    /// Editable fields the user is editing or has changed are left alone.
    /// Computed views are rebuilt. Page positions survive and are only
    /// clamped to the new collection sizes.
    pub fn reconcile(
        &mut self,
        snapshot: &Snapshot,
        surface: &impl EditSurface,
    ) -> ReconcileOutcome {
        self.reconciles += 1;
        self.apply_settings(snapshot, surface);

        self.metrics = MetricsPanel::new(&snapshot.monitor, &snapshot.prometheus);
        self.hotspots = HotspotPanel::new(&snapshot.monitor, &snapshot.scenarios);
        self.samples = sample_rows(&snapshot.monitor);
        self.alerts = snapshot.alert_history.iter().take(ALERT_HISTORY_LIMIT).cloned().collect();
        self.analysis =
            AnalysisPanel::new(snapshot.last_report.as_ref(), snapshot.last_alert.as_ref());
        self.action_results = action_results(&snapshot.action_executions);
        self.ai_configured = snapshot.ai.configured;

        self.feed = config_feed(&snapshot.feed);
        self.feed_pager.clamp(self.feed.len());

        self.apply_recipients(&snapshot.email_recipients, false);

        let outcome = ReconcileOutcome {
            reports: self.reports.reconcile(&snapshot.pending_reports),
            actions: self.actions.reconcile(&snapshot.action_executions),
        };
        tracing::debug!(
            samples = snapshot.monitor.samples.len(),
            feed = self.feed.len(),
            recipients = self.recipients.len(),
            "Reconciled snapshot"
        );
        outcome
    }

    fn apply_settings(&mut self, snapshot: &Snapshot, surface: &impl EditSurface) {
        let slack = &snapshot.slack;
        self.fields.apply_snapshot(FieldId::SlackToken, &slack.token, surface);
        self.fields.apply_snapshot(FieldId::SlackWorkspace, &slack.workspace, surface);
        self.channels.reconcile_selection(&slack.channel, &mut self.fields, surface);

        let prom = &snapshot.prometheus;
        let or_default = |value: &str, default: &'static str| -> String {
            if value.trim().is_empty() {
                default.to_string()
            } else {
                value.to_string()
            }
        };
        self.fields.apply_snapshot(FieldId::PromUrl, &prom.url, surface);
        self.fields.apply_snapshot(FieldId::PromHttpQuery, &prom.http_query, surface);
        self.fields.apply_snapshot(
            FieldId::PromHttpThreshold,
            &or_default(&prom.http_threshold, DEFAULT_HTTP_THRESHOLD),
            surface,
        );
        self.fields.apply_snapshot(FieldId::PromCpuQuery, &prom.cpu_query, surface);
        self.fields.apply_snapshot(
            FieldId::PromCpuThreshold,
            &or_default(&prom.cpu_threshold, DEFAULT_CPU_THRESHOLD),
            surface,
        );

        if let Some(preferences) = &snapshot.preferences {
            self.saved_notify_slack = preferences.slack;
            self.fields
                .apply_snapshot(FieldId::NotifySlack, bool_str(preferences.slack), surface);
        }
    }

    /// Replace the recipient list, optionally jumping back to page 1.
    pub fn apply_recipients(&mut self, recipients: &[EmailRecipient], reset_page: bool) {
        self.recipients = normalize_recipients(recipients);
        if reset_page {
            self.recipients_pager.reset();
        }
        self.recipients_pager.clamp(self.recipients.len());
    }

    /// Replace the reference document list, optionally jumping back to
    /// page 1.
    pub fn apply_documents(&mut self, documents: &[ReferenceDocument], reset_page: bool) {
        self.documents = documents.iter().map(DocumentRow::new).collect();
        self.documents_loaded = true;
        if reset_page {
            self.documents_pager.reset();
        }
        self.documents_pager.clamp(self.documents.len());
    }

    pub fn feed_page(&self) -> PageView<'_, String> {
        self.feed_pager.window(&self.feed)
    }

    pub fn recipients_page(&self) -> PageView<'_, EmailRecipient> {
        self.recipients_pager.window(&self.recipients)
    }

    pub fn documents_page(&self) -> PageView<'_, DocumentRow> {
        self.documents_pager.window(&self.documents)
    }

    pub fn recipients(&self) -> &[EmailRecipient] {
        &self.recipients
    }

    /// `false` until the first document listing arrived.
    pub fn documents_loaded(&self) -> bool {
        self.documents_loaded
    }

    pub fn go_to_feed_page(&mut self, page: usize) -> bool {
        self.feed_pager.go_to(page, self.feed.len())
    }

    pub fn go_to_recipients_page(&mut self, page: usize) -> bool {
        self.recipients_pager.go_to(page, self.recipients.len())
    }

    pub fn go_to_documents_page(&mut self, page: usize) -> bool {
        self.documents_pager.go_to(page, self.documents.len())
    }

    pub fn saved_notify_slack(&self) -> bool {
        self.saved_notify_slack
    }

    pub fn set_saved_notify_slack(&mut self, value: bool) {
        self.saved_notify_slack = value;
    }

    pub fn ai_status(&self) -> &'static str {
        if self.ai_configured {
            "An API key is configured. Entering a new one replaces it."
        } else {
            "No API key configured yet."
        }
    }

    /// Number of snapshots merged so far.
    pub fn reconcile_count(&self) -> u64 {
        self.reconciles
    }
}

pub(crate) fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::QueueState;
    use crate::channels::ChannelStore;
    use crate::display::Reading;
    use crate::fields::FocusSet;
    use serde_json::json;

    fn state() -> (ConsoleState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let channels = ChannelSet::load(ChannelStore::new(dir.path().join("channels.json")));
        (ConsoleState::new(channels), dir)
    }

    fn snapshot(value: serde_json::Value) -> Snapshot {
        serde_json::from_value(value).unwrap()
    }

    fn rich_snapshot() -> Snapshot {
        let alerts: Vec<String> = (0..30).map(|i| format!("alert {}", i)).collect();
        snapshot(json!({
            "slack": {"token": "xoxb-1", "workspace": "acme", "channel": "#eng-incident"},
            "prometheus": {
                "url": "http://prom:9090",
                "http_query": "rate(x)",
                "http_threshold": "",
                "cpu_query": "cpu",
                "cpu_threshold": "0.9",
            },
            "preferences": {"slack": false, "jira": true},
            "ai": {"configured": true},
            "monitor": {"samples": [
                {
                    "timestamp": "2024-05-01T10:00:00Z",
                    "http": 0.01,
                    "http_threshold": 0.05,
                    "cpu": 0.4,
                    "cpu_threshold": 0.9,
                },
            ]},
            "alert_history": alerts,
            "feed": ["Slack settings saved", "noise", "OpenAI API key configured"],
            "email_recipients": [{"id": "1", "email": "a@example.com"}],
            "pending_reports": [{"id": "r1", "title": "HTTP surge"}],
            "action_executions": [
                {"id": "a1", "status": "executed"},
                {"id": "a2", "status": "pending"},
            ],
        }))
    }

    /// Everything a user can see, rendered to a comparable string.
    fn rendered(state: &ConsoleState) -> String {
        format!(
            "{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{}",
            state.fields,
            state.reports.state(),
            state.actions.state(),
            state.metrics,
            state.hotspots,
            state.samples,
            state.alerts,
            state.analysis,
            state.action_results,
            state.feed_page(),
            state.recipients_page(),
            state.documents_page(),
            state.ai_configured,
        )
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let (mut state, _dir) = state();
        let focus = FocusSet::default();
        let snap = rich_snapshot();

        state.reconcile(&snap, &focus);
        let first = rendered(&state);
        let outcome = state.reconcile(&snap, &focus);
        assert_eq!(rendered(&state), first);
        assert_eq!(outcome.reports, Transition::Unchanged);
        assert_eq!(outcome.actions, Transition::Unchanged);
    }

    #[test]
    fn test_reconcile_applies_settings_and_views() {
        let (mut state, _dir) = state();
        let outcome = state.reconcile(&rich_snapshot(), &FocusSet::default());

        assert_eq!(outcome.reports, Transition::Shown);
        assert_eq!(state.fields.value(FieldId::SlackChannel), "#eng-incident");
        assert_eq!(state.fields.value(FieldId::PromHttpThreshold), DEFAULT_HTTP_THRESHOLD);
        assert_eq!(state.fields.value(FieldId::PromCpuThreshold), "0.9");
        assert!(!state.fields.flag(FieldId::NotifySlack));
        assert!(!state.saved_notify_slack());
        assert_eq!(state.alerts.len(), ALERT_HISTORY_LIMIT);
        assert_eq!(state.feed_page().total_items, 2);
        assert!(state.ai_configured);
        assert!(matches!(state.actions.state(), QueueState::Presenting(a) if a.id == "a2"));
        assert_eq!(state.action_results[0].id, "a2");
    }

    #[test]
    fn test_reconcile_keeps_dirty_and_focused_fields() {
        let (mut state, _dir) = state();
        let mut focus = FocusSet::default();
        state.reconcile(&rich_snapshot(), &focus);

        state.fields.edit(FieldId::SlackToken, "xoxb-typed");
        focus.focus(FieldId::PromUrl);
        state.fields.edit(FieldId::SlackChannel, "#site-reliability");

        let mut changed = rich_snapshot();
        changed.slack.token = "xoxb-2".to_string();
        changed.slack.channel = "#ops-incident".to_string();
        changed.prometheus.url = "http://other:9090".to_string();
        state.reconcile(&changed, &focus);

        assert_eq!(state.fields.value(FieldId::SlackToken), "xoxb-typed");
        assert!(state.fields.is_dirty(FieldId::SlackToken));
        assert_eq!(state.fields.value(FieldId::PromUrl), "http://prom:9090");
        assert_eq!(state.fields.value(FieldId::SlackChannel), "#site-reliability");
        // Unprotected fields still follow the backend.
        assert_eq!(state.fields.value(FieldId::SlackWorkspace), "acme");
    }

    #[test]
    fn test_empty_samples_show_no_data() {
        let (mut state, _dir) = state();
        state.reconcile(&Snapshot::default(), &FocusSet::default());
        assert_eq!(state.metrics.http.value, Reading::NoData);
        assert_eq!(state.metrics.cpu.value.to_string(), "no data");
        assert!(state.samples.is_empty());
    }

    #[test]
    fn test_feed_page_survives_polls() {
        let (mut state, _dir) = state();
        let focus = FocusSet::default();
        let entries: Vec<String> = (0..12).map(|i| format!("settings saved #{}", i)).collect();
        let snap = snapshot(json!({ "feed": entries }));

        state.reconcile(&snap, &focus);
        assert!(state.go_to_feed_page(3));
        state.reconcile(&snap, &focus);
        assert_eq!(state.feed_page().page, 3);

        // Shrinking the feed clamps instead of resetting.
        let shorter: Vec<String> = (0..7).map(|i| format!("settings saved #{}", i)).collect();
        state.reconcile(&snapshot(json!({ "feed": shorter })), &focus);
        assert_eq!(state.feed_page().page, 2);
    }

    #[test]
    fn test_recipient_page_is_clamped_on_poll() {
        let (mut state, _dir) = state();
        let focus = FocusSet::default();
        let many: Vec<_> = (0..11)
            .map(|i| json!({"id": i.to_string(), "email": format!("u{}@example.com", i)}))
            .collect();
        state.reconcile(&snapshot(json!({ "email_recipients": many })), &focus);
        assert!(state.go_to_recipients_page(3));

        let one = json!({ "email_recipients": [{"id": "1", "email": "a@example.com"}] });
        state.reconcile(&snapshot(one), &focus);
        assert_eq!(state.recipients_page().page, 1);

        state.reconcile(&Snapshot::default(), &focus);
        let page = state.recipients_page();
        assert_eq!((page.total_pages, page.has_records()), (0, false));
    }

    #[test]
    fn test_documents_reset_on_request() {
        let (mut state, _dir) = state();
        let docs: Vec<ReferenceDocument> = (0..8)
            .map(|i| serde_json::from_value(json!({"title": format!("doc {}", i)})).unwrap())
            .collect();
        assert!(!state.documents_loaded());

        state.apply_documents(&docs, false);
        assert!(state.go_to_documents_page(2));
        state.apply_documents(&docs, false);
        assert_eq!(state.documents_page().page, 2);
        state.apply_documents(&docs, true);
        assert_eq!(state.documents_page().page, 1);
        assert_eq!(state.documents_page().items[0].title, "doc 0");
    }
}
