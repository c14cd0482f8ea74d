//! Dirty-field tracking for editable settings.
//!
//! A field is *protected* while it is dirty (edited and not yet saved) or
//! while the presentation layer reports it as being edited. Snapshot values
//! are only ever written into unprotected fields.

use std::collections::{BTreeMap, HashSet};

use crate::config::SaveFailurePolicy;

/// Every editable input the console exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldId {
    SlackToken,
    SlackWorkspace,
    SlackChannel,
    PromUrl,
    PromHttpQuery,
    PromHttpThreshold,
    PromCpuQuery,
    PromCpuThreshold,
    NotifySlack,
    AiApiKey,
    ChannelInput,
    EmailInput,
}

impl FieldId {
    pub const SLACK: [FieldId; 3] = [
        FieldId::SlackToken,
        FieldId::SlackWorkspace,
        FieldId::SlackChannel,
    ];
    pub const PROMETHEUS: [FieldId; 5] = [
        FieldId::PromUrl,
        FieldId::PromHttpQuery,
        FieldId::PromHttpThreshold,
        FieldId::PromCpuQuery,
        FieldId::PromCpuThreshold,
    ];
}

/// Supplied by the presentation layer: is the user editing this field
/// right now (focused, mid-composition, ...)?
pub trait EditSurface {
    fn is_editing(&self, field: FieldId) -> bool;
}

/// Headless [`EditSurface`] fed by focus/blur events.
#[derive(Debug, Clone, Default)]
pub struct FocusSet {
    focused: HashSet<FieldId>,
}

impl FocusSet {
    pub fn focus(&mut self, field: FieldId) {
        self.focused.insert(field);
    }

    pub fn blur(&mut self, field: FieldId) {
        self.focused.remove(&field);
    }
}

impl EditSurface for FocusSet {
    fn is_editing(&self, field: FieldId) -> bool {
        self.focused.contains(&field)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EditableField {
    value: String,
    dirty: bool,
    /// Value as of the last snapshot write or successful save.
    last_good: String,
}

/// Result of offering a snapshot value to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Written,
    Unchanged,
    Protected,
}

/// Display values and dirty markers for all editable fields.
#[derive(Debug, Clone, Default)]
pub struct FieldTracker {
    fields: BTreeMap<FieldId, EditableField>,
}

impl FieldTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, field: FieldId) -> &str {
        self.fields.get(&field).map(|f| f.value.as_str()).unwrap_or("")
    }

    /// Boolean fields are stored as `"true"` / `"false"`.
    pub fn flag(&self, field: FieldId) -> bool {
        self.value(field) == "true"
    }

    pub fn is_dirty(&self, field: FieldId) -> bool {
        self.fields.get(&field).is_some_and(|f| f.dirty)
    }

    pub fn is_protected(&self, field: FieldId, surface: &impl EditSurface) -> bool {
        self.is_dirty(field) || surface.is_editing(field)
    }

    /// A user input or change event: store the value and mark it dirty.
    pub fn edit(&mut self, field: FieldId, value: impl Into<String>) {
        self.fields.entry(field).or_default().value = value.into();
        self.mark_dirty(field);
    }

    pub fn mark_dirty(&mut self, field: FieldId) {
        self.fields.entry(field).or_default().dirty = true;
    }

    /// Offer a snapshot value. Protected fields are left untouched; anything
    /// else takes the value and loses any residual dirty marker.
    pub fn apply_snapshot(
        &mut self,
        field: FieldId,
        value: &str,
        surface: &impl EditSurface,
    ) -> ApplyOutcome {
        if self.is_protected(field, surface) {
            return ApplyOutcome::Protected;
        }

        let entry = self.fields.entry(field).or_default();
        entry.dirty = false;
        entry.last_good = value.to_string();
        if entry.value == value {
            return ApplyOutcome::Unchanged;
        }
        entry.value = value.to_string();
        ApplyOutcome::Written
    }

    /// Set a value programmatically without dirtying it (e.g. clearing an
    /// input after a successful submit).
    pub fn set_pristine(&mut self, field: FieldId, value: impl Into<String>) {
        let entry = self.fields.entry(field).or_default();
        entry.value = value.into();
        entry.last_good = entry.value.clone();
        entry.dirty = false;
    }

    /// A save succeeded: the displayed value becomes the known-good value.
    pub fn clear(&mut self, field: FieldId) {
        if let Some(entry) = self.fields.get_mut(&field) {
            entry.dirty = false;
            entry.last_good = entry.value.clone();
        }
    }

    /// Drop an edit and restore the last-known-good value.
    pub fn discard(&mut self, field: FieldId) {
        if let Some(entry) = self.fields.get_mut(&field) {
            entry.value = entry.last_good.clone();
            entry.dirty = false;
        }
    }

    /// A save failed; `policy` decides whether the edit survives.
    pub fn save_failed(&mut self, field: FieldId, policy: SaveFailurePolicy) {
        match policy {
            SaveFailurePolicy::Revert => self.discard(field),
            SaveFailurePolicy::Retain => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_writes_pristine_field() {
        let mut tracker = FieldTracker::new();
        let focus = FocusSet::default();
        assert_eq!(
            tracker.apply_snapshot(FieldId::PromUrl, "http://prom:9090", &focus),
            ApplyOutcome::Written
        );
        assert_eq!(tracker.value(FieldId::PromUrl), "http://prom:9090");
        assert_eq!(
            tracker.apply_snapshot(FieldId::PromUrl, "http://prom:9090", &focus),
            ApplyOutcome::Unchanged
        );
    }

    #[test]
    fn test_dirty_field_survives_snapshot() {
        let mut tracker = FieldTracker::new();
        let focus = FocusSet::default();
        tracker.apply_snapshot(FieldId::SlackToken, "xoxb-old", &focus);
        tracker.edit(FieldId::SlackToken, "xoxb-new");

        assert_eq!(
            tracker.apply_snapshot(FieldId::SlackToken, "xoxb-server", &focus),
            ApplyOutcome::Protected
        );
        assert_eq!(tracker.value(FieldId::SlackToken), "xoxb-new");
        assert!(tracker.is_dirty(FieldId::SlackToken));
    }

    #[test]
    fn test_focused_field_survives_snapshot() {
        let mut tracker = FieldTracker::new();
        let mut focus = FocusSet::default();
        focus.focus(FieldId::SlackWorkspace);
        tracker.apply_snapshot(FieldId::SlackWorkspace, "acme", &focus);
        assert_eq!(tracker.value(FieldId::SlackWorkspace), "");

        focus.blur(FieldId::SlackWorkspace);
        tracker.apply_snapshot(FieldId::SlackWorkspace, "acme", &focus);
        assert_eq!(tracker.value(FieldId::SlackWorkspace), "acme");
    }

    #[test]
    fn test_clear_after_save_allows_overwrite() {
        let mut tracker = FieldTracker::new();
        let focus = FocusSet::default();
        tracker.edit(FieldId::PromCpuThreshold, "0.9");
        tracker.clear(FieldId::PromCpuThreshold);
        assert!(!tracker.is_dirty(FieldId::PromCpuThreshold));
        tracker.apply_snapshot(FieldId::PromCpuThreshold, "0.95", &focus);
        assert_eq!(tracker.value(FieldId::PromCpuThreshold), "0.95");
    }

    #[test]
    fn test_save_failure_policies() {
        let focus = FocusSet::default();
        let mut tracker = FieldTracker::new();
        tracker.apply_snapshot(FieldId::NotifySlack, "true", &focus);
        tracker.edit(FieldId::NotifySlack, "false");

        let mut retained = tracker.clone();
        retained.save_failed(FieldId::NotifySlack, SaveFailurePolicy::Retain);
        assert_eq!(retained.value(FieldId::NotifySlack), "false");
        assert!(retained.is_dirty(FieldId::NotifySlack));

        tracker.save_failed(FieldId::NotifySlack, SaveFailurePolicy::Revert);
        assert!(tracker.flag(FieldId::NotifySlack));
        assert!(!tracker.is_dirty(FieldId::NotifySlack));
    }
}
