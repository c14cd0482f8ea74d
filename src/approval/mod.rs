//! Approval queues: items awaiting a single human decision, presented one
//! at a time.
//!
//! [`ApprovalQueue`] is generic over the item type. Presentation is keyed by
//! item id, so a poll that reorders, appends to, or updates the queue keeps
//! the same item on screen as long as it is still awaiting a decision.

mod items;

pub use items::*;

use std::fmt;
use std::future::Future;

use crate::transport::{Api, Backend, TransportError};

/// An item that can sit in an approval queue.
pub trait ApprovalItem: Clone + PartialEq + fmt::Debug {
    /// The decisions an operator can make about the item.
    type Decision: Copy + fmt::Debug + Send + 'static;

    /// Queue name used in logs.
    const KIND: &'static str;

    fn id(&self) -> &str;

    /// Whether the record is still waiting for a decision. Records that
    /// aren't are skipped when picking what to present.
    fn awaiting_decision(&self) -> bool {
        true
    }

    /// Send the decision to the backend.
    fn resolve<B: Backend>(
        api: &Api<B>,
        id: &str,
        decision: Self::Decision,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Toast shown once the backend accepted the decision.
    fn resolved_message(decision: Self::Decision) -> &'static str;
}

/// What is on screen for one queue.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueState<T> {
    Idle,
    Presenting(T),
}

/// How a reconcile changed the presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing visible changed.
    Unchanged,
    /// An item appeared from idle.
    Shown,
    /// The same item is presented with updated content.
    Refreshed,
    /// The presented item went away and the next one took its place.
    Switched,
    /// The queue emptied.
    Hidden,
}

/// A resolution in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket<D> {
    pub id: String,
    pub decision: D,
}

/// One approval queue's presentation state.
#[derive(Debug, Clone)]
pub struct ApprovalQueue<T: ApprovalItem> {
    state: QueueState<T>,
    resolving: Option<Ticket<T::Decision>>,
}

impl<T: ApprovalItem> Default for ApprovalQueue<T> {
    fn default() -> Self {
        Self {
            state: QueueState::Idle,
            resolving: None,
        }
    }
}

impl<T: ApprovalItem> ApprovalQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &QueueState<T> {
        &self.state
    }

    pub fn presented(&self) -> Option<&T> {
        match &self.state {
            QueueState::Presenting(item) => Some(item),
            QueueState::Idle => None,
        }
    }

    /// Controls are disabled while a decision is in flight.
    pub fn is_busy(&self) -> bool {
        self.resolving.is_some()
    }

    /// Bring the presentation in line with the latest queue contents.
    pub fn reconcile(&mut self, items: &[T]) -> Transition {
        let mut waiting = items.iter().filter(|item| item.awaiting_decision());

        let transition = match &self.state {
            QueueState::Presenting(current) => {
                let current_id = current.id().to_string();
                let updated = items
                    .iter()
                    .filter(|item| item.awaiting_decision())
                    .find(|item| item.id() == current_id);

                match updated {
                    Some(item) if item == current => Transition::Unchanged,
                    Some(item) => {
                        self.state = QueueState::Presenting(item.clone());
                        Transition::Refreshed
                    }
                    None => match waiting.next() {
                        Some(next) => {
                            self.state = QueueState::Presenting(next.clone());
                            Transition::Switched
                        }
                        None => {
                            self.state = QueueState::Idle;
                            Transition::Hidden
                        }
                    },
                }
            }
            QueueState::Idle => match waiting.next() {
                Some(first) => {
                    self.state = QueueState::Presenting(first.clone());
                    Transition::Shown
                }
                None => Transition::Unchanged,
            },
        };

        if transition != Transition::Unchanged {
            match self.presented() {
                Some(item) => tracing::info!(
                    queue = T::KIND,
                    id = item.id(),
                    ?transition,
                    "approval queue updated"
                ),
                None => tracing::info!(queue = T::KIND, ?transition, "approval queue updated"),
            }
        }
        transition
    }

    /// Start resolving the presented item. Refused while idle or while
    /// another decision is in flight.
    pub fn begin_resolve(&mut self, decision: T::Decision) -> Option<Ticket<T::Decision>> {
        if self.resolving.is_some() {
            return None;
        }
        let id = self.presented()?.id().to_string();
        let ticket = Ticket { id, decision };
        self.resolving = Some(ticket.clone());
        Some(ticket)
    }

    /// The backend accepted the decision: hide the item locally without
    /// waiting for the next poll. Returns whether anything was hidden.
    pub fn resolve_succeeded(&mut self, id: &str) -> bool {
        self.resolving = None;
        if self.presented().is_some_and(|item| item.id() == id) {
            self.state = QueueState::Idle;
            tracing::info!(queue = T::KIND, id, "resolved item hidden");
            return true;
        }
        false
    }

    /// The decision failed: keep presenting and re-enable the controls.
    pub fn resolve_failed(&mut self, id: &str) {
        tracing::warn!(queue = T::KIND, id, "resolution failed, keeping item on screen");
        self.resolving = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ActionExecution, ActionStatus, IncidentReport};

    fn report(id: &str) -> IncidentReport {
        IncidentReport {
            id: id.to_string(),
            title: format!("report {}", id),
            ..Default::default()
        }
    }

    fn action(id: &str, status: ActionStatus) -> ActionExecution {
        ActionExecution {
            id: id.to_string(),
            status,
            ..Default::default()
        }
    }

    fn presented_id<T: ApprovalItem>(queue: &ApprovalQueue<T>) -> Option<String> {
        queue.presented().map(|item| item.id().to_string())
    }

    #[test]
    fn test_presentation_is_stable_across_appends() {
        let mut queue = ApprovalQueue::new();
        assert_eq!(queue.reconcile(&[report("A"), report("B")]), Transition::Shown);
        assert_eq!(presented_id(&queue).as_deref(), Some("A"));

        assert_eq!(
            queue.reconcile(&[report("A"), report("B"), report("C")]),
            Transition::Unchanged
        );
        assert_eq!(presented_id(&queue).as_deref(), Some("A"));
    }

    #[test]
    fn test_removed_item_switches_to_head() {
        let mut queue = ApprovalQueue::new();
        queue.reconcile(&[report("A"), report("B")]);
        assert_eq!(queue.reconcile(&[report("B"), report("C")]), Transition::Switched);
        assert_eq!(presented_id(&queue).as_deref(), Some("B"));
    }

    #[test]
    fn test_reordered_queue_keeps_identity() {
        let mut queue = ApprovalQueue::new();
        queue.reconcile(&[report("A"), report("B")]);
        queue.reconcile(&[report("B"), report("A")]);
        assert_eq!(presented_id(&queue).as_deref(), Some("A"));
    }

    #[test]
    fn test_updated_record_refreshes_in_place() {
        let mut queue = ApprovalQueue::new();
        queue.reconcile(&[report("A")]);
        let mut updated = report("A");
        updated.recipients_missing = vec!["slack".to_string()];

        assert_eq!(queue.reconcile(&[updated.clone()]), Transition::Refreshed);
        assert_eq!(queue.presented(), Some(&updated));
    }

    #[test]
    fn test_empty_queue_hides() {
        let mut queue = ApprovalQueue::new();
        queue.reconcile(&[report("A")]);
        assert_eq!(queue.reconcile(&[]), Transition::Hidden);
        assert_eq!(queue.state(), &QueueState::Idle);
        assert_eq!(queue.reconcile(&[]), Transition::Unchanged);
    }

    #[test]
    fn test_actions_skip_non_pending() {
        let mut queue = ApprovalQueue::new();
        let items = [
            action("x", ActionStatus::Executed),
            action("y", ActionStatus::Pending),
        ];
        queue.reconcile(&items);
        assert_eq!(presented_id(&queue).as_deref(), Some("y"));

        // Status change takes the item out of the queue.
        let items = [
            action("x", ActionStatus::Executed),
            action("y", ActionStatus::Deferred),
        ];
        assert_eq!(queue.reconcile(&items), Transition::Hidden);
    }

    #[test]
    fn test_resolve_success_hides_optimistically() {
        let mut queue = ApprovalQueue::new();
        queue.reconcile(&[action("a1", ActionStatus::Pending)]);

        let ticket = queue.begin_resolve(ActionDecision::Approve).unwrap();
        assert!(queue.is_busy());
        assert!(queue.begin_resolve(ActionDecision::Defer).is_none());

        assert!(queue.resolve_succeeded(&ticket.id));
        assert!(!queue.is_busy());
        assert_eq!(queue.state(), &QueueState::Idle);
    }

    #[test]
    fn test_resolve_failure_keeps_item() {
        let mut queue = ApprovalQueue::new();
        queue.reconcile(&[report("A")]);
        let ticket = queue.begin_resolve(ReportDecision::Acknowledge).unwrap();

        queue.resolve_failed(&ticket.id);
        assert!(!queue.is_busy());
        assert_eq!(presented_id(&queue).as_deref(), Some("A"));
    }

    #[test]
    fn test_success_for_replaced_item_does_not_hide_new_one() {
        let mut queue = ApprovalQueue::new();
        queue.reconcile(&[report("A"), report("B")]);
        let ticket = queue.begin_resolve(ReportDecision::Acknowledge).unwrap();

        // A poll removed A while the ack was in flight.
        queue.reconcile(&[report("B")]);
        assert!(!queue.resolve_succeeded(&ticket.id));
        assert_eq!(presented_id(&queue).as_deref(), Some("B"));
    }

    #[test]
    fn test_begin_resolve_when_idle() {
        let mut queue: ApprovalQueue<IncidentReport> = ApprovalQueue::new();
        assert!(queue.begin_resolve(ReportDecision::Acknowledge).is_none());
    }
}
