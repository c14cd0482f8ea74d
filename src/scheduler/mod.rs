//! Scheduler module: the task that owns the console state.
//!
//! Timer ticks, operator commands and request completions are handled one
//! at a time by a single loop, so no snapshot merge ever interleaves with
//! another. Requests run as spawned tasks that report back over a channel.

mod actions;
mod commands;
mod gate;

pub use commands::*;
pub use gate::*;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::approval::{ActionDecision, ReportDecision, Ticket};
use crate::config::{ConsoleConfig, SaveFailurePolicy};
use crate::fields::FocusSet;
use crate::notify::{Clock, Notifier, TokioClock};
use crate::reconcile::ConsoleState;
use crate::snapshot::{EmailRecipient, ReferenceDocument, Snapshot};
use crate::transport::{
    Api, Backend, MessageResponse, PrometheusTestResult, SlackTestResult, TransportError,
};

type Inspector = Box<dyn FnOnce(&ConsoleState, &Notifier) + Send>;

enum Message {
    Command(Command),
    Inspect(Inspector),
}

/// How a document listing was asked for.
#[derive(Debug, Clone, Copy)]
struct DocumentFetch {
    silent: bool,
    reset_page: bool,
    /// Part of a refresh cycle; the gate is released when it lands.
    cycle: bool,
}

/// Results reported back by spawned request tasks.
enum Completion {
    Snapshot {
        silent: bool,
        result: Result<Snapshot, TransportError>,
    },
    Documents {
        fetch: DocumentFetch,
        result: Result<Vec<ReferenceDocument>, TransportError>,
    },
    Emails {
        reset_page: bool,
        result: Result<Vec<EmailRecipient>, TransportError>,
    },
    SlackTested(Result<SlackTestResult, TransportError>),
    SlackSaved(Result<MessageResponse, TransportError>),
    PrometheusTested(Result<PrometheusTestResult, TransportError>),
    PrometheusSaved(Result<MessageResponse, TransportError>),
    AiKeySaved {
        removed: bool,
        result: Result<MessageResponse, TransportError>,
    },
    NotifySlackSaved {
        value: bool,
        result: Result<(), TransportError>,
    },
    EmailChanged {
        added: bool,
        result: Result<(), TransportError>,
    },
    DocumentUploaded(Result<MessageResponse, TransportError>),
    Verified(Result<(), TransportError>),
    ReportResolved {
        ticket: Ticket<ReportDecision>,
        result: Result<(), TransportError>,
    },
    ActionResolved {
        ticket: Ticket<ActionDecision>,
        result: Result<(), TransportError>,
    },
}

/// The single owner of the session: state, focus, toast slot and refresh
/// gate.
struct Console<B: Backend> {
    api: Api<B>,
    state: ConsoleState,
    focus: FocusSet,
    notifier: Notifier,
    gate: RefreshGate,
    save_failure: SaveFailurePolicy,
    email_busy: bool,
    uploading: bool,
    done_tx: mpsc::Sender<Completion>,
}

impl<B: Backend> Console<B> {
    fn spawn_request<F>(&self, request: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let completion = request.await;
            if done.send(completion).await.is_err() {
                tracing::debug!("Scheduler stopped, dropping request result");
            }
        });
    }

    fn request_refresh(&mut self, silent: bool) {
        match self.gate.request(silent) {
            Some(ticket) => self.start_cycle(ticket),
            None => tracing::debug!(
                silent,
                in_flight = self.gate.in_flight(),
                pending = self.gate.has_pending(),
                "Refresh coalesced"
            ),
        }
    }

    fn start_cycle(&self, ticket: RefreshTicket) {
        let api = self.api.clone();
        self.spawn_request(async move {
            Completion::Snapshot {
                silent: ticket.silent,
                result: api.fetch_snapshot().await,
            }
        });
    }

    fn finish_cycle(&mut self) {
        if let Some(next) = self.gate.finish() {
            tracing::debug!(silent = next.silent, "Starting coalesced refresh");
            self.start_cycle(next);
        }
    }

    fn fetch_documents(&self, fetch: DocumentFetch) {
        let api = self.api.clone();
        self.spawn_request(async move {
            Completion::Documents {
                fetch,
                result: api.list_documents().await,
            }
        });
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Snapshot { silent, result } => self.snapshot_done(silent, result),
            Completion::Documents { fetch, result } => self.documents_done(fetch, result),
            other => self.action_done(other),
        }
    }

    fn snapshot_done(&mut self, silent: bool, result: Result<Snapshot, TransportError>) {
        match result {
            Ok(snapshot) => {
                let outcome = self.state.reconcile(&snapshot, &self.focus);
                tracing::debug!(?outcome, "Refresh applied");
                self.fetch_documents(DocumentFetch {
                    silent: true,
                    reset_page: false,
                    cycle: true,
                });
            }
            Err(e) => {
                if silent {
                    tracing::warn!("Background refresh failed: {}", e);
                } else {
                    self.notifier.error(e.to_string());
                }
                self.finish_cycle();
            }
        }
    }

    fn documents_done(
        &mut self,
        fetch: DocumentFetch,
        result: Result<Vec<ReferenceDocument>, TransportError>,
    ) {
        match result {
            Ok(documents) => self.state.apply_documents(&documents, fetch.reset_page),
            Err(e) if fetch.silent => tracing::warn!("Reference document listing failed: {}", e),
            Err(e) => self.notifier.error(e.to_string()),
        }
        if fetch.cycle {
            self.finish_cycle();
        }
    }
}

/// Error returned when the scheduler task is gone.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("scheduler is not running")]
pub struct SchedulerClosed;

/// Builds the console task.
pub struct PollScheduler<B: Backend> {
    console: Console<B>,
    done_rx: mpsc::Receiver<Completion>,
    poll_interval: Duration,
}

impl<B: Backend> PollScheduler<B> {
    pub fn new(api: Api<B>, state: ConsoleState, config: &ConsoleConfig) -> Self {
        Self::with_clock(api, state, config, Arc::new(TokioClock))
    }

    pub fn with_clock(
        api: Api<B>,
        state: ConsoleState,
        config: &ConsoleConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (done_tx, done_rx) = mpsc::channel(256);
        let console = Console {
            api,
            state,
            focus: FocusSet::default(),
            notifier: Notifier::new(clock, config.toast_duration),
            gate: RefreshGate::new(),
            save_failure: config.save_failure,
            email_busy: false,
            uploading: false,
            done_tx,
        };
        Self {
            console,
            done_rx,
            poll_interval: config.poll_interval,
        }
    }

    /// Spawn the loop. The first refresh is loud and starts right away;
    /// after that the timer refreshes silently every poll interval.
    pub fn start(self) -> (SchedulerHandle, JoinHandle<()>) {
        let (messages_tx, messages_rx) = mpsc::channel(64);
        let (stop_tx, _) = broadcast::channel(1);
        let stop_rx = stop_tx.subscribe();

        let task = tokio::spawn(run_console_loop(
            self.console,
            self.done_rx,
            messages_rx,
            stop_rx,
            self.poll_interval,
        ));

        let handle = SchedulerHandle {
            messages: messages_tx,
            stop: stop_tx,
        };
        (handle, task)
    }
}

async fn run_console_loop<B: Backend>(
    mut console: Console<B>,
    mut done_rx: mpsc::Receiver<Completion>,
    mut messages: mpsc::Receiver<Message>,
    mut stop_rx: broadcast::Receiver<()>,
    poll_interval: Duration,
) {
    tracing::info!("Poll scheduler started, refreshing every {:?}", poll_interval);

    let mut interval = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    console.request_refresh(false);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                break;
            }
            _ = interval.tick() => {
                console.request_refresh(true);
            }
            Some(message) = messages.recv() => {
                match message {
                    Message::Command(command) => console.handle_command(command),
                    Message::Inspect(inspect) => inspect(&console.state, &console.notifier),
                }
            }
            Some(completion) = done_rx.recv() => {
                console.complete(completion);
            }
        }
    }

    tracing::info!("Poll scheduler stopped");
}

/// Cloneable handle to a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    messages: mpsc::Sender<Message>,
    stop: broadcast::Sender<()>,
}

impl SchedulerHandle {
    pub async fn send(&self, command: Command) -> Result<(), SchedulerClosed> {
        self.messages
            .send(Message::Command(command))
            .await
            .map_err(|_| SchedulerClosed)
    }

    /// Ask for an out-of-band refresh.
    pub async fn refresh_now(&self, silent: bool) -> Result<(), SchedulerClosed> {
        self.send(Command::RefreshNow { silent }).await
    }

    /// Run `f` against the current state on the scheduler task.
    pub async fn inspect<R, F>(&self, f: F) -> Result<R, SchedulerClosed>
    where
        R: Send + 'static,
        F: FnOnce(&ConsoleState, &Notifier) -> R + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let inspector: Inspector = Box::new(move |state, notifier| {
            let _ = tx.send(f(state, notifier));
        });
        self.messages
            .send(Message::Inspect(inspector))
            .await
            .map_err(|_| SchedulerClosed)?;
        rx.await.map_err(|_| SchedulerClosed)
    }

    /// Stop the loop. In-flight requests are not cancelled; their results
    /// are dropped.
    pub fn shutdown(&self) {
        let _ = self.stop.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ChannelSet, ChannelStore};
    use crate::notify::Variant;
    use crate::transport::Request;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Answers `/state` after a delay, counting calls.
    struct SlowBackend {
        state_calls: AtomicUsize,
        delay: Duration,
        failing: AtomicBool,
    }

    impl SlowBackend {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                state_calls: AtomicUsize::new(0),
                delay,
                failing: AtomicBool::new(false),
            })
        }

        fn calls(&self) -> usize {
            self.state_calls.load(Ordering::SeqCst)
        }
    }

    impl Backend for SlowBackend {
        async fn send(&self, request: Request) -> Result<Value, TransportError> {
            match request.path.as_str() {
                "/state" => {
                    self.state_calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(self.delay).await;
                    if self.failing.load(Ordering::SeqCst) {
                        return Err(TransportError::Network("connection refused".to_string()));
                    }
                    Ok(json!({"feed": ["settings saved"]}))
                }
                "/rag/documents" => Ok(json!({"documents": []})),
                _ => Ok(Value::Null),
            }
        }
    }

    fn start(
        backend: Arc<SlowBackend>,
        poll_interval: Duration,
    ) -> (SchedulerHandle, JoinHandle<()>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let channels = ChannelSet::load(ChannelStore::new(dir.path().join("channels.json")));
        let config = ConsoleConfig {
            poll_interval,
            ..Default::default()
        };
        let scheduler = PollScheduler::new(Api::new(backend), ConsoleState::new(channels), &config);
        let (handle, task) = scheduler.start();
        (handle, task, dir)
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_refreshes_fetch_twice() {
        let backend = SlowBackend::new(Duration::from_secs(1));
        let (handle, task, _dir) = start(backend.clone(), Duration::from_secs(600));

        for _ in 0..5 {
            handle.refresh_now(true).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(backend.calls(), 2);
        let reconciles = handle.inspect(|state, _| state.reconcile_count()).await.unwrap();
        assert_eq!(reconciles, 2);
        assert!(handle.inspect(|state, _| state.documents_loaded()).await.unwrap());

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_survives_failures() {
        let backend = SlowBackend::new(Duration::from_millis(10));
        backend.failing.store(true, Ordering::SeqCst);
        let (handle, task, _dir) = start(backend.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_millis(500)).await;
        let toast = handle
            .inspect(|_, notifier| notifier.current().map(|(t, _)| (t.message.clone(), t.variant)))
            .await
            .unwrap();
        assert_eq!(
            toast,
            Some(("network request failed: connection refused".to_string(), Variant::Error))
        );

        tokio::time::sleep(Duration::from_secs(35)).await;
        // Initial refresh plus ticks at 10s, 20s and 30s.
        assert_eq!(backend.calls(), 4);
        let reconciles = handle.inspect(|state, _| state.reconcile_count()).await.unwrap();
        assert_eq!(reconciles, 0);

        backend.failing.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.inspect(|state, _| state.reconcile_count()).await.unwrap(), 1);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_failure_shows_no_toast() {
        let backend = SlowBackend::new(Duration::from_millis(10));
        let (handle, task, _dir) = start(backend.clone(), Duration::from_secs(600));
        tokio::time::sleep(Duration::from_secs(1)).await;

        backend.failing.store(true, Ordering::SeqCst);
        handle.refresh_now(true).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(backend.calls(), 2);
        let toast = handle.inspect(|_, notifier| notifier.current().is_some()).await.unwrap();
        assert!(!toast);

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_reports_closed_scheduler() {
        let backend = SlowBackend::new(Duration::from_millis(1));
        let (handle, task, _dir) = start(backend, Duration::from_secs(600));
        handle.shutdown();
        task.await.unwrap();
        assert_eq!(handle.refresh_now(false).await, Err(SchedulerClosed));
    }
}
