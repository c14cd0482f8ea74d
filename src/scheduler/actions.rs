//! Operator command handling.
//!
//! Every command is validated locally first; nothing is sent when
//! validation fails. Successful mutations trigger a silent refresh.

use crate::approval::{ActionDecision, ApprovalItem, ReportDecision, Ticket};
use crate::channels::{normalize, ChannelError};
use crate::display::format_number;
use crate::fields::FieldId;
use crate::reconcile::bool_str;
use crate::snapshot::{ActionExecution, IncidentReport};
use crate::transport::{MessageResponse, TransportError};

use super::commands::{
    prometheus_payload, prometheus_test_payload, slack_payload, validate_email, Command,
    ConsoleError, ValidationError,
};
use super::{Backend, Completion, Console, DocumentFetch};

type Wrap<D> = fn(Ticket<D>, Result<(), TransportError>) -> Completion;

fn message_or(response: &MessageResponse, fallback: &str) -> String {
    response
        .message
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(fallback)
        .to_string()
}

impl<B: Backend> Console<B> {
    pub(super) fn handle_command(&mut self, command: Command) {
        if let Err(e) = self.dispatch(command) {
            self.report_error(&e);
        }
    }

    fn report_error(&mut self, error: &ConsoleError) {
        if error.is_validation() {
            self.notifier.warn(error.to_string());
        } else {
            self.notifier.error(error.to_string());
        }
    }

    fn dispatch(&mut self, command: Command) -> Result<(), ConsoleError> {
        match command {
            Command::RefreshNow { silent } => self.request_refresh(silent),
            Command::DismissToast => self.notifier.dismiss(),

            Command::Focus(field) => self.focus.focus(field),
            Command::Blur(field) => self.focus.blur(field),
            Command::Edit(field, value) => self.state.fields.edit(field, value),
            Command::Discard(field) => self.state.fields.discard(field),

            Command::TestSlack => {
                let payload = slack_payload(&self.state.fields)?;
                let api = self.api.clone();
                self.spawn_request(async move {
                    Completion::SlackTested(api.slack_test(&payload).await)
                });
            }
            Command::SaveSlack => {
                let payload = slack_payload(&self.state.fields)?;
                let api = self.api.clone();
                self.spawn_request(async move {
                    Completion::SlackSaved(api.slack_save(&payload).await)
                });
            }
            Command::TestPrometheus => {
                let payload = prometheus_test_payload(&self.state.fields)?;
                let api = self.api.clone();
                self.spawn_request(async move {
                    Completion::PrometheusTested(api.prometheus_test(&payload).await)
                });
            }
            Command::SavePrometheus => {
                let payload = prometheus_payload(&self.state.fields)?;
                let api = self.api.clone();
                self.spawn_request(async move {
                    Completion::PrometheusSaved(api.prometheus_save(&payload).await)
                });
            }
            Command::SaveAiKey => {
                let key = self.state.fields.value(FieldId::AiApiKey).trim().to_string();
                let api = self.api.clone();
                self.spawn_request(async move {
                    Completion::AiKeySaved {
                        removed: key.is_empty(),
                        result: api.ai_save(&key).await,
                    }
                });
            }
            Command::SetNotifySlack(value) => {
                self.state.fields.edit(FieldId::NotifySlack, bool_str(value));
                if value == self.state.saved_notify_slack() {
                    self.state.fields.clear(FieldId::NotifySlack);
                    return Ok(());
                }
                let api = self.api.clone();
                self.spawn_request(async move {
                    Completion::NotifySlackSaved {
                        value,
                        result: api.update_preferences(value).await,
                    }
                });
            }

            Command::AddEmail => {
                if self.email_busy {
                    return Err(ValidationError::EmailBusy.into());
                }
                let email = validate_email(self.state.fields.value(FieldId::EmailInput))?;
                self.email_busy = true;
                let api = self.api.clone();
                self.spawn_request(async move {
                    Completion::EmailChanged {
                        added: true,
                        result: api.add_email(&email).await,
                    }
                });
            }
            Command::DeleteEmail(id) => {
                if self.email_busy {
                    return Err(ValidationError::EmailBusy.into());
                }
                self.email_busy = true;
                let api = self.api.clone();
                self.spawn_request(async move {
                    Completion::EmailChanged {
                        added: false,
                        result: api.delete_email(&id).await,
                    }
                });
            }

            Command::UploadDocument(path) => {
                let path = path.ok_or(ValidationError::NoFileSelected)?;
                if self.uploading {
                    return Err(ValidationError::UploadBusy.into());
                }
                self.uploading = true;
                let api = self.api.clone();
                self.spawn_request(async move {
                    Completion::DocumentUploaded(api.upload_document(&path).await)
                });
            }
            Command::ReloadDocuments => self.fetch_documents(DocumentFetch {
                silent: false,
                reset_page: true,
                cycle: false,
            }),
            Command::VerifyRecovery => {
                let api = self.api.clone();
                self.spawn_request(async move { Completion::Verified(api.verify_alerts().await) });
            }

            Command::AddChannel => {
                let text = self.state.fields.value(FieldId::ChannelInput).to_string();
                let outcome = self.state.channels.add(&text, &mut self.state.fields)?;
                self.state.fields.set_pristine(FieldId::ChannelInput, "");
                if outcome.added {
                    self.notifier.success(format!("Added {}.", outcome.channel));
                } else {
                    self.notifier
                        .info(format!("{} is already listed; selected it.", outcome.channel));
                }
            }
            Command::RemoveChannel => {
                let selected = self.state.fields.value(FieldId::SlackChannel).to_string();
                let fallback = self.state.channels.remove(&selected, &mut self.state.fields)?;
                self.notifier
                    .info(format!("Removed {}; {} is selected.", selected.trim(), fallback));
            }
            Command::SelectChannel(name) => {
                let channel = normalize(&name).ok_or(ChannelError::Empty)?;
                self.state.fields.edit(FieldId::SlackChannel, channel.as_str());
            }

            Command::FeedPage(page) => {
                self.state.go_to_feed_page(page);
            }
            Command::RecipientsPage(page) => {
                self.state.go_to_recipients_page(page);
            }
            Command::DocumentsPage(page) => {
                self.state.go_to_documents_page(page);
            }

            Command::AcknowledgeReport => {
                let ticket = self.state.reports.begin_resolve(ReportDecision::Acknowledge);
                self.resolve::<IncidentReport>(ticket, |ticket, result| {
                    Completion::ReportResolved { ticket, result }
                });
            }
            Command::ApproveAction => {
                let ticket = self.state.actions.begin_resolve(ActionDecision::Approve);
                self.resolve::<ActionExecution>(ticket, |ticket, result| {
                    Completion::ActionResolved { ticket, result }
                });
            }
            Command::DeferAction => {
                let ticket = self.state.actions.begin_resolve(ActionDecision::Defer);
                self.resolve::<ActionExecution>(ticket, |ticket, result| {
                    Completion::ActionResolved { ticket, result }
                });
            }
        }
        Ok(())
    }

    fn resolve<T: ApprovalItem + 'static>(
        &self,
        ticket: Option<Ticket<T::Decision>>,
        wrap: Wrap<T::Decision>,
    ) {
        let Some(ticket) = ticket else {
            tracing::debug!(queue = T::KIND, "Nothing to resolve or a decision is in flight");
            return;
        };
        let api = self.api.clone();
        self.spawn_request(async move {
            let result = T::resolve(&api, &ticket.id, ticket.decision).await;
            wrap(ticket, result)
        });
    }

    /// Apply the result of a mutation.
    pub(super) fn action_done(&mut self, completion: Completion) {
        match completion {
            Completion::SlackTested(result) => match result {
                Ok(test) => match test.team() {
                    Some(team) => self.notifier.success(format!("Slack connection OK ({}).", team)),
                    None => self.notifier.success("Slack connection OK."),
                },
                Err(e) => self.notifier.error(e.to_string()),
            },
            Completion::SlackSaved(result) => {
                self.settings_saved(&FieldId::SLACK, result, "Slack settings saved.")
            }
            Completion::PrometheusTested(result) => match result {
                Ok(test) => self.notifier.success(format!(
                    "Prometheus query OK: HTTP {} · CPU {}",
                    format_number(test.http),
                    format_number(test.cpu)
                )),
                Err(e) => self.notifier.error(e.to_string()),
            },
            Completion::PrometheusSaved(result) => {
                self.settings_saved(&FieldId::PROMETHEUS, result, "Prometheus settings saved.")
            }
            Completion::AiKeySaved { removed, result } => match result {
                Ok(response) => {
                    self.state.fields.set_pristine(FieldId::AiApiKey, "");
                    let fallback = if removed { "API key removed." } else { "API key saved." };
                    self.notifier.success(message_or(&response, fallback));
                    self.request_refresh(true);
                }
                Err(e) => {
                    self.state.fields.save_failed(FieldId::AiApiKey, self.save_failure);
                    self.notifier.error(e.to_string());
                }
            },
            Completion::NotifySlackSaved { value, result } => match result {
                Ok(()) => {
                    self.state.set_saved_notify_slack(value);
                    self.state.fields.clear(FieldId::NotifySlack);
                    self.notifier.success("Notification preferences updated.");
                }
                Err(e) => {
                    self.state.fields.save_failed(FieldId::NotifySlack, self.save_failure);
                    self.notifier.error(e.to_string());
                }
            },
            Completion::EmailChanged { added, result } => match result {
                Ok(()) => {
                    if added {
                        self.state.fields.set_pristine(FieldId::EmailInput, "");
                        self.notifier.success("Recipient added.");
                    } else {
                        self.notifier.success("Recipient removed.");
                    }
                    // Stays busy until the refreshed list lands.
                    let api = self.api.clone();
                    self.spawn_request(async move {
                        Completion::Emails {
                            reset_page: added,
                            result: api.list_emails().await,
                        }
                    });
                }
                Err(e) => {
                    self.email_busy = false;
                    self.notifier.error(e.to_string());
                }
            },
            Completion::Emails { reset_page, result } => {
                self.email_busy = false;
                match result {
                    Ok(recipients) => self.state.apply_recipients(&recipients, reset_page),
                    Err(e) => tracing::warn!("Recipient reload failed: {}", e),
                }
            }
            Completion::DocumentUploaded(result) => {
                self.uploading = false;
                match result {
                    Ok(response) => {
                        self.notifier.success(message_or(&response, "Document uploaded."));
                        self.fetch_documents(DocumentFetch {
                            silent: true,
                            reset_page: true,
                            cycle: false,
                        });
                    }
                    Err(e) => self.notifier.error(e.to_string()),
                }
            }
            Completion::Verified(result) => match result {
                Ok(()) => {
                    self.notifier.success("Recovery verification started.");
                    self.request_refresh(true);
                }
                Err(e) => self.notifier.error(e.to_string()),
            },
            Completion::ReportResolved { ticket, result } => match result {
                Ok(()) => {
                    self.state.reports.resolve_succeeded(&ticket.id);
                    self.notifier.success(IncidentReport::resolved_message(ticket.decision));
                    self.request_refresh(true);
                }
                Err(e) => {
                    self.state.reports.resolve_failed(&ticket.id);
                    self.notifier.error(e.to_string());
                }
            },
            Completion::ActionResolved { ticket, result } => match result {
                Ok(()) => {
                    self.state.actions.resolve_succeeded(&ticket.id);
                    self.notifier.success(ActionExecution::resolved_message(ticket.decision));
                    self.request_refresh(true);
                }
                Err(e) => {
                    self.state.actions.resolve_failed(&ticket.id);
                    self.notifier.error(e.to_string());
                }
            },
            Completion::Snapshot { .. } | Completion::Documents { .. } => {}
        }
    }

    fn settings_saved(
        &mut self,
        fields: &[FieldId],
        result: Result<MessageResponse, TransportError>,
        fallback: &str,
    ) {
        match result {
            Ok(response) => {
                for field in fields {
                    self.state.fields.clear(*field);
                }
                self.notifier.success(message_or(&response, fallback));
                self.request_refresh(true);
            }
            Err(e) => {
                for field in fields {
                    self.state.fields.save_failed(*field, self.save_failure);
                }
                self.notifier.error(e.to_string());
            }
        }
    }
}
