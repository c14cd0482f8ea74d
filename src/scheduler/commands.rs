//! Operator commands and their local validation.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::channels::ChannelError;
use crate::fields::{FieldId, FieldTracker};
use crate::snapshot::{DEFAULT_CPU_THRESHOLD, DEFAULT_HTTP_THRESHOLD};
use crate::transport::{PrometheusPayload, PrometheusTestPayload, SlackPayload, TransportError};

/// Something the operator did.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RefreshNow { silent: bool },
    DismissToast,

    Focus(FieldId),
    Blur(FieldId),
    Edit(FieldId, String),
    Discard(FieldId),

    TestSlack,
    SaveSlack,
    TestPrometheus,
    SavePrometheus,
    SaveAiKey,
    SetNotifySlack(bool),

    AddEmail,
    DeleteEmail(String),

    UploadDocument(Option<PathBuf>),
    ReloadDocuments,
    VerifyRecovery,

    AddChannel,
    RemoveChannel,
    SelectChannel(String),

    FeedPage(usize),
    RecipientsPage(usize),
    DocumentsPage(usize),

    AcknowledgeReport,
    ApproveAction,
    DeferAction,
}

/// A console input line that isn't a command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

fn parse_field(name: &str) -> Result<FieldId, ParseCommandError> {
    let field = match name {
        "slack-token" => FieldId::SlackToken,
        "slack-workspace" => FieldId::SlackWorkspace,
        "slack-channel" => FieldId::SlackChannel,
        "prom-url" => FieldId::PromUrl,
        "prom-http-query" => FieldId::PromHttpQuery,
        "prom-http-threshold" => FieldId::PromHttpThreshold,
        "prom-cpu-query" => FieldId::PromCpuQuery,
        "prom-cpu-threshold" => FieldId::PromCpuThreshold,
        "ai-key" => FieldId::AiApiKey,
        "channel" => FieldId::ChannelInput,
        "email" => FieldId::EmailInput,
        other => return Err(ParseCommandError::UnknownField(other.to_string())),
    };
    Ok(field)
}

/// Line syntax: a verb followed by its arguments, e.g. `set prom-url
/// http://prom:9090` or `page feed 2`. Everything after a field name is
/// taken verbatim as the value.
impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let command = match verb {
            "refresh" => Command::RefreshNow { silent: false },
            "dismiss" => Command::DismissToast,
            "focus" => Command::Focus(parse_field(rest)?),
            "blur" => Command::Blur(parse_field(rest)?),
            "set" => {
                let (field, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                if field.is_empty() {
                    return Err(ParseCommandError::Usage("set <field> <value>"));
                }
                Command::Edit(parse_field(field)?, value.trim_start().to_string())
            }
            "discard" => Command::Discard(parse_field(rest)?),
            "test-slack" => Command::TestSlack,
            "save-slack" => Command::SaveSlack,
            "test-prometheus" => Command::TestPrometheus,
            "save-prometheus" => Command::SavePrometheus,
            "save-ai-key" => Command::SaveAiKey,
            "notify-slack" => match rest {
                "on" => Command::SetNotifySlack(true),
                "off" => Command::SetNotifySlack(false),
                _ => return Err(ParseCommandError::Usage("notify-slack on|off")),
            },
            "add-email" => Command::AddEmail,
            "delete-email" if !rest.is_empty() => Command::DeleteEmail(rest.to_string()),
            "delete-email" => return Err(ParseCommandError::Usage("delete-email <id>")),
            "upload" => Command::UploadDocument((!rest.is_empty()).then(|| PathBuf::from(rest))),
            "reload-documents" => Command::ReloadDocuments,
            "verify" => Command::VerifyRecovery,
            "add-channel" => Command::AddChannel,
            "remove-channel" => Command::RemoveChannel,
            "select-channel" => Command::SelectChannel(rest.to_string()),
            "page" => {
                const USAGE: &str = "page feed|recipients|documents <n>";
                let (view, page) = rest
                    .split_once(char::is_whitespace)
                    .ok_or(ParseCommandError::Usage(USAGE))?;
                let page = page.trim().parse().map_err(|_| ParseCommandError::Usage(USAGE))?;
                match view {
                    "feed" => Command::FeedPage(page),
                    "recipients" => Command::RecipientsPage(page),
                    "documents" => Command::DocumentsPage(page),
                    _ => return Err(ParseCommandError::Usage(USAGE)),
                }
            }
            "ack" => Command::AcknowledgeReport,
            "approve" => Command::ApproveAction,
            "defer" => Command::DeferAction,
            other => return Err(ParseCommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

/// Input rejected before any request is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Enter a Slack bot token.")]
    MissingSlackToken,
    #[error("Enter the Prometheus URL and both queries.")]
    MissingPrometheusFields,
    #[error("Enter a valid email address.")]
    InvalidEmail,
    #[error("Choose a file to upload.")]
    NoFileSelected,
    #[error("Another email request is still running.")]
    EmailBusy,
    #[error("An upload is already running.")]
    UploadBusy,
}

/// Command failures.
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ConsoleError {
    /// Bad input rather than a failed operation.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Channel(ChannelError::Store(_)) => false,
            Self::Channel(_) => true,
            Self::Transport(_) => false,
        }
    }
}

fn trimmed(fields: &FieldTracker, field: FieldId) -> String {
    fields.value(field).trim().to_string()
}

pub fn slack_payload(fields: &FieldTracker) -> Result<SlackPayload, ValidationError> {
    let token = trimmed(fields, FieldId::SlackToken);
    if token.is_empty() {
        return Err(ValidationError::MissingSlackToken);
    }
    let channel = crate::channels::normalize(fields.value(FieldId::SlackChannel))
        .map(|c| c.as_str().to_string())
        .unwrap_or_else(|| crate::channels::DEFAULT_CHANNELS[0].to_string());
    Ok(SlackPayload {
        token,
        workspace: trimmed(fields, FieldId::SlackWorkspace),
        channel,
    })
}

pub fn prometheus_test_payload(
    fields: &FieldTracker,
) -> Result<PrometheusTestPayload, ValidationError> {
    let payload = PrometheusTestPayload {
        url: trimmed(fields, FieldId::PromUrl),
        http_query: trimmed(fields, FieldId::PromHttpQuery),
        cpu_query: trimmed(fields, FieldId::PromCpuQuery),
    };
    if payload.url.is_empty() || payload.http_query.is_empty() || payload.cpu_query.is_empty() {
        return Err(ValidationError::MissingPrometheusFields);
    }
    Ok(payload)
}

/// Empty thresholds are sent as their defaults.
pub fn prometheus_payload(fields: &FieldTracker) -> Result<PrometheusPayload, ValidationError> {
    let base = prometheus_test_payload(fields)?;
    let threshold = |field, default: &str| {
        let value = trimmed(fields, field);
        if value.is_empty() {
            default.to_string()
        } else {
            value
        }
    };
    Ok(PrometheusPayload {
        url: base.url,
        http_query: base.http_query,
        http_threshold: threshold(FieldId::PromHttpThreshold, DEFAULT_HTTP_THRESHOLD),
        cpu_query: base.cpu_query,
        cpu_threshold: threshold(FieldId::PromCpuThreshold, DEFAULT_CPU_THRESHOLD),
    })
}

/// Trimmed and lowercased, or rejected.
pub fn validate_email(input: &str) -> Result<String, ValidationError> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    let email = input.trim().to_lowercase();
    let valid = EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(&email));
    if valid {
        Ok(email)
    } else {
        Err(ValidationError::InvalidEmail)
    }
}
