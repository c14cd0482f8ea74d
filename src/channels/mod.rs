//! Slack channel set: fixed defaults merged with locally persisted custom
//! channels.
//!
//! The currently selected channel lives in the [`FieldTracker`] as
//! [`FieldId::SlackChannel`], so a user's pick is protected from snapshot
//! overwrite until it is saved.

mod store;

pub use store::*;

use std::fmt;

use thiserror::Error;

use crate::fields::{EditSurface, FieldId, FieldTracker};

/// Channels every installation offers. They can't be removed.
pub const DEFAULT_CHANNELS: [&str; 3] = ["#ops-incident", "#eng-incident", "#site-reliability"];

/// A normalized channel name: no surrounding whitespace, inner whitespace
/// runs replaced by `-`, exactly one leading `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelName(String);

impl ChannelName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize user or backend text into a channel name.
pub fn normalize(text: &str) -> Option<ChannelName> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join("-");
    let bare = collapsed.trim_start_matches('#');
    if bare.is_empty() {
        return None;
    }
    Some(ChannelName(format!("#{}", bare)))
}

fn defaults() -> impl Iterator<Item = ChannelName> {
    DEFAULT_CHANNELS.iter().filter_map(|c| normalize(c))
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("enter a Slack channel name")]
    Empty,
    #[error("{0} is a default channel and can't be removed")]
    DefaultChannel(ChannelName),
    #[error("{0} is not a custom channel")]
    NotCustom(ChannelName),
    #[error("failed to persist channels: {0}")]
    Store(#[from] StoreError),
}

/// What an add did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub channel: ChannelName,
    /// `false` when the channel already existed and was only selected.
    pub added: bool,
}

/// The merged channel list and its custom half's persistence.
#[derive(Debug)]
pub struct ChannelSet {
    customs: Vec<ChannelName>,
    store: ChannelStore,
}

impl ChannelSet {
    /// Load custom channels from `store`. A broken store starts empty.
    pub fn load(store: ChannelStore) -> Self {
        let customs = match store.load() {
            Ok(customs) => customs,
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable channel store {}: {}",
                    store.path().display(),
                    e
                );
                Vec::new()
            }
        };
        tracing::debug!("Loaded {} custom channels", customs.len());
        Self { customs, store }
    }

    pub fn customs(&self) -> &[ChannelName] {
        &self.customs
    }

    pub fn is_default(&self, name: &ChannelName) -> bool {
        defaults().any(|d| &d == name)
    }

    pub fn is_custom(&self, name: &ChannelName) -> bool {
        self.customs.contains(name)
    }

    /// Defaults followed by customs, without duplicates.
    pub fn all(&self) -> Vec<ChannelName> {
        let mut ordered: Vec<ChannelName> = Vec::new();
        for name in defaults().chain(self.customs.iter().cloned()) {
            if !ordered.contains(&name) {
                ordered.push(name);
            }
        }
        ordered
    }

    /// The selectable options for the given selection. A selection that
    /// isn't part of the set (e.g. a server-side channel never added here)
    /// is shown as a trailing extra option.
    pub fn options(&self, selected: &str) -> Vec<ChannelName> {
        let mut options = self.all();
        if let Some(selected) = normalize(selected) {
            if !options.contains(&selected) {
                options.push(selected);
            }
        }
        options
    }

    /// Only custom channels can be removed.
    pub fn removable(&self, selected: &str) -> bool {
        normalize(selected).is_some_and(|name| self.is_custom(&name))
    }

    /// Add a channel and select it. Adding an existing channel only selects
    /// it.
    pub fn add(
        &mut self,
        text: &str,
        tracker: &mut FieldTracker,
    ) -> Result<AddOutcome, ChannelError> {
        let channel = normalize(text).ok_or(ChannelError::Empty)?;

        if self.is_default(&channel) || self.is_custom(&channel) {
            tracker.edit(FieldId::SlackChannel, channel.as_str());
            return Ok(AddOutcome { channel, added: false });
        }

        self.customs.push(channel.clone());
        if let Err(e) = self.store.save(&self.customs) {
            self.customs.pop();
            return Err(e.into());
        }

        tracing::info!("Added custom channel {}", channel);
        tracker.edit(FieldId::SlackChannel, channel.as_str());
        Ok(AddOutcome { channel, added: true })
    }

    /// Remove a custom channel and select the fallback: the last remaining
    /// custom channel, else the first default. Returns the fallback.
    pub fn remove(
        &mut self,
        text: &str,
        tracker: &mut FieldTracker,
    ) -> Result<ChannelName, ChannelError> {
        let channel = normalize(text).ok_or(ChannelError::Empty)?;
        if !self.is_custom(&channel) {
            if self.is_default(&channel) {
                return Err(ChannelError::DefaultChannel(channel));
            }
            return Err(ChannelError::NotCustom(channel));
        }

        let before = self.customs.clone();
        self.customs.retain(|c| c != &channel);
        if let Err(e) = self.store.save(&self.customs) {
            self.customs = before;
            return Err(e.into());
        }

        let fallback = self.fallback();
        tracing::info!("Removed custom channel {}, selecting {}", channel, fallback);
        tracker.edit(FieldId::SlackChannel, fallback.as_str());
        Ok(fallback)
    }

    fn fallback(&self) -> ChannelName {
        self.customs
            .last()
            .cloned()
            .or_else(|| defaults().next())
            .unwrap_or_else(|| ChannelName(DEFAULT_CHANNELS[0].to_string()))
    }

    /// Resolve the selection against a snapshot's server-of-record channel.
    ///
    /// A protected selection is kept. Otherwise the snapshot channel wins,
    /// then the current selection, then the first option.
    pub fn reconcile_selection(
        &self,
        snapshot_channel: &str,
        tracker: &mut FieldTracker,
        surface: &impl EditSurface,
    ) {
        if tracker.is_protected(FieldId::SlackChannel, surface) {
            return;
        }

        let desired = normalize(snapshot_channel)
            .or_else(|| normalize(tracker.value(FieldId::SlackChannel)))
            .unwrap_or_else(|| self.fallback_default());
        tracker.apply_snapshot(FieldId::SlackChannel, desired.as_str(), surface);
    }

    fn fallback_default(&self) -> ChannelName {
        self.all()
            .into_iter()
            .next()
            .unwrap_or_else(|| ChannelName(DEFAULT_CHANNELS[0].to_string()))
    }
}
