//! File-backed store for custom Slack channels.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use super::{normalize, ChannelName};

/// Channel store error types.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persists the custom channel list as a JSON array of strings.
#[derive(Debug, Clone)]
pub struct ChannelStore {
    path: PathBuf,
}

impl ChannelStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored channels, normalized and deduplicated.
    ///
    /// A missing file or a non-array document loads as an empty list;
    /// unreadable files and malformed JSON are errors.
    pub fn load(&self) -> Result<Vec<ChannelName>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let Value::Array(entries) = serde_json::from_str::<Value>(&raw)? else {
            return Ok(Vec::new());
        };

        let mut channels: Vec<ChannelName> = Vec::new();
        for entry in entries {
            let text = match entry {
                Value::String(s) => s,
                Value::Null => continue,
                other => other.to_string(),
            };
            if let Some(name) = normalize(&text) {
                if !channels.contains(&name) {
                    channels.push(name);
                }
            }
        }
        Ok(channels)
    }

    /// Replace the stored list. Writes a sibling temp file and renames it
    /// over the original.
    pub fn save(&self, channels: &[ChannelName]) -> Result<(), StoreError> {
        let names: Vec<&str> = channels.iter().map(ChannelName::as_str).collect();
        let data = serde_json::to_string(&names)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
