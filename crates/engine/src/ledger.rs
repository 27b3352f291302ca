// Version ledger: the monotonic counter (`version.v`) and the current record (`version.json`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;
use versioner_common::counter::{next_counter, parse_counter};
use versioner_common::types::VersionRecord;

use crate::github::context::CommitIdentity;

pub const COUNTER_FILE: &str = "version.v";
pub const CURRENT_RECORD_FILE: &str = "version.json";

#[derive(Debug, Clone)]
pub struct VersionLedger {
    root: PathBuf,
}

impl VersionLedger {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn counter_path(&self) -> PathBuf {
        self.root.join(COUNTER_FILE)
    }

    pub fn record_path(&self) -> PathBuf {
        self.root.join(CURRENT_RECORD_FILE)
    }

    /// The persisted counter, or `None` before the first run.
    pub fn current(&self) -> Result<Option<u64>> {
        let path = self.counter_path();
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        let value =
            parse_counter(&text).with_context(|| format!("invalid counter in `{}`", path.display()))?;
        Ok(Some(value))
    }

    /// Increment the counter by exactly one and persist the new current record.
    pub fn advance(&self, identity: &CommitIdentity) -> Result<VersionRecord> {
        let next = next_counter(self.current()?)?;

        let counter_path = self.counter_path();
        fs::write(&counter_path, next.to_string())
            .with_context(|| format!("failed to write `{}`", counter_path.display()))?;

        let record =
            VersionRecord::new(next, identity.hash.clone(), identity.date, identity.message.clone());
        write_json(&self.record_path(), &record)?;

        info!(version = next, commit = %identity.hash, "advanced version counter");
        Ok(record)
    }
}

/// Pretty-printed JSON with a trailing newline.
pub(crate) fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize `{}`", path.display()))?;
    fs::write(path, content + "\n").with_context(|| format!("failed to write `{}`", path.display()))
}
