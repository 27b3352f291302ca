// Records persisted at the root of the versioning branch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One run's metadata, written as `version.json` and appended to `versionlist.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub commit_hash: String,
    #[serde(with = "crate::timestamp")]
    pub commit_date: DateTime<Utc>,
    /// Counter value rendered as a decimal string.
    pub version: String,
    pub commit_message: String,
}

impl VersionRecord {
    pub fn new(
        counter: u64,
        commit_hash: impl Into<String>,
        commit_date: DateTime<Utc>,
        commit_message: impl Into<String>,
    ) -> Self {
        Self {
            commit_hash: commit_hash.into(),
            commit_date,
            version: counter.to_string(),
            commit_message: commit_message.into(),
        }
    }
}

/// Append-only history persisted as `versionlist.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionList {
    #[serde(default)]
    pub versions: Vec<VersionRecord>,
}

impl VersionList {
    pub fn push(&mut self, record: VersionRecord) {
        self.versions.push(record);
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// One-time project descriptor written as `gsd_metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptor {
    pub name: String,
    pub description: String,
    pub readme_url: String,
    pub author: String,
    pub license: String,
    pub branch: String,
    /// `owner/repo` slug.
    pub repository: String,
}
