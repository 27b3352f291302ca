// Ambient identity of the triggering run, read once from the Actions environment.

use std::fmt;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use versioner_common::types::ProjectDescriptor;

/// Message recorded for every event other than `push`.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Version update";
/// Ref name used when the environment does not provide one.
pub const DEFAULT_REF_NAME: &str = "main";

pub const DEFAULT_SERVER_URL: &str = "https://github.com";
const DEFAULT_API_URL: &str = "https://api.github.com";

/// API token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// `owner/repo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    pub fn parse(slug: &str) -> anyhow::Result<Self> {
        let Some((owner, name)) = slug.trim().split_once('/') else {
            bail!("repository `{slug}` is not in owner/repo form");
        };
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            bail!("repository `{slug}` is not in owner/repo form");
        }
        Ok(Self { owner: owner.to_string(), name: name.to_string() })
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// ── Event payload ───────────────────────────────────────────────────

/// The subset of the webhook payload (`GITHUB_EVENT_PATH`) we read.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EventPayload {
    pub head_commit: Option<HeadCommit>,
    pub repository: Option<RepositoryInfo>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HeadCommit {
    pub id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RepositoryInfo {
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub description: Option<String>,
    pub owner: Option<OwnerInfo>,
    pub license: Option<LicenseInfo>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OwnerInfo {
    pub login: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LicenseInfo {
    pub spdx_id: Option<String>,
    pub name: Option<String>,
}

// ── Run context ─────────────────────────────────────────────────────

/// Commit identity recorded into the version ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub hash: String,
    pub date: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// `GITHUB_SHA`; `None` outside Actions, resolved from `HEAD` by the caller.
    pub sha: Option<String>,
    pub ref_name: Option<String>,
    pub event_name: Option<String>,
    pub repository: Option<RepoSlug>,
    pub actor: Option<String>,
    pub server_url: String,
    pub api_url: String,
    pub payload: EventPayload,
}

impl RunContext {
    /// Build from the process environment (or any lookup, for tests).
    pub fn from_env<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let repository = get("GITHUB_REPOSITORY").map(|slug| RepoSlug::parse(&slug)).transpose()?;
        let payload = match get("GITHUB_EVENT_PATH") {
            Some(path) => load_payload(Path::new(&path))?,
            None => EventPayload::default(),
        };

        Ok(Self {
            sha: get("GITHUB_SHA"),
            ref_name: get("GITHUB_REF_NAME"),
            event_name: get("GITHUB_EVENT_NAME"),
            repository,
            actor: get("GITHUB_ACTOR"),
            server_url: get("GITHUB_SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            api_url: get("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            payload,
        })
    }

    pub fn ref_name(&self) -> &str {
        self.ref_name.as_deref().unwrap_or(DEFAULT_REF_NAME)
    }

    /// `<prefix>-<ref name>`.
    pub fn versioning_branch(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.ref_name())
    }

    pub fn is_push(&self) -> bool {
        self.event_name.as_deref() == Some("push")
    }

    /// Head commit message for push events, the fixed placeholder otherwise.
    pub fn commit_message(&self) -> String {
        if !self.is_push() {
            return DEFAULT_COMMIT_MESSAGE.to_string();
        }
        self.payload
            .head_commit
            .as_ref()
            .and_then(|commit| commit.message.clone())
            .unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_string())
    }

    pub fn commit_identity(&self, hash: impl Into<String>, date: DateTime<Utc>) -> CommitIdentity {
        CommitIdentity { hash: hash.into(), date, message: self.commit_message() }
    }

    /// Descriptor written once as `gsd_metadata.json`.
    pub fn project_descriptor(&self, branch: &str) -> ProjectDescriptor {
        let repo_info = self.payload.repository.clone().unwrap_or_default();
        let slug = self
            .repository
            .as_ref()
            .map(ToString::to_string)
            .or(repo_info.full_name.clone())
            .unwrap_or_default();
        let name = repo_info
            .name
            .clone()
            .or_else(|| self.repository.as_ref().map(|repo| repo.name.clone()))
            .unwrap_or_default();
        let author = repo_info
            .owner
            .as_ref()
            .and_then(|owner| owner.login.clone())
            .or_else(|| self.repository.as_ref().map(|repo| repo.owner.clone()))
            .or_else(|| self.actor.clone())
            .unwrap_or_default();
        let license = repo_info
            .license
            .as_ref()
            .and_then(|license| license.spdx_id.clone().or(license.name.clone()))
            .unwrap_or_default();
        let readme_url = if slug.is_empty() {
            String::new()
        } else {
            format!(
                "{}/{slug}/blob/{}/README.md",
                self.server_url.trim_end_matches('/'),
                self.ref_name()
            )
        };

        ProjectDescriptor {
            name,
            description: repo_info.description.unwrap_or_default(),
            readme_url,
            author,
            license,
            branch: branch.to_string(),
            repository: slug,
        }
    }
}

fn load_payload(path: &Path) -> anyhow::Result<EventPayload> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "event payload file is missing; using defaults");
        return Ok(EventPayload::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read event payload `{}`", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse event payload `{}`", path.display()))
}
