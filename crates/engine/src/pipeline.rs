// The versioning run: ledger, snapshots, history and publication on the versioning branch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::VersionerConfig;
use crate::descriptor::ensure_descriptor;
use crate::git::probe::BranchProbe;
use crate::git::publisher::{BranchPublisher, BranchState, PublishOutcome};
use crate::git::worker::{CommandExecutor, GitWorker};
use crate::github::context::RunContext;
use crate::history::HistoryRecorder;
use crate::ledger::VersionLedger;
use crate::lfs::attributes::ensure_patterns;
use crate::snapshot::archive::{SkippedEntry, ZipArchiver};
use crate::snapshot::copy::{ExclusionSet, StagedTree};
use crate::snapshot::SnapshotArchiver;

/// Commit message prefix for the artifacts commit.
pub const BACKUP_COMMIT_PREFIX: &str = "Backup version";

#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Prefix of the versioning branch; the ref name is appended.
    pub branch_prefix: String,
    pub config: VersionerConfig,
    /// Timestamp recorded as the commit date.
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub version: String,
    pub branch: String,
    pub branch_state: BranchState,
    pub published: PublishOutcome,
    pub descriptor_created: bool,
    pub version_dir: PathBuf,
    /// Files kept out of every archive by the size ceiling.
    pub oversized: Vec<String>,
    /// Files dropped after repeated archive failures.
    pub skipped: Vec<SkippedEntry>,
}

/// Run one versioning pass in the repository checked out at `worker.repo_path()`.
pub async fn run_versioning<E, P>(
    worker: &GitWorker<E>,
    probe: &P,
    context: &RunContext,
    settings: &RunSettings,
) -> Result<RunOutcome>
where
    E: CommandExecutor,
    P: BranchProbe,
{
    let root = worker.repo_path().to_path_buf();
    let git = &settings.config.git;
    let snapshot = &settings.config.snapshot;

    let sha = match &context.sha {
        Some(sha) => sha.clone(),
        None => worker.rev_parse_head().context("failed to resolve the commit to version")?,
    };
    let identity = context.commit_identity(sha, settings.now);
    let branch = context.versioning_branch(&settings.branch_prefix);
    info!(branch = %branch, commit = %identity.hash, "starting versioning run");

    worker.config_set("user.name", &git.bot_name)?;
    worker.config_set("user.email", &git.bot_email)?;

    let exclusions = ExclusionSet::new(snapshot.excluded_names.iter().cloned());
    let staged = StagedTree::capture(&root, &exclusions)?;
    // Untracked files would otherwise be committed on the versioning branch
    // and block the next checkout from the source branch.
    worker.clean_untracked().context("failed to clear untracked files")?;

    let exists = match probe.branch_exists(&branch).await {
        Ok(exists) => exists,
        Err(error) => {
            warn!(branch = %branch, error = %error, "branch probe failed; treating branch as absent");
            false
        }
    };

    let mut publisher = BranchPublisher::new(worker, &git.remote, &branch, &git.commit_tag);
    publisher.observe(exists)?;
    let branch_state = publisher.ensure_branch()?;
    let patterns_added = ensure_patterns(&root, &settings.config.lfs.patterns)?;
    if !patterns_added.is_empty() {
        info!(count = patterns_added.len(), "declared LFS patterns on the versioning branch");
    }

    let ledger = VersionLedger::new(&root);
    let record = ledger.advance(&identity)?;
    let descriptor_created = ensure_descriptor(&root, &context.project_descriptor(&branch))?;
    let history = HistoryRecorder::new(&root);
    history.append(&record)?;

    let archiver = ZipArchiver::default();
    let snapshots = SnapshotArchiver::new(
        staged.path(),
        &root,
        exclusions,
        snapshot.size_ceiling_bytes(),
        &archiver,
        snapshot.max_split_depth,
    );
    let counter_path = ledger.counter_path();
    let record_path = ledger.record_path();
    let history_path = history.history_path();
    let version_dir =
        snapshots.snapshot(&record.version, &[&counter_path, &record_path, &history_path])?;
    history.write_change_log(&record, &version_dir)?;

    let mut archives = snapshots.refresh_latest(&version_dir)?;
    history.write_change_log(&record, &snapshots.ext_dir())?;
    let source_archive = snapshots.archive_source(&record.version)?;
    archives.oversized.extend(source_archive.oversized);
    archives.skipped.extend(source_archive.skipped);

    let published = publisher.publish(&format!("{BACKUP_COMMIT_PREFIX} {}", record.version))?;
    info!(version = %record.version, branch = %branch, ?published, "versioning run complete");

    Ok(RunOutcome {
        version: record.version,
        branch,
        branch_state,
        published,
        descriptor_created,
        version_dir,
        oversized: archives.oversized,
        skipped: archives.skipped,
    })
}
