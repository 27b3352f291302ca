// Pre-run LFS setup. Never fails the job: problems become warnings and a degraded status.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use super::attributes::{ensure_patterns, ATTRIBUTES_FILE};
use super::LfsStatus;
use crate::git::worker::{CommandExecutor, GitWorker, LfsInstallScope};
use crate::github::context::RepoSlug;
use crate::snapshot::archive::archive_name;
use crate::snapshot::copy::{walk_files, ExclusionSet};

pub const PREPARE_COMMIT_MESSAGE: &str = "Update Git LFS configuration";

#[derive(Debug, Clone)]
pub struct LfsSettings {
    pub patterns: Vec<String>,
    /// Path segments skipped by the large-file scan.
    pub excluded_names: Vec<String>,
    pub threshold_bytes: u64,
    pub server_url: String,
    pub repository: Option<RepoSlug>,
    pub bot_name: String,
    pub bot_email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrepareReport {
    pub status: LfsStatus,
    pub patterns_added: Vec<String>,
    pub tracked_files: Vec<String>,
    pub committed: bool,
}

pub struct LfsPreparer<'a, E> {
    worker: &'a GitWorker<E>,
    settings: LfsSettings,
}

impl<'a, E: CommandExecutor> LfsPreparer<'a, E> {
    pub fn new(worker: &'a GitWorker<E>, settings: LfsSettings) -> Self {
        Self { worker, settings }
    }

    fn workspace(&self) -> &Path {
        self.worker.repo_path()
    }

    pub fn prepare(&self) -> PrepareReport {
        let mut report = PrepareReport {
            status: LfsStatus::Configured,
            patterns_added: Vec::new(),
            tracked_files: Vec::new(),
            committed: false,
        };

        if let Err(error) = self.worker.lfs_version() {
            warn!(error = %error, "Git LFS is not available; enable lfs in the checkout step");
            report.status = LfsStatus::Unavailable;
            return report;
        }

        if let Err(error) = self.configure(&mut report) {
            let reason = format!("{error:#}");
            warn!(reason = %reason, "Git LFS setup failed");
            report.status = LfsStatus::Degraded { reason };
            return report;
        }

        info!(
            patterns_added = report.patterns_added.len(),
            tracked_files = report.tracked_files.len(),
            committed = report.committed,
            "Git LFS configured"
        );
        report
    }

    fn configure(&self, report: &mut PrepareReport) -> anyhow::Result<()> {
        let workspace = self.workspace().to_string_lossy().into_owned();
        self.worker
            .config_add_global("safe.directory", &workspace)
            .context("failed to mark workspace as a safe directory")?;

        if let Err(error) = self.worker.lfs_install(LfsInstallScope::Local) {
            warn!(error = %error, "local Git LFS install failed; trying a global install");
            self.worker.lfs_install(LfsInstallScope::Global).context("git lfs install failed")?;
        }

        self.worker.config_set("lfs.basictransfersonly", "true")?;
        if let Some(key) = self.locksverify_key() {
            self.worker.config_set(&key, "false")?;
        }

        report.patterns_added = ensure_patterns(self.workspace(), &self.settings.patterns)?;

        for file in self.large_files()? {
            match self.worker.lfs_track(&file) {
                Ok(_) => {
                    info!(file = %file, "tracking large file with Git LFS");
                    report.tracked_files.push(file);
                }
                Err(error) => {
                    warn!(file = %file, error = %error, "could not track file with Git LFS")
                }
            }
        }

        self.worker.config_set("user.name", &self.settings.bot_name)?;
        self.worker.config_set("user.email", &self.settings.bot_email)?;
        self.worker.add(&[ATTRIBUTES_FILE])?;
        match self.worker.commit(PREPARE_COMMIT_MESSAGE) {
            Ok(_) => report.committed = true,
            Err(error) if error.is_nothing_to_commit() => {}
            Err(error) => return Err(error.into()),
        }
        Ok(())
    }

    /// `lfs.<server>/<owner>/<repo>.git/info/lfs.locksverify`.
    fn locksverify_key(&self) -> Option<String> {
        let repository = self.settings.repository.as_ref()?;
        Some(format!(
            "lfs.{}/{repository}.git/info/lfs.locksverify",
            self.settings.server_url.trim_end_matches('/')
        ))
    }

    /// Workspace-relative paths of files strictly larger than the threshold.
    fn large_files(&self) -> anyhow::Result<Vec<String>> {
        let exclusions = ExclusionSet::exact(self.settings.excluded_names.iter().cloned());
        let mut found = Vec::new();
        for item in walk_files(self.workspace(), &exclusions) {
            let (path, relative) = item?;
            let size = fs::metadata(&path)
                .with_context(|| format!("failed to stat `{}`", path.display()))?
                .len();
            if size > self.settings.threshold_bytes {
                found.push(archive_name(&relative));
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::{failure, failure_stdout, success, MockExecutor};
    use tempfile::TempDir;

    fn settings() -> LfsSettings {
        LfsSettings {
            patterns: vec!["*.zip".into(), "*.iso".into()],
            excluded_names: vec![".git".into(), "node_modules".into()],
            threshold_bytes: 1024,
            server_url: "https://github.com".into(),
            repository: Some(RepoSlug::parse("acme/widget").unwrap()),
            bot_name: "github-actions[bot]".into(),
            bot_email: "github-actions[bot]@users.noreply.github.com".into(),
        }
    }

    #[test]
    fn missing_lfs_is_reported_without_further_commands() {
        let dir = TempDir::new().unwrap();
        let mock = MockExecutor::new(vec![failure(1, "git: 'lfs' is not a git command.")]);
        let worker = GitWorker::with_executor(dir.path(), mock.clone());

        let report = LfsPreparer::new(&worker, settings()).prepare();

        assert_eq!(report.status, LfsStatus::Unavailable);
        assert_eq!(mock.command_lines(), vec!["lfs version"]);
        assert!(!dir.path().join(ATTRIBUTES_FILE).exists());
    }

    #[test]
    fn full_setup_tracks_large_files_and_commits_attributes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("small.txt"), "tiny").unwrap();
        fs::create_dir_all(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("assets/model.bin"), vec![0u8; 2048]).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/big.js"), vec![b'x'; 4096]).unwrap();

        let mock = MockExecutor::new((0..10).map(|_| success("")).collect());
        let worker = GitWorker::with_executor(dir.path(), mock.clone());

        let report = LfsPreparer::new(&worker, settings()).prepare();

        assert_eq!(report.status, LfsStatus::Configured);
        assert_eq!(report.patterns_added, vec!["*.zip", "*.iso"]);
        assert_eq!(report.tracked_files, vec!["assets/model.bin"]);
        assert!(report.committed);

        let workspace = dir.path().to_string_lossy();
        assert_eq!(
            mock.command_lines(),
            vec![
                "lfs version".to_string(),
                format!("config --global --add safe.directory {workspace}"),
                "lfs install --local".to_string(),
                "config lfs.basictransfersonly true".to_string(),
                "config lfs.https://github.com/acme/widget.git/info/lfs.locksverify false"
                    .to_string(),
                "lfs track assets/model.bin".to_string(),
                "config user.name github-actions[bot]".to_string(),
                "config user.email github-actions[bot]@users.noreply.github.com".to_string(),
                "add -- .gitattributes".to_string(),
                "commit -m Update Git LFS configuration".to_string(),
            ]
        );
        let attributes = fs::read_to_string(dir.path().join(ATTRIBUTES_FILE)).unwrap();
        assert!(attributes.contains("*.iso filter=lfs diff=lfs merge=lfs -text"));
    }

    #[test]
    fn local_install_failure_falls_back_to_global() {
        let dir = TempDir::new().unwrap();
        let mut responses = vec![success(""), success(""), failure(2, "not a repo"), success("")];
        responses.extend((0..6).map(|_| success("")));
        let mock = MockExecutor::new(responses);
        let worker = GitWorker::with_executor(dir.path(), mock.clone());

        let report = LfsPreparer::new(&worker, settings()).prepare();

        assert_eq!(report.status, LfsStatus::Configured);
        let lines = mock.command_lines();
        assert_eq!(lines[2], "lfs install --local");
        assert_eq!(lines[3], "lfs install");
    }

    #[test]
    fn track_failure_is_only_a_warning() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("huge.iso"), vec![0u8; 4096]).unwrap();
        let mut responses: Vec<_> = (0..5).map(|_| success("")).collect();
        responses.push(failure(1, "track failed"));
        responses.extend((0..4).map(|_| success("")));
        let mock = MockExecutor::new(responses);
        let worker = GitWorker::with_executor(dir.path(), mock.clone());

        let report = LfsPreparer::new(&worker, settings()).prepare();

        assert_eq!(report.status, LfsStatus::Configured);
        assert!(report.tracked_files.is_empty());
        assert!(report.committed);
    }

    #[test]
    fn nothing_to_commit_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let mut responses: Vec<_> = (0..8).map(|_| success("")).collect();
        responses.push(failure_stdout(1, "nothing to commit, working tree clean"));
        let mock = MockExecutor::new(responses);
        let worker = GitWorker::with_executor(dir.path(), mock);

        let report = LfsPreparer::new(&worker, settings()).prepare();

        assert_eq!(report.status, LfsStatus::Configured);
        assert!(!report.committed);
    }

    #[test]
    fn other_failures_degrade() {
        let dir = TempDir::new().unwrap();
        let mock = MockExecutor::new(vec![success(""), failure(255, "could not lock config file")]);
        let worker = GitWorker::with_executor(dir.path(), mock);

        let report = LfsPreparer::new(&worker, settings()).prepare();

        match report.status {
            LfsStatus::Degraded { reason } => {
                assert!(reason.contains("safe directory"));
                assert!(reason.contains("could not lock config file"));
            }
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn locksverify_key_needs_a_repository() {
        let dir = TempDir::new().unwrap();
        let worker = GitWorker::with_executor(dir.path(), MockExecutor::new(Vec::new()));
        let mut settings = settings();
        settings.server_url = "https://ghe.example.com/".into();
        assert_eq!(
            LfsPreparer::new(&worker, settings.clone()).locksverify_key().as_deref(),
            Some("lfs.https://ghe.example.com/acme/widget.git/info/lfs.locksverify")
        );

        settings.repository = None;
        assert_eq!(LfsPreparer::new(&worker, settings).locksverify_key(), None);
    }
}
