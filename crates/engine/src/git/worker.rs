use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitWorkerError {
    EmptyAddPaths,
    SpawnFailed { command: String, message: String },
    CommandFailed { command: String, code: Option<i32>, stdout: String, stderr: String },
}

impl Display for GitWorkerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GitWorkerError::EmptyAddPaths => write!(f, "git add requires at least one path"),
            GitWorkerError::SpawnFailed { command, message } => {
                write!(f, "failed to run `{command}`: {message}")
            }
            GitWorkerError::CommandFailed { command, code, stdout, stderr } => {
                let detail = if stderr.trim().is_empty() { stdout } else { stderr };
                write!(f, "`{command}` failed with code {:?}: {}", code, detail.trim())
            }
        }
    }
}

impl Error for GitWorkerError {}

const NOTHING_TO_COMMIT_MARKERS: &[&str] =
    &["nothing to commit", "nothing added to commit", "no changes added to commit"];

const PUSH_REJECTED_MARKERS: &[&str] =
    &["[rejected]", "non-fast-forward", "fetch first", "updates were rejected"];

const MISSING_REMOTE_REF_MARKERS: &[&str] = &["couldn't find remote ref", "no such ref"];

impl GitWorkerError {
    fn output_matches(&self, markers: &[&str]) -> bool {
        let GitWorkerError::CommandFailed { stdout, stderr, .. } = self else {
            return false;
        };
        let stdout = stdout.to_ascii_lowercase();
        let stderr = stderr.to_ascii_lowercase();
        markers.iter().any(|marker| stdout.contains(marker) || stderr.contains(marker))
    }

    /// `git commit` refused because the index matches HEAD.
    pub fn is_nothing_to_commit(&self) -> bool {
        self.output_matches(NOTHING_TO_COMMIT_MARKERS)
    }

    /// The remote rejected a push because its history diverged.
    pub fn is_push_rejected(&self) -> bool {
        self.output_matches(PUSH_REJECTED_MARKERS)
    }

    /// A fetch named a ref that has no commits on the remote.
    pub fn is_missing_remote_ref(&self) -> bool {
        self.output_matches(MISSING_REMOTE_REF_MARKERS)
    }

    /// The `git` binary (or a subcommand such as `git lfs`) could not be started.
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, GitWorkerError::SpawnFailed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandExecutor: Send + Sync {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandResult, std::io::Error>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandExecutor;

impl CommandExecutor for ProcessCommandExecutor {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandResult, std::io::Error> {
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()?;
        Ok(CommandResult {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// How a push treats the remote branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMode {
    /// Fast-forward only.
    Normal,
    /// Fast-forward only, and record the remote as upstream (`-u`).
    SetUpstream,
    /// Overwrite the remote branch (`--force`), scoped to the named branch.
    Force,
}

/// Scope for `git lfs install`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfsInstallScope {
    Local,
    Global,
}

#[derive(Debug, Clone)]
pub struct GitWorker<E = ProcessCommandExecutor> {
    repo_path: PathBuf,
    executor: E,
}

impl GitWorker<ProcessCommandExecutor> {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self { repo_path: repo_path.into(), executor: ProcessCommandExecutor }
    }
}

impl<E: CommandExecutor> GitWorker<E> {
    pub fn with_executor(repo_path: impl Into<PathBuf>, executor: E) -> Self {
        Self { repo_path: repo_path.into(), executor }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Full hash of the commit checked out in the working tree.
    pub fn rev_parse_head(&self) -> Result<String, GitWorkerError> {
        let output = self.run(vec!["rev-parse".to_string(), "HEAD".to_string()])?;
        Ok(output.stdout.trim().to_string())
    }

    /// Remove untracked and ignored files, including nested repositories.
    pub fn clean_untracked(&self) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec!["clean".to_string(), "-ffdx".to_string()])
    }

    pub fn add<S: AsRef<str>>(&self, paths: &[S]) -> Result<GitCommandOutput, GitWorkerError> {
        if paths.is_empty() {
            return Err(GitWorkerError::EmptyAddPaths);
        }

        let mut args = vec!["add".to_string(), "--".to_string()];
        args.extend(paths.iter().map(|path| path.as_ref().to_string()));
        self.run(args)
    }

    /// Stage every change in the working tree, including deletions.
    pub fn add_all(&self) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec!["add".to_string(), "-A".to_string()])
    }

    pub fn commit(&self, message: &str) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec!["commit".to_string(), "-m".to_string(), message.to_string()])
    }

    pub fn commit_allow_empty(&self, message: &str) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec![
            "commit".to_string(),
            "--allow-empty".to_string(),
            "-m".to_string(),
            message.to_string(),
        ])
    }

    pub fn push(
        &self,
        remote: &str,
        branch: &str,
        mode: PushMode,
    ) -> Result<GitCommandOutput, GitWorkerError> {
        let mut args = vec!["push".to_string()];
        match mode {
            PushMode::Normal => {}
            PushMode::SetUpstream => args.push("-u".to_string()),
            PushMode::Force => args.push("--force".to_string()),
        }
        args.push(remote.to_string());
        args.push(branch.to_string());
        self.run(args)
    }

    /// Fetch a single branch into its remote-tracking ref.
    pub fn fetch_branch(&self, remote: &str, branch: &str) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec![
            "fetch".to_string(),
            remote.to_string(),
            format!("+refs/heads/{branch}:refs/remotes/{remote}/{branch}"),
        ])
    }

    /// Create or reset the local branch to the fetched remote-tracking ref and switch to it.
    pub fn checkout_remote_branch(
        &self,
        remote: &str,
        branch: &str,
    ) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec![
            "checkout".to_string(),
            "-B".to_string(),
            branch.to_string(),
            format!("refs/remotes/{remote}/{branch}"),
        ])
    }

    pub fn checkout_orphan(&self, branch: &str) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec!["checkout".to_string(), "--orphan".to_string(), branch.to_string()])
    }

    /// Remove every tracked path from the index and working tree.
    pub fn remove_all_tracked(&self) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec![
            "rm".to_string(),
            "-r".to_string(),
            "-f".to_string(),
            "-q".to_string(),
            "--ignore-unmatch".to_string(),
            ".".to_string(),
        ])
    }

    /// `refs/heads/<branch>` lines advertised by the remote.
    pub fn ls_remote_heads(&self, remote: &str, branch: &str) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec![
            "ls-remote".to_string(),
            "--heads".to_string(),
            remote.to_string(),
            format!("refs/heads/{branch}"),
        ])
    }

    pub fn config_set(&self, key: &str, value: &str) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec!["config".to_string(), key.to_string(), value.to_string()])
    }

    pub fn config_add_global(&self, key: &str, value: &str) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec![
            "config".to_string(),
            "--global".to_string(),
            "--add".to_string(),
            key.to_string(),
            value.to_string(),
        ])
    }

    pub fn lfs_version(&self) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec!["lfs".to_string(), "version".to_string()])
    }

    pub fn lfs_install(&self, scope: LfsInstallScope) -> Result<GitCommandOutput, GitWorkerError> {
        let mut args = vec!["lfs".to_string(), "install".to_string()];
        if scope == LfsInstallScope::Local {
            args.push("--local".to_string());
        }
        self.run(args)
    }

    pub fn lfs_track(&self, pattern: &str) -> Result<GitCommandOutput, GitWorkerError> {
        self.run(vec!["lfs".to_string(), "track".to_string(), pattern.to_string()])
    }

    fn run(&self, args: Vec<String>) -> Result<GitCommandOutput, GitWorkerError> {
        let command = format!("git {}", args.join(" "));
        tracing::debug!(%command, cwd = %self.repo_path.display(), "running git");
        let result = self.executor.execute("git", &args, &self.repo_path).map_err(|error| {
            GitWorkerError::SpawnFailed { command: command.clone(), message: error.to_string() }
        })?;

        if result.success {
            return Ok(GitCommandOutput { stdout: result.stdout, stderr: result.stderr });
        }

        Err(GitWorkerError::CommandFailed {
            command,
            code: result.code,
            stdout: result.stdout,
            stderr: result.stderr,
        })
    }
}
