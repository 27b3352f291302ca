// Branch existence probes.
//
// The publisher needs one bit before touching the working tree: does the
// versioning branch already exist on the remote? Production asks the GitHub
// REST API; `RemoteRefProbe` asks the remote directly and is what local runs
// and the integration tests use.

use std::future::Future;

use super::worker::{CommandExecutor, GitWorker, GitWorkerError};

/// Errors from a branch probe. Callers treat any of these as "absent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Could not build the request URL.
    InvalidUrl(String),
    /// Transport-level failure (DNS, TLS, timeout).
    Http(String),
    /// The API answered with something other than 200 or 404.
    UnexpectedStatus(u16),
    Git(GitWorkerError),
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUrl(message) => write!(f, "branch probe: invalid url: {message}"),
            Self::Http(message) => write!(f, "branch probe: request failed: {message}"),
            Self::UnexpectedStatus(status) => {
                write!(f, "branch probe: unexpected status {status}")
            }
            Self::Git(error) => write!(f, "branch probe: {error}"),
        }
    }
}

impl std::error::Error for ProbeError {}

/// Abstraction over "does this remote branch exist". Trait-based for testability.
pub trait BranchProbe: Send + Sync {
    fn branch_exists(
        &self,
        branch: &str,
    ) -> impl Future<Output = Result<bool, ProbeError>> + Send;
}

/// Probe backed by `git ls-remote --heads`.
#[derive(Debug)]
pub struct RemoteRefProbe<'a, E> {
    worker: &'a GitWorker<E>,
    remote: String,
}

impl<'a, E: CommandExecutor> RemoteRefProbe<'a, E> {
    pub fn new(worker: &'a GitWorker<E>, remote: impl Into<String>) -> Self {
        Self { worker, remote: remote.into() }
    }
}

impl<E: CommandExecutor> BranchProbe for RemoteRefProbe<'_, E> {
    async fn branch_exists(&self, branch: &str) -> Result<bool, ProbeError> {
        let output =
            self.worker.ls_remote_heads(&self.remote, branch).map_err(ProbeError::Git)?;
        let wanted = format!("refs/heads/{branch}");
        Ok(output.stdout.lines().any(|line| line.split_whitespace().nth(1) == Some(wanted.as_str())))
    }
}
