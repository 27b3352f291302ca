// Versioning-branch publisher.
//
// One explicit state machine over the target branch:
//
//   Unknown ──observe──▶ Exists ──fetch+checkout──▶ CheckedOut
//                │          │
//                │          └─remote ref has no commits─┐
//                ▼                                      ▼
//              Absent ─────orphan + empty commit──────▶ Created
//
// Publishing is only legal from CheckedOut or Created. Every push that is
// rejected as non-fast-forward is retried once with `--force` scoped to the
// branch: the versioning branch is last-writer-wins.

use std::error::Error;
use std::fmt::{Display, Formatter};

use serde::Serialize;
use tracing::{info, warn};

use super::worker::{CommandExecutor, GitWorker, GitWorkerError, PushMode};

pub const INITIAL_COMMIT_MESSAGE: &str = "Initial commit for versioning branch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchState {
    Unknown,
    Exists,
    Absent,
    CheckedOut,
    Created,
}

impl BranchState {
    pub fn is_ready(self) -> bool {
        matches!(self, Self::CheckedOut | Self::Created)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushOutcome {
    FastForward,
    /// The remote diverged and was overwritten.
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishOutcome {
    Pushed(PushOutcome),
    NothingToCommit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    InvalidTransition { from: BranchState, action: &'static str },
    Git(GitWorkerError),
}

impl Display for PublishError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::InvalidTransition { from, action } => {
                write!(f, "cannot {action} while the versioning branch is {from:?}")
            }
            PublishError::Git(_) => f.write_str("versioning branch git step failed"),
        }
    }
}

impl Error for PublishError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PublishError::Git(error) => Some(error),
            PublishError::InvalidTransition { .. } => None,
        }
    }
}

impl From<GitWorkerError> for PublishError {
    fn from(error: GitWorkerError) -> Self {
        PublishError::Git(error)
    }
}

#[derive(Debug)]
pub struct BranchPublisher<'a, E> {
    worker: &'a GitWorker<E>,
    remote: String,
    branch: String,
    commit_tag: String,
    state: BranchState,
}

impl<'a, E: CommandExecutor> BranchPublisher<'a, E> {
    pub fn new(
        worker: &'a GitWorker<E>,
        remote: impl Into<String>,
        branch: impl Into<String>,
        commit_tag: impl Into<String>,
    ) -> Self {
        Self {
            worker,
            remote: remote.into(),
            branch: branch.into(),
            commit_tag: commit_tag.into(),
            state: BranchState::Unknown,
        }
    }

    pub fn state(&self) -> BranchState {
        self.state
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Record the result of the existence probe.
    pub fn observe(&mut self, exists: bool) -> Result<BranchState, PublishError> {
        if self.state != BranchState::Unknown {
            return Err(PublishError::InvalidTransition { from: self.state, action: "observe" });
        }
        self.state = if exists { BranchState::Exists } else { BranchState::Absent };
        Ok(self.state)
    }

    /// Move the working tree onto the versioning branch.
    pub fn ensure_branch(&mut self) -> Result<BranchState, PublishError> {
        match self.state {
            BranchState::Unknown => {
                Err(PublishError::InvalidTransition { from: self.state, action: "ensure branch" })
            }
            BranchState::Exists => self.checkout_existing(),
            BranchState::Absent => self.create_orphan(),
            BranchState::CheckedOut | BranchState::Created => Ok(self.state),
        }
    }

    /// Stage everything, commit with the machine tag, and push.
    pub fn publish(&mut self, message: &str) -> Result<PublishOutcome, PublishError> {
        if !self.state.is_ready() {
            return Err(PublishError::InvalidTransition { from: self.state, action: "publish" });
        }

        self.worker.add_all()?;
        match self.worker.commit(&self.tagged(message)) {
            Ok(_) => {}
            Err(error) if error.is_nothing_to_commit() => {
                info!(branch = %self.branch, "nothing to commit on versioning branch");
                return Ok(PublishOutcome::NothingToCommit);
            }
            Err(error) => return Err(error.into()),
        }

        let pushed = self.push_with_fallback(PushMode::Normal)?;
        Ok(PublishOutcome::Pushed(pushed))
    }

    fn checkout_existing(&mut self) -> Result<BranchState, PublishError> {
        match self.worker.fetch_branch(&self.remote, &self.branch) {
            Ok(_) => {}
            Err(error) if error.is_missing_remote_ref() => {
                warn!(
                    branch = %self.branch,
                    "remote branch has no commits; recreating it as an orphan"
                );
                self.state = BranchState::Absent;
                return self.create_orphan();
            }
            Err(error) => return Err(error.into()),
        }

        self.worker.checkout_remote_branch(&self.remote, &self.branch)?;
        info!(branch = %self.branch, "checked out existing versioning branch");
        self.state = BranchState::CheckedOut;
        Ok(self.state)
    }

    fn create_orphan(&mut self) -> Result<BranchState, PublishError> {
        self.worker.checkout_orphan(&self.branch)?;
        self.worker.remove_all_tracked()?;
        self.worker.commit_allow_empty(&self.tagged(INITIAL_COMMIT_MESSAGE))?;
        self.push_with_fallback(PushMode::SetUpstream)?;
        info!(branch = %self.branch, "created orphan versioning branch");
        self.state = BranchState::Created;
        Ok(self.state)
    }

    fn push_with_fallback(&self, mode: PushMode) -> Result<PushOutcome, PublishError> {
        match self.worker.push(&self.remote, &self.branch, mode) {
            Ok(_) => Ok(PushOutcome::FastForward),
            Err(error) if error.is_push_rejected() => {
                warn!(
                    branch = %self.branch,
                    error = %error,
                    "push rejected; overwriting remote versioning branch"
                );
                self.worker.push(&self.remote, &self.branch, PushMode::Force)?;
                Ok(PushOutcome::Forced)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn tagged(&self, message: &str) -> String {
        if self.commit_tag.is_empty() {
            message.to_string()
        } else {
            format!("{message} {}", self.commit_tag)
        }
    }
}
