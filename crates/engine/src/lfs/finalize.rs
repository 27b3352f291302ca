// Post-run LFS finalization: stage and commit residual pointer changes.

use serde::Serialize;
use tracing::{info, warn};

use super::attributes::ATTRIBUTES_FILE;
use crate::git::worker::{CommandExecutor, GitWorker, GitWorkerError};

pub const FINALIZE_COMMIT_MESSAGE: &str = "Update Git LFS tracked files";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum FinalizeOutcome {
    Committed,
    NothingToCommit,
    /// A step failed; the job still succeeds.
    Warned(String),
}

pub struct LfsFinalizer<'a, E> {
    worker: &'a GitWorker<E>,
}

impl<'a, E: CommandExecutor> LfsFinalizer<'a, E> {
    pub fn new(worker: &'a GitWorker<E>) -> Self {
        Self { worker }
    }

    pub fn finalize(&self) -> FinalizeOutcome {
        match self.commit_residual() {
            Ok(outcome) => {
                info!(?outcome, "Git LFS cleanup completed");
                outcome
            }
            Err(error) => {
                warn!(error = %error, "error during Git LFS cleanup");
                FinalizeOutcome::Warned(error.to_string())
            }
        }
    }

    fn commit_residual(&self) -> Result<FinalizeOutcome, GitWorkerError> {
        if self.worker.repo_path().join(ATTRIBUTES_FILE).exists() {
            self.worker.add(&[ATTRIBUTES_FILE])?;
        }
        self.worker.add_all()?;
        match self.worker.commit(FINALIZE_COMMIT_MESSAGE) {
            Ok(_) => Ok(FinalizeOutcome::Committed),
            Err(error) if error.is_nothing_to_commit() => Ok(FinalizeOutcome::NothingToCommit),
            Err(error) => Err(error),
        }
    }
}
