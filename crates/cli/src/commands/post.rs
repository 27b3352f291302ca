// `versioner post`: commit residual LFS changes. Never fails the job.

use clap::Args;
use tracing::warn;
use versioner_engine::git::worker::GitWorker;
use versioner_engine::lfs::finalize::{FinalizeOutcome, LfsFinalizer};

use super::WorkspaceArgs;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct PostArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

pub fn run(args: PostArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.workspace.json);
    let worker = GitWorker::new(&args.workspace.workspace);
    let outcome = LfsFinalizer::new(&worker).finalize();

    if let FinalizeOutcome::Warned(message) = &outcome {
        output::print_warning(format, "LFS_CLEANUP", &format!("error during Git LFS cleanup: {message}"));
    }
    if let Err(error) = output::print_output(format, &outcome, render_human) {
        warn!(error = %error, "failed to write report");
    }
    Ok(())
}

fn render_human(outcome: &FinalizeOutcome) -> String {
    match outcome {
        FinalizeOutcome::Committed => "Committed Git LFS tracked files".to_string(),
        FinalizeOutcome::NothingToCommit => "No Git LFS changes to commit".to_string(),
        FinalizeOutcome::Warned(message) => format!("Git LFS cleanup skipped: {message}"),
    }
}
