// `versioner run`: record the next version on the versioning branch.

use anyhow::Context;
use chrono::Utc;
use clap::Args;
use tracing::warn;
use versioner_engine::git::probe::RemoteRefProbe;
use versioner_engine::git::worker::GitWorker;
use versioner_engine::github::api::GitHubBranchProbe;
use versioner_engine::github::context::{Credential, RunContext};
use versioner_engine::pipeline::{run_versioning, RunOutcome, RunSettings};

use super::{block_on, output_file_from_env, write_step_outputs, MissingInput, WorkspaceArgs};
use crate::output::{self, OutputFormat};

const DEFAULT_BRANCH_PREFIX: &str = "versioning";

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Token for the GitHub REST API.
    #[arg(long, env = "INPUT_GITHUB-TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Prefix of the versioning branch; the ref name is appended.
    #[arg(long, env = "INPUT_VERSIONING-BRANCH")]
    pub versioning_branch: Option<String>,
}

impl RunArgs {
    fn credential(&self) -> Result<Credential, MissingInput> {
        self.github_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(Credential::new)
            .ok_or(MissingInput("github-token"))
    }

    fn branch_prefix(&self) -> String {
        self.versioning_branch
            .as_deref()
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty())
            .unwrap_or(DEFAULT_BRANCH_PREFIX)
            .to_string()
    }
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.workspace.json);
    match execute(&args) {
        Ok(outcome) => {
            for name in &outcome.oversized {
                output::print_warning(
                    format,
                    "FILE_TOO_LARGE",
                    &format!("`{name}` exceeds the archive size ceiling and was left out of the zip"),
                );
            }
            for entry in &outcome.skipped {
                output::print_warning(
                    format,
                    "ARCHIVE_SKIPPED",
                    &format!("`{}` was left out of the zip: {}", entry.name, entry.reason),
                );
            }
            output::print_output(format, &outcome, render_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

fn execute(args: &RunArgs) -> anyhow::Result<RunOutcome> {
    let credential = args.credential()?;
    let config = args.workspace.load_config()?;
    let context = RunContext::from_env(|key| std::env::var(key).ok())
        .context("failed to read the run context")?;
    let settings = RunSettings { branch_prefix: args.branch_prefix(), config, now: Utc::now() };
    let worker = GitWorker::new(&args.workspace.workspace);

    let api_probe = match &context.repository {
        Some(repository) => {
            match GitHubBranchProbe::new(&context.api_url, repository.clone(), credential) {
                Ok(probe) => Some(probe),
                Err(error) => {
                    warn!(error = %error, "GitHub API unavailable; probing the remote directly");
                    None
                }
            }
        }
        None => None,
    };

    let outcome = block_on(async {
        match &api_probe {
            Some(probe) => run_versioning(&worker, probe, &context, &settings).await,
            None => {
                let probe = RemoteRefProbe::new(&worker, settings.config.git.remote.clone());
                run_versioning(&worker, &probe, &context, &settings).await
            }
        }
    })??;

    write_step_outputs(
        output_file_from_env().as_deref(),
        &[("version", outcome.version.clone()), ("versioning-branch", outcome.branch.clone())],
    )?;
    Ok(outcome)
}

fn render_human(outcome: &RunOutcome) -> String {
    format!(
        "Recorded version {} on {} ({})",
        outcome.version,
        outcome.branch,
        outcome.version_dir.display()
    )
}
