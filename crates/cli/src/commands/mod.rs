// CLI command definitions and dispatch.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use versioner_engine::config::VersionerConfig;
use versioner_engine::github::outputs::append_outputs;

pub mod post;
pub mod pre;
pub mod run;

#[derive(Subcommand)]
pub enum Command {
    /// Configure Git LFS before the versioning run
    Pre(pre::PreArgs),
    /// Record the next version on the versioning branch
    Run(run::RunArgs),
    /// Commit residual LFS pointer changes after the run
    Post(post::PostArgs),
}

pub fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Pre(args) => pre::run(args),
        Command::Run(args) => run::run(args),
        Command::Post(args) => post::run(args),
    }
}

/// Options shared by every step.
#[derive(Debug, Clone, Args)]
pub struct WorkspaceArgs {
    /// Checked-out repository to operate on.
    #[arg(long, env = "GITHUB_WORKSPACE", default_value = ".")]
    pub workspace: PathBuf,

    /// Config file (default: `<workspace>/.github/versioner.toml`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Force JSON output.
    #[arg(long)]
    pub json: bool,
}

impl WorkspaceArgs {
    pub fn load_config(&self) -> anyhow::Result<VersionerConfig> {
        let config = match &self.config {
            Some(path) => VersionerConfig::load_from(path),
            None => VersionerConfig::load(&self.workspace),
        };
        config.context("failed to load versioner config")
    }
}

/// A required action input was missing or empty.
#[derive(Debug)]
pub struct MissingInput(pub &'static str);

impl fmt::Display for MissingInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input `{}` is required", self.0)
    }
}

impl std::error::Error for MissingInput {}

/// Drive an async step to completion on a single-threaded runtime.
pub(crate) fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    Ok(runtime.block_on(future))
}

/// Append step outputs to `$GITHUB_OUTPUT`; a no-op outside Actions.
pub(crate) fn write_step_outputs(
    output_file: Option<&Path>,
    outputs: &[(&str, String)],
) -> anyhow::Result<()> {
    match output_file {
        Some(path) => append_outputs(path, outputs),
        None => {
            tracing::debug!("GITHUB_OUTPUT not set; skipping step outputs");
            Ok(())
        }
    }
}

pub(crate) fn output_file_from_env() -> Option<PathBuf> {
    std::env::var_os("GITHUB_OUTPUT").filter(|value| !value.is_empty()).map(PathBuf::from)
}
