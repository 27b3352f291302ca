// `versioner pre`: configure Git LFS before the versioning run. Never fails the job.

use clap::Args;
use tracing::warn;
use versioner_engine::config::{megabytes, VersionerConfig};
use versioner_engine::git::worker::GitWorker;
use versioner_engine::github::context::{RunContext, DEFAULT_SERVER_URL};
use versioner_engine::lfs::prepare::{LfsPreparer, LfsSettings, PrepareReport};
use versioner_engine::lfs::LfsStatus;

use super::{output_file_from_env, write_step_outputs, WorkspaceArgs};
use crate::output::{self, OutputFormat};

const DEFAULT_LFS_THRESHOLD_MB: u64 = 90;

#[derive(Debug, Args)]
pub struct PreArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Files larger than this many megabytes are tracked with Git LFS (default 90).
    #[arg(long, env = "INPUT_LFS-THRESHOLD-MB")]
    pub lfs_threshold_mb: Option<String>,
}

/// Blank or absent means the default; anything else must be a whole number.
fn parse_threshold_mb(raw: Option<&str>) -> Result<u64, String> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(DEFAULT_LFS_THRESHOLD_MB),
        Some(value) => value.parse().map_err(|_| value.to_string()),
    }
}

pub fn run(args: PreArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.workspace.json);

    let config = args.workspace.load_config().unwrap_or_else(|error| {
        output::print_warning(format, "CONFIG_INVALID", &format!("{error:#}; using defaults"));
        VersionerConfig::default()
    });
    let (server_url, repository) = match RunContext::from_env(|key| std::env::var(key).ok()) {
        Ok(context) => (context.server_url, context.repository),
        Err(error) => {
            let message = format!("{error:#}");
            warn!(error = %message, "could not read the run context");
            (DEFAULT_SERVER_URL.to_string(), None)
        }
    };

    let threshold_mb =
        parse_threshold_mb(args.lfs_threshold_mb.as_deref()).unwrap_or_else(|value| {
            output::print_warning(
                format,
                "INPUT_INVALID",
                &format!(
                    "lfs-threshold-mb `{value}` is not a whole number; using {DEFAULT_LFS_THRESHOLD_MB}"
                ),
            );
            DEFAULT_LFS_THRESHOLD_MB
        });

    let worker = GitWorker::new(&args.workspace.workspace);
    let settings = LfsSettings {
        patterns: config.lfs.patterns,
        excluded_names: config.lfs.excluded_names,
        threshold_bytes: megabytes(threshold_mb),
        server_url,
        repository,
        bot_name: config.git.bot_name,
        bot_email: config.git.bot_email,
    };
    let report = LfsPreparer::new(&worker, settings).prepare();

    match &report.status {
        LfsStatus::Configured => {}
        LfsStatus::Unavailable => output::print_warning(
            format,
            "LFS_UNAVAILABLE",
            "Git LFS is not available; set `lfs: true` on the checkout step",
        ),
        LfsStatus::Degraded { reason } => {
            output::print_warning(format, "LFS_DEGRADED", &format!("Git LFS setup failed: {reason}"))
        }
    }

    let outputs = [("lfs-status", report.status.to_string())];
    if let Err(error) = write_step_outputs(output_file_from_env().as_deref(), &outputs) {
        output::print_warning(format, "OUTPUT_FAILED", &format!("{error:#}"));
    }

    if let Err(error) = output::print_output(format, &report, render_human) {
        warn!(error = %error, "failed to write report");
    }
    Ok(())
}

fn render_human(report: &PrepareReport) -> String {
    let mut lines = vec![format!("Git LFS: {}", report.status)];
    if !report.patterns_added.is_empty() {
        lines.push(format!("  Patterns added: {}", report.patterns_added.join(", ")));
    }
    for file in &report.tracked_files {
        lines.push(format!("  Tracking: {file}"));
    }
    if report.committed {
        lines.push("  Committed LFS configuration".to_string());
    }
    lines.join("\n")
}
