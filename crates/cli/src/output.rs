// Output format detection for the CLI.
//
// Inside GitHub Actions → workflow commands (`::warning::`, `::error::`).
// TTY → human-readable text. Piped/redirected → structured JSON.
// `--json` forces JSON output regardless of environment.

use serde::Serialize;
use std::io::{self, IsTerminal, Write};

use versioner_engine::config::ConfigError;
use versioner_engine::git::worker::GitWorkerError;

use crate::commands::MissingInput;

const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RESET: &str = "\x1b[0m";

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Human,
    /// Machine-readable JSON (one object per response).
    Json,
    /// Human-readable text, with diagnostics as Actions workflow commands.
    Actions,
}

impl OutputFormat {
    /// JSON if `--json` was passed, Actions under a runner, else by terminal.
    pub fn detect(json_flag: bool) -> Self {
        let in_actions = std::env::var("GITHUB_ACTIONS").is_ok_and(|value| value == "true");
        Self::detect_from(json_flag, in_actions, io::stdout().is_terminal())
    }

    /// Testable variant that takes the environment explicitly.
    pub fn detect_from(json_flag: bool, in_actions: bool, is_tty: bool) -> Self {
        if json_flag {
            Self::Json
        } else if in_actions {
            Self::Actions
        } else if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

/// Write a value to stdout in the selected format.
pub fn print_output<T, F>(format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    let mut out = io::stdout().lock();
    write_output(&mut out, format, value, human_fn)
}

/// Write a value to a provided writer (useful for testing).
pub fn write_output<W, T, F>(
    writer: &mut W,
    format: OutputFormat,
    value: &T,
    human_fn: F,
) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human | OutputFormat::Actions => {
            writeln!(writer, "{}", human_fn(value))
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, value).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

/// Write an error in the selected format.
pub fn print_error(format: OutputFormat, code: &str, message: &str) {
    print_diagnostic(format, "error", code, message, ANSI_RED);
}

/// Write a warning in the selected format.
pub fn print_warning(format: OutputFormat, code: &str, message: &str) {
    print_diagnostic(format, "warning", code, message, ANSI_YELLOW);
}

fn print_diagnostic(format: OutputFormat, label: &str, code: &str, message: &str, color: &str) {
    match format {
        // The runner only reads workflow commands from stdout.
        OutputFormat::Actions => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", render_workflow_command(label, message));
        }
        OutputFormat::Human => {
            let mut err = io::stderr().lock();
            let line = render_human_stderr_line(label, message, io::stderr().is_terminal(), color);
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let mut err = io::stderr().lock();
            let obj = serde_json::json!({
                label: {
                    "code": code,
                    "message": message,
                }
            });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

/// Print a mapped, actionable error for a command failure.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let (code, message) = actionable_error(error);
    print_error(format, code, &message);
}

fn actionable_error(error: &anyhow::Error) -> (&'static str, String) {
    let message = format!("{error:#}");

    for cause in error.chain() {
        if cause.downcast_ref::<ConfigError>().is_some() {
            return ("CONFIG_INVALID", message);
        }
        if let Some(git) = cause.downcast_ref::<GitWorkerError>() {
            if git.is_spawn_failure() {
                return ("GIT_UNAVAILABLE", format!("{message}. Is git installed on the runner?"));
            }
            if git.is_push_rejected() {
                return ("PUSH_REJECTED", message);
            }
            return ("GIT_FAILED", message);
        }
    }

    if error.chain().any(|cause| cause.downcast_ref::<MissingInput>().is_some()) {
        return (
            "AUTH_MISSING",
            format!("{message}. Pass `github-token: ${{{{ secrets.GITHUB_TOKEN }}}}` to the action"),
        );
    }

    ("RUN_FAILED", message)
}

/// `::<label>::<message>` with the runner's property escaping.
fn render_workflow_command(label: &str, message: &str) -> String {
    format!("::{label}::{}", escape_workflow_data(message))
}

fn escape_workflow_data(message: &str) -> String {
    message.replace('%', "%25").replace('\r', "%0D").replace('\n', "%0A")
}

fn render_human_stderr_line(label: &str, message: &str, is_tty: bool, color: &str) -> String {
    if is_tty {
        format!("{color}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}
