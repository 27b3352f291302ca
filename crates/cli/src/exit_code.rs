// Consistent exit codes for the versioner CLI.
//
//   0  = success
//   1  = the step failed (Actions marks the job failed)
//   2  = usage/argument error

use std::process;

use crate::commands::MissingInput;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        if err.chain().any(|cause| cause.downcast_ref::<MissingInput>().is_some()) {
            return Self::Usage;
        }
        Self::Error
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use versioner_engine::config::ConfigError;
    use versioner_engine::git::worker::GitWorkerError;

    #[test]
    fn exit_code_values() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::Error.code(), 1);
        assert_eq!(ExitCode::Usage.code(), 2);
    }

    #[test]
    fn missing_input_is_usage() {
        let err = anyhow::Error::new(MissingInput("github-token")).context("run failed");
        assert_eq!(ExitCode::from_error(&err), ExitCode::Usage);
    }

    #[test]
    fn git_failure_fails_the_step() {
        let err = anyhow::Error::new(GitWorkerError::CommandFailed {
            command: "git push origin versioning-main".into(),
            code: Some(1),
            stdout: String::new(),
            stderr: "! [rejected]".into(),
        });
        assert_eq!(ExitCode::from_error(&err), ExitCode::Error);
    }

    #[test]
    fn config_error_fails_the_step() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = anyhow::Error::new(ConfigError::Io(io));
        assert_eq!(ExitCode::from_error(&err), ExitCode::Error);
    }

    #[test]
    fn generic_error_maps_to_error() {
        let err = anyhow::anyhow!("something unexpected");
        assert_eq!(ExitCode::from_error(&err), ExitCode::Error);
    }

    #[test]
    fn into_process_exit_code() {
        let code: process::ExitCode = ExitCode::Usage.into();
        assert_eq!(format!("{code:?}"), format!("{:?}", process::ExitCode::from(2u8)));
    }
}
