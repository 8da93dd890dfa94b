//! CLI command implementations.

pub mod check;
pub mod init;
pub mod run;

use std::fmt;
use std::process::ExitCode;

/// Command failure, classified for the process exit code.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded, parsed, validated or built.
    Config(anyhow::Error),
    /// The command failed at runtime.
    Runtime(anyhow::Error),
}

impl CliError {
    /// Maps the failure class to its process exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::from(2),
            Self::Runtime(_) => ExitCode::from(1),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(error) | Self::Runtime(error) => write!(f, "{error:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_exit_with_two() {
        let error = CliError::Config(anyhow::anyhow!("bad config"));
        assert_eq!(
            format!("{:?}", error.exit_code()),
            format!("{:?}", ExitCode::from(2))
        );

        let error = CliError::Runtime(anyhow::anyhow!("boom"));
        assert_eq!(
            format!("{:?}", error.exit_code()),
            format!("{:?}", ExitCode::from(1))
        );
    }
}
