//! Error types for the CLI

use courtside::{BookingError, BookingStep, FailureKind, StepFailure};
use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Credential not supplied by flag or environment
    #[error("Missing credential: set {variable} or pass --{flag}")]
    MissingCredential {
        /// Environment variable name
        variable: &'static str,
        /// Flag name
        flag: &'static str,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Library error outside the booking steps
    #[error("{0}")]
    Booking(#[from] BookingError),

    /// A booking step failed
    #[error("{0}")]
    Step(#[from] StepFailure),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Failure classification
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Booking(e) => e.kind(),
            Self::Step(f) => f.kind(),
            _ => FailureKind::Internal,
        }
    }

    /// Step that failed, for booking failures
    #[must_use]
    pub const fn step(&self) -> Option<BookingStep> {
        match self {
            Self::Step(f) => Some(f.step),
            _ => None,
        }
    }

    /// Process exit code
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("bad profile");
        assert!(err.to_string().contains("Configuration"));
        assert!(err.to_string().contains("bad profile"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_missing_credential_names_variable() {
        let err = CliError::MissingCredential {
            variable: "ESC_PASSWORD",
            flag: "password",
        };
        assert!(err.to_string().contains("ESC_PASSWORD"));
        assert_eq!(err.kind(), FailureKind::Internal);
    }

    #[test]
    fn test_step_failure_exit_code() {
        let err = CliError::from(StepFailure::new(
            BookingStep::Submit,
            BookingError::SubmissionRejected {
                banner: "Slot no longer available".into(),
            },
        ));
        assert_eq!(err.step(), Some(BookingStep::Submit));
        assert_eq!(err.exit_code(), 6);
        assert!(err.to_string().contains("submit"));
    }

    #[test]
    fn test_launch_failure_is_internal() {
        let err = CliError::from(BookingError::browser("no chromium"));
        assert_eq!(err.step(), None);
        assert_eq!(err.exit_code(), 1);
    }
}
