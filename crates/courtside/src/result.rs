//! Result and error types for Courtside.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::dropdown::SelectionAttempt;

/// Result type for Courtside operations
pub type BookingResult<T> = Result<T, BookingError>;

/// Errors that can occur while booking
#[derive(Debug, Error)]
pub enum BookingError {
    /// Login marker never appeared
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Error message
        message: String,
    },

    /// No schedule cell carries the requested time
    #[error("No slot labelled {time_label} on {date}")]
    SlotNotFound {
        /// Normalized time label that was searched for
        time_label: String,
        /// Target date
        date: String,
    },

    /// The slot exists but is already held
    #[error("Slot {time_label} is not available{}", court_suffix(.court))]
    SlotUnavailable {
        /// Normalized time label
        time_label: String,
        /// Court the slot belongs to, when the grid names it
        court: Option<String>,
    },

    /// Every dropdown strategy was exhausted
    #[error("Could not select {label:?} after {} attempts: {}", .attempts.len(), attempt_summary(.attempts))]
    DropdownSelectionFailed {
        /// Option label that was requested
        label: String,
        /// Every attempt in the order it was made
        attempts: Vec<SelectionAttempt>,
    },

    /// The portal answered the submission with an error banner
    #[error("Submission rejected: {banner}")]
    SubmissionRejected {
        /// Banner text shown by the portal
        banner: String,
    },

    /// The booking is visible but not every indicator matched
    #[error("Verification incomplete: found [{}], missing [{}]", join(.found), join(.missing))]
    VerificationIncomplete {
        /// Indicators that were found
        found: BTreeSet<String>,
        /// Indicators that were not found
        missing: BTreeSet<String>,
    },

    /// No selector in a chain matched
    #[error("Element not found: tried {}", .selectors.join(", "))]
    ElementNotFound {
        /// Every selector that was tried, in order
        selectors: Vec<String>,
    },

    /// The companion-player search offered no exact match
    #[error("Player {name:?} not offered by search (suggestions: {})", .suggestions.join(", "))]
    PlayerNotFound {
        /// Requested player name
        name: String,
        /// Suggestions that were visible
        suggestions: Vec<String>,
    },

    /// Handle belongs to a page that has since navigated
    #[error("Stale element handle {id} (page generation {generation}, now {current})")]
    StaleElement {
        /// Handle id
        id: u64,
        /// Generation the handle was obtained in
        generation: u64,
        /// Current page generation
        current: u64,
    },

    /// Bounded wait elapsed
    #[error("Timed out after {ms}ms waiting for {what}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// What was being waited for
        what: String,
    },

    /// Browser launch or protocol error
    #[error("Browser error: {message}")]
    Browser {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Script evaluation error
    #[error("Script evaluation failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// Request could not be constructed
    #[error("Invalid booking request: {message}")]
    InvalidRequest {
        /// Error message
        message: String,
    },

    /// Site profile could not be loaded
    #[error("Invalid site profile: {message}")]
    Profile {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl BookingError {
    /// Create a browser error
    #[must_use]
    pub fn browser(message: impl fmt::Display) -> Self {
        Self::Browser {
            message: message.to_string(),
        }
    }

    /// Create a script error
    #[must_use]
    pub fn script(message: impl fmt::Display) -> Self {
        Self::Script {
            message: message.to_string(),
        }
    }

    /// Create an invalid request error
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Coarse classification used for reporting and exit codes
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::AuthenticationFailed { .. } => FailureKind::AuthenticationFailed,
            Self::SlotNotFound { .. } => FailureKind::SlotNotFound,
            Self::SlotUnavailable { .. } => FailureKind::SlotUnavailable,
            Self::DropdownSelectionFailed { .. } => FailureKind::DropdownSelectionFailed,
            Self::SubmissionRejected { .. } => FailureKind::SubmissionRejected,
            Self::VerificationIncomplete { .. } => FailureKind::VerificationIncomplete,
            Self::ElementNotFound { .. } | Self::PlayerNotFound { .. } => {
                FailureKind::ElementNotFound
            }
            _ => FailureKind::Internal,
        }
    }
}

/// Failure taxonomy surfaced to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    AuthenticationFailed,
    SlotNotFound,
    SlotUnavailable,
    DropdownSelectionFailed,
    SubmissionRejected,
    VerificationIncomplete,
    ElementNotFound,
    /// Browser, configuration or I/O trouble
    Internal,
}

impl FailureKind {
    /// Stable name used in logs and summaries
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "AuthenticationFailed",
            Self::SlotNotFound => "SlotNotFound",
            Self::SlotUnavailable => "SlotUnavailable",
            Self::DropdownSelectionFailed => "DropdownSelectionFailed",
            Self::SubmissionRejected => "SubmissionRejected",
            Self::VerificationIncomplete => "VerificationIncomplete",
            Self::ElementNotFound => "ElementNotFound",
            Self::Internal => "Internal",
        }
    }

    /// Process exit code for this kind
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Internal => 1,
            Self::AuthenticationFailed => 2,
            Self::SlotNotFound => 3,
            Self::SlotUnavailable => 4,
            Self::DropdownSelectionFailed => 5,
            Self::SubmissionRejected => 6,
            Self::VerificationIncomplete => 7,
            Self::ElementNotFound => 8,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named stage of the booking pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStep {
    Authenticate,
    NavigateToDate,
    LocateSlot,
    OpenForm,
    SelectCourtType,
    SelectDuration,
    EnterPlayer,
    Submit,
    Verify,
}

impl BookingStep {
    /// Kebab-case step name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::NavigateToDate => "navigate-to-date",
            Self::LocateSlot => "locate-slot",
            Self::OpenForm => "open-form",
            Self::SelectCourtType => "select-court-type",
            Self::SelectDuration => "select-duration",
            Self::EnterPlayer => "enter-player",
            Self::Submit => "submit",
            Self::Verify => "verify",
        }
    }
}

impl fmt::Display for BookingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed pipeline step with its cause and the diagnostic screenshot, if any
#[derive(Debug, Error)]
#[error("step `{step}` failed: {error}")]
pub struct StepFailure {
    /// Step that failed
    pub step: BookingStep,
    /// Cause
    #[source]
    pub error: BookingError,
    /// Screenshot captured when the step failed
    pub artifact: Option<PathBuf>,
}

impl StepFailure {
    /// Create a step failure without an artifact
    #[must_use]
    pub const fn new(step: BookingStep, error: BookingError) -> Self {
        Self {
            step,
            error,
            artifact: None,
        }
    }

    /// Failure classification of the cause
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}

fn court_suffix(court: &Option<String>) -> String {
    court
        .as_deref()
        .map(|c| format!(" on {c}"))
        .unwrap_or_default()
}

fn attempt_summary(attempts: &[SelectionAttempt]) -> String {
    attempts
        .iter()
        .map(|a| {
            format!(
                "{}: {}",
                a.strategy,
                a.error_detail.as_deref().unwrap_or("no detail")
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_incomplete_lists_both_sides() {
        let err = BookingError::VerificationIncomplete {
            found: BTreeSet::from(["Jane Doe".to_string()]),
            missing: BTreeSet::from(["Singles".to_string()]),
        };
        let msg = err.to_string();
        assert!(msg.contains("found [Jane Doe]"));
        assert!(msg.contains("missing [Singles]"));
        assert_eq!(err.kind(), FailureKind::VerificationIncomplete);
    }

    #[test]
    fn test_dropdown_failure_carries_every_attempt() {
        let err = BookingError::DropdownSelectionFailed {
            label: "Singles".to_string(),
            attempts: vec![
                SelectionAttempt::failed("click", "option not offered"),
                SelectionAttempt::failed("keyboard", "read back \"Doubles\""),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("after 2 attempts"));
        assert!(msg.contains("click: option not offered"));
        assert!(msg.contains("keyboard: read back"));
    }

    #[test]
    fn test_slot_unavailable_names_court() {
        let err = BookingError::SlotUnavailable {
            time_label: "5:00 PM".to_string(),
            court: Some("Court 2".to_string()),
        };
        assert_eq!(err.to_string(), "Slot 5:00 PM is not available on Court 2");
    }

    #[test]
    fn test_exit_codes_are_distinct_and_nonzero() {
        let kinds = [
            FailureKind::Internal,
            FailureKind::AuthenticationFailed,
            FailureKind::SlotNotFound,
            FailureKind::SlotUnavailable,
            FailureKind::DropdownSelectionFailed,
            FailureKind::SubmissionRejected,
            FailureKind::VerificationIncomplete,
            FailureKind::ElementNotFound,
        ];
        let codes: BTreeSet<u8> = kinds.iter().map(|k| k.exit_code()).collect();
        assert_eq!(codes.len(), kinds.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn test_step_failure_display_names_step() {
        let failure = StepFailure::new(
            BookingStep::Submit,
            BookingError::SubmissionRejected {
                banner: "Slot no longer available".to_string(),
            },
        );
        assert_eq!(
            failure.to_string(),
            "step `submit` failed: Submission rejected: Slot no longer available"
        );
        assert_eq!(failure.kind(), FailureKind::SubmissionRejected);
    }

    #[test]
    fn test_player_not_found_is_element_kind() {
        let err = BookingError::PlayerNotFound {
            name: "Jane".to_string(),
            suggestions: vec![],
        };
        assert_eq!(err.kind(), FailureKind::ElementNotFound);
    }
}
