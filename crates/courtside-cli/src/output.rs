//! Run summary on the terminal

use std::path::Path;

use console::{style, Term};
use courtside::{FailureKind, WorkflowReport};
use serde::Serialize;

use crate::commands::OutputArg;
use crate::error::CliError;

/// Machine-readable run summary
#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    /// `booked`, `dry-run` or `failed`
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<&'a WorkflowReport>,
}

impl<'a> Summary<'a> {
    /// Summary of a finished run
    #[must_use]
    pub fn success(report: &'a WorkflowReport) -> Self {
        Self {
            status: if report.booking.submitted {
                "booked"
            } else {
                "dry-run"
            },
            step: None,
            kind: None,
            message: None,
            artifact: None,
            report: Some(report),
        }
    }

    /// Summary of a failed run
    #[must_use]
    pub fn failure(error: &'a CliError) -> Self {
        let artifact = match error {
            CliError::Step(failure) => failure.artifact.as_deref(),
            _ => None,
        };
        Self {
            status: "failed",
            step: error.step().map(|s| s.to_string()),
            kind: Some(error.kind()),
            message: Some(error.to_string()),
            artifact,
            report: None,
        }
    }
}

/// Prints the outcome of a run
#[derive(Debug)]
pub struct Reporter {
    out: Term,
    err: Term,
    format: OutputArg,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(format: OutputArg, use_color: bool, quiet: bool) -> Self {
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            format,
            use_color,
            quiet,
        }
    }

    /// Report a successful run
    pub fn success(&self, report: &WorkflowReport) {
        if self.format == OutputArg::Json {
            self.json(&Summary::success(report));
            return;
        }
        if self.quiet {
            return;
        }
        let booking = &report.booking;
        let mut headline = format!(
            "{} {} on {}",
            if booking.submitted { "Booked" } else { "Dry run filled" },
            booking.time_label,
            booking.date
        );
        if let Some(court) = &booking.court {
            headline.push_str(&format!(" ({court})"));
        }
        let _ = self.out.write_line(&format!("{} {headline}", self.mark(true)));
        let _ = self.out.write_line(&format!(
            "  court type: {} via {}",
            booking.court_type.displayed, booking.court_type.strategy
        ));
        if let Some(duration) = &booking.duration {
            let _ = self.out.write_line(&format!("  duration:   {}", duration.displayed));
        }
        if let Some(player) = &booking.player {
            let _ = self.out.write_line(&format!("  player:     {player}"));
        }
        if let Some(verification) = &report.verification {
            let found: Vec<&str> = verification.found.iter().map(String::as_str).collect();
            let _ = self
                .out
                .write_line(&format!("  verified:   {}", found.join(", ")));
        }
    }

    /// Report a failed run on stderr (JSON goes to stdout)
    pub fn failure(&self, error: &CliError) {
        if self.format == OutputArg::Json {
            self.json(&Summary::failure(error));
            return;
        }
        let label = match error.step() {
            Some(step) => format!("{} at step `{step}`", error.kind()),
            None => error.kind().to_string(),
        };
        let _ = self
            .err
            .write_line(&format!("{} {label}: {error}", self.mark(false)));
        if let CliError::Step(failure) = error {
            if let Some(path) = &failure.artifact {
                let _ = self
                    .err
                    .write_line(&format!("  screenshot: {}", path.display()));
            }
        }
    }

    fn json(&self, summary: &Summary<'_>) {
        match serde_json::to_string_pretty(summary) {
            Ok(json) => {
                let _ = self.out.write_line(&json);
            }
            Err(e) => {
                let _ = self.err.write_line(&format!("could not encode summary: {e}"));
            }
        }
    }

    fn mark(&self, ok: bool) -> String {
        match (ok, self.use_color) {
            (true, true) => style("✓").green().bold().to_string(),
            (false, true) => style("✗").red().bold().to_string(),
            (true, false) => "OK".to_string(),
            (false, false) => "FAIL".to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use courtside::{BookingError, BookingStep, StepFailure};
    use std::path::PathBuf;

    #[test]
    fn test_failure_summary_names_step_and_kind() {
        let mut failure = StepFailure::new(
            BookingStep::LocateSlot,
            BookingError::SlotNotFound {
                time_label: "5:00 PM".into(),
                date: "2026-10-29".into(),
            },
        );
        failure.artifact = Some(PathBuf::from("failure.png"));
        let error = CliError::from(failure);

        let json = serde_json::to_value(Summary::failure(&error)).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["step"], "locate-slot");
        assert_eq!(json["kind"], "slot-not-found");
        assert_eq!(json["artifact"], "failure.png");
        assert!(json.get("report").is_none());
    }

    #[test]
    fn test_config_failure_has_no_step() {
        let error = CliError::config("bad");
        let json = serde_json::to_value(Summary::failure(&error)).unwrap();
        assert!(json.get("step").is_none());
        assert_eq!(json["kind"], "internal");
    }
}
