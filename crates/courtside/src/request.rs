//! Booking request and credentials.

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::result::{BookingError, BookingResult};
use crate::slot::parse_time_label;

/// Court type offered by the booking form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CourtType {
    Singles,
    SoloPractice,
}

impl CourtType {
    /// Option label shown by the form
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Singles => "Singles",
            Self::SoloPractice => "Solo Practice",
        }
    }
}

impl fmt::Display for CourtType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What to book. Fixed before the browser is touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingRequest {
    target_date: NaiveDate,
    days_ahead: u32,
    time_label: String,
    court_type: CourtType,
    additional_player: Option<String>,
    duration_minutes: u32,
}

impl BookingRequest {
    /// Build a request for `today + days_ahead`.
    ///
    /// The court type is Singles when a companion player is named and Solo
    /// Practice otherwise. The time label is stored normalized.
    pub fn new(
        today: NaiveDate,
        days_ahead: u32,
        time_label: &str,
        additional_player: Option<String>,
        duration_minutes: u32,
    ) -> BookingResult<Self> {
        let time_label = parse_time_label(time_label).ok_or_else(|| {
            BookingError::invalid_request(format!("{time_label:?} is not a clock time like \"5:00 PM\""))
        })?;
        if duration_minutes == 0 {
            return Err(BookingError::invalid_request("duration must be positive"));
        }
        let target_date = today
            .checked_add_days(Days::new(u64::from(days_ahead)))
            .ok_or_else(|| BookingError::invalid_request("target date out of range"))?;
        let additional_player = additional_player
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        let court_type = if additional_player.is_some() {
            CourtType::Singles
        } else {
            CourtType::SoloPractice
        };
        Ok(Self {
            target_date,
            days_ahead,
            time_label,
            court_type,
            additional_player,
            duration_minutes,
        })
    }

    pub const fn target_date(&self) -> NaiveDate {
        self.target_date
    }

    pub const fn days_ahead(&self) -> u32 {
        self.days_ahead
    }

    /// Normalized time label
    pub fn time_label(&self) -> &str {
        &self.time_label
    }

    pub const fn court_type(&self) -> CourtType {
        self.court_type
    }

    pub fn additional_player(&self) -> Option<&str> {
        self.additional_player.as_deref()
    }

    pub const fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Duration as the form labels it, e.g. "45 minutes" or "1 hour 30 minutes"
    #[must_use]
    pub fn duration_label(&self) -> String {
        duration_label(self.duration_minutes)
    }
}

/// Format minutes the way the portal's duration dropdown does
#[must_use]
pub fn duration_label(minutes: u32) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    let hour_part = match hours {
        0 => None,
        1 => Some("1 hour".to_string()),
        h => Some(format!("{h} hours")),
    };
    let minute_part = (rest > 0).then(|| format!("{rest} minutes"));
    match (hour_part, minute_part) {
        (Some(h), Some(m)) => format!("{h} {m}"),
        (Some(h), None) => h,
        (None, Some(m)) => m,
        (None, None) => "0 minutes".to_string(),
    }
}

/// Portal login
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    #[test]
    fn test_target_date_is_offset() {
        let request = BookingRequest::new(today(), 14, "5:00 PM", None, 45).unwrap();
        assert_eq!(
            request.target_date(),
            NaiveDate::from_ymd_opt(2026, 10, 29).unwrap()
        );
        assert_eq!(request.days_ahead(), 14);
    }

    #[test]
    fn test_court_type_follows_player() {
        let singles =
            BookingRequest::new(today(), 1, "5pm", Some("Jane Doe".to_string()), 45).unwrap();
        assert_eq!(singles.court_type(), CourtType::Singles);
        assert_eq!(singles.additional_player(), Some("Jane Doe"));

        let solo = BookingRequest::new(today(), 1, "5pm", Some("   ".to_string()), 45).unwrap();
        assert_eq!(solo.court_type(), CourtType::SoloPractice);
        assert_eq!(solo.additional_player(), None);
    }

    #[test]
    fn test_time_label_is_normalized() {
        let request = BookingRequest::new(today(), 0, " 5:00 p.m.", None, 45).unwrap();
        assert_eq!(request.time_label(), "5:00 PM");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(BookingRequest::new(today(), 0, "teatime", None, 45).is_err());
        assert!(BookingRequest::new(today(), 0, "5:00 PM", None, 0).is_err());
    }

    #[test]
    fn test_duration_labels() {
        assert_eq!(duration_label(45), "45 minutes");
        assert_eq!(duration_label(60), "1 hour");
        assert_eq!(duration_label(90), "1 hour 30 minutes");
        assert_eq!(duration_label(120), "2 hours");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("me@example.com", "hunter2"));
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_court_type_labels() {
        assert_eq!(CourtType::Singles.to_string(), "Singles");
        assert_eq!(CourtType::SoloPractice.label(), "Solo Practice");
    }
}
