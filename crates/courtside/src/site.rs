//! Site profile: every URL, selector and marker the booking flow depends on.
//!
//! The built-in default targets the CourtReserve portal. A YAML file may
//! override any subset of fields:
//!
//! ```yaml
//! schedule:
//!   date_navigation:
//!     mode: url
//!     template: "https://club.example/schedule?date={date}"
//!     date_format: "%m/%d/%Y"
//!   preferred_courts: ["Court 2", "Court 1"]
//! verification:
//!   indicators: ["{player}", "{court_type}", "{time}"]
//!   member_name: "Sam Member"
//! ```

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::locator::{Selector, SelectorChain};
use crate::result::{BookingError, BookingResult};
use crate::slot::ScheduleGrid;

/// Login page URL of the default profile
pub const COURTRESERVE_LOGIN_URL: &str = "https://app.courtreserve.com/Online/Account/LogIn/11122";

/// Bookings page URL of the default profile
pub const COURTRESERVE_BOOKINGS_URL: &str =
    "https://app.courtreserve.com/Online/Reservations/Bookings/11122?sId=15491";

/// Everything site-specific
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteProfile {
    /// Profile name, for logs
    pub name: String,
    pub login: LoginProfile,
    pub schedule: ScheduleProfile,
    pub form: FormProfile,
    pub verification: VerificationProfile,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            name: "courtreserve".to_string(),
            login: LoginProfile::default(),
            schedule: ScheduleProfile::default(),
            form: FormProfile::default(),
            verification: VerificationProfile::default(),
        }
    }
}

/// Login form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoginProfile {
    pub url: String,
    pub username: SelectorChain,
    pub password: SelectorChain,
    pub submit: SelectorChain,
    /// Login succeeded once the URL contains this
    pub success_url_fragment: Option<String>,
    /// Login succeeded once any of these is visible
    pub success_marker: SelectorChain,
}

impl Default for LoginProfile {
    fn default() -> Self {
        Self {
            url: COURTRESERVE_LOGIN_URL.to_string(),
            username: SelectorChain::css("input[type='text']").or(Selector::css("input[type='email']")),
            password: SelectorChain::css("input[type='password']"),
            submit: SelectorChain::css("button[type='submit']").or(Selector::css("input[type='submit']")),
            success_url_fragment: Some("Portal".to_string()),
            success_marker: SelectorChain::default(),
        }
    }
}

/// How to reach the schedule for a given date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case", deny_unknown_fields)]
pub enum DateNavigation {
    /// Build the URL from a template with a `{date}` placeholder
    Url {
        template: String,
        /// chrono format string for the date
        date_format: String,
    },
    /// Open the schedule URL and click a "next day" control once per day
    NextDayButton { button: SelectorChain },
    /// Open the schedule URL and pick the day from a calendar popup
    DatePicker(DatePickerProfile),
}

/// Calendar popup on the schedule page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatePickerProfile {
    /// Control that opens the calendar
    pub trigger: SelectorChain,
    pub calendar: SelectorChain,
    /// Moves the calendar forward one month
    pub next_month: SelectorChain,
    /// Day cells inside the calendar
    pub day_cells: SelectorChain,
    /// Class fragment marking cells from adjacent months
    pub other_month_marker: String,
    /// How long the calendar gets to open
    pub open_timeout_ms: u64,
    /// Clicked once per day when the calendar cannot be used
    pub fallback_button: SelectorChain,
}

impl Default for DatePickerProfile {
    fn default() -> Self {
        Self {
            trigger: SelectorChain::css(".k-datepicker")
                .or(Selector::css("[title='Select date']")),
            calendar: SelectorChain::css(".k-calendar")
                .or(Selector::css(".k-datepicker-calendar"))
                .or(Selector::css(".k-popup")),
            next_month: SelectorChain::css(".k-calendar .k-nav-next")
                .or(Selector::css(".k-calendar [aria-label='Next']")),
            day_cells: SelectorChain::css(".k-calendar td")
                .or(Selector::css(".k-datepicker-calendar td")),
            other_month_marker: "k-other-month".to_string(),
            open_timeout_ms: 2_000,
            fallback_button: SelectorChain::css("button[title='Next']")
                .or(Selector::css("a[title='Next']"))
                .or(Selector::css(".k-nav-next")),
        }
    }
}

/// Schedule grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleProfile {
    pub url: String,
    pub date_navigation: DateNavigation,
    /// Cells scanned for the target time
    pub cells: SelectorChain,
    pub booked_markers: Vec<String>,
    pub open_markers: Vec<String>,
    /// Regex extracting a court name from cell text
    pub court_pattern: Option<String>,
    pub preferred_courts: Vec<String>,
    /// Pause after each date step for the grid to re-render
    pub settle_ms: u64,
}

impl Default for ScheduleProfile {
    fn default() -> Self {
        Self {
            url: COURTRESERVE_BOOKINGS_URL.to_string(),
            date_navigation: DateNavigation::DatePicker(DatePickerProfile::default()),
            cells: SelectorChain::css("button, td, div.fn-portal-reservation-container")
                .or(Selector::css("div, span")),
            booked_markers: ["booked", "full", "reserved", "fn-portal-reservation-container"]
                .map(String::from)
                .to_vec(),
            open_markers: vec!["reserve".to_string()],
            court_pattern: Some(r"(?i)court\s*\d+".to_string()),
            preferred_courts: Vec::new(),
            settle_ms: 1_000,
        }
    }
}

impl ScheduleProfile {
    /// Compile into a grid description
    pub fn grid(&self) -> BookingResult<ScheduleGrid> {
        let court_pattern = self
            .court_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| BookingError::Profile {
                message: format!("court_pattern: {e}"),
            })?;
        Ok(ScheduleGrid {
            cells: self.cells.clone(),
            booked_markers: self.booked_markers.iter().map(|m| m.to_lowercase()).collect(),
            open_markers: self.open_markers.iter().map(|m| m.to_lowercase()).collect(),
            court_pattern,
        })
    }
}

/// A widget-library dropdown on the booking form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DropdownProfile {
    /// Candidate widget roots inside the form
    pub root: SelectorChain,
    /// Prefer the root whose text contains this
    pub root_hint: Option<String>,
    /// Value display inside the root
    pub display: SelectorChain,
    /// Popup options, page-wide
    pub options: SelectorChain,
    /// Highlighted option during keyboard navigation
    pub focused_option: SelectorChain,
    /// Id of the hidden backing input
    pub backing_input: Option<String>,
    /// Use the first root when neither hint nor backing input identifies one
    pub fallback_to_first: bool,
}

impl Default for DropdownProfile {
    fn default() -> Self {
        Self {
            root: SelectorChain::css(".k-dropdown").or(Selector::css(".k-dropdownlist")),
            root_hint: None,
            display: SelectorChain::css(".k-input-inner").or(Selector::css(".k-input")),
            options: SelectorChain::css(".k-animation-container .k-list li")
                .or(Selector::css("ul.k-list li")),
            focused_option: SelectorChain::css(".k-animation-container .k-list li.k-focus")
                .or(Selector::css(".k-animation-container .k-list li.k-state-focused")),
            backing_input: None,
            fallback_to_first: false,
        }
    }
}

impl DropdownProfile {
    fn court_type() -> Self {
        Self {
            root_hint: Some("Reservation Type".to_string()),
            backing_input: Some("ReservationTypeId".to_string()),
            fallback_to_first: true,
            ..Self::default()
        }
    }

    fn duration() -> Self {
        Self {
            backing_input: Some("Duration".to_string()),
            ..Self::default()
        }
    }
}

/// Companion-player field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerProfile {
    pub input: SelectorChain,
    /// Live-search suggestions; `None` when the field is plain text
    pub suggestions: Option<SelectorChain>,
    /// How long to wait for suggestions
    pub suggestion_timeout_ms: u64,
}

impl Default for PlayerProfile {
    fn default() -> Self {
        Self {
            input: SelectorChain::css("input[name='OwnersDropdown_input']")
                .or(Selector::css("input[placeholder*='player' i]")),
            suggestions: Some(SelectorChain::css(".k-list-item").or(Selector::css("[role='option']"))),
            suggestion_timeout_ms: 10_000,
        }
    }
}

/// Booking form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormProfile {
    /// Booking modal
    pub modal: SelectorChain,
    pub court_type: DropdownProfile,
    /// Duration dropdown, when the form has one
    pub duration: Option<DropdownProfile>,
    pub player: PlayerProfile,
    pub submit: SelectorChain,
    pub success_markers: SelectorChain,
    pub error_banners: SelectorChain,
    /// Treat a closed modal as a successful submission
    pub modal_closes_on_success: bool,
}

impl Default for FormProfile {
    fn default() -> Self {
        Self {
            modal: SelectorChain::css(".modal.show").or(Selector::css("[role='dialog']")),
            court_type: DropdownProfile::court_type(),
            duration: Some(DropdownProfile::duration()),
            player: PlayerProfile::default(),
            submit: SelectorChain::css("button.btn.btn-primary.btn-submit")
                .or(Selector::css_with_text("button", "Save"))
                .or(Selector::css("button[type='submit']")),
            success_markers: SelectorChain::css(".alert-success")
                .or(Selector::css(".k-notification-success"))
                .or(Selector::text("Reservation created"))
                .or(Selector::text("booking confirmed")),
            error_banners: SelectorChain::css(".alert-danger")
                .or(Selector::css(".validation-summary-errors"))
                .or(Selector::css(".k-notification-error")),
            modal_closes_on_success: true,
        }
    }
}

/// Post-submission verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerificationProfile {
    /// Indicator templates; `{player}`, `{court_type}`, `{member}`, `{username}`
    /// and `{time}` expand
    pub indicators: Vec<String>,
    /// Attributes read alongside cell text
    pub attributes: Vec<String>,
    /// Name the schedule shows on the member's own bookings; the username
    /// stands in when unset
    pub member_name: Option<String>,
}

impl Default for VerificationProfile {
    fn default() -> Self {
        Self {
            indicators: vec!["{player}".to_string(), "{court_type}".to_string()],
            attributes: ["title", "data-original-title", "aria-label"]
                .map(String::from)
                .to_vec(),
            member_name: None,
        }
    }
}

impl SiteProfile {
    /// Parse a YAML profile; missing fields keep their defaults
    pub fn from_yaml_str(yaml: &str) -> BookingResult<Self> {
        let profile: Self = serde_yaml_ng::from_str(yaml)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Load a YAML profile from disk
    pub fn load(path: &Path) -> BookingResult<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| BookingError::Profile {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject profiles the flow cannot run with
    pub fn validate(&self) -> BookingResult<()> {
        let fail = |message: &str| {
            Err(BookingError::Profile {
                message: message.to_string(),
            })
        };
        if self.login.url.is_empty() || self.schedule.url.is_empty() {
            return fail("login and schedule URLs must be set");
        }
        if self.login.success_url_fragment.is_none() && self.login.success_marker.is_empty() {
            return fail("login needs a success URL fragment or success marker");
        }
        match &self.schedule.date_navigation {
            DateNavigation::Url { template, .. } if !template.contains("{date}") => {
                return fail("date navigation template must contain {date}");
            }
            DateNavigation::DatePicker(picker)
                if picker.trigger.is_empty() || picker.day_cells.is_empty() =>
            {
                return fail("date picker needs trigger and day cell selectors");
            }
            _ => {}
        }
        if self.schedule.cells.is_empty() || self.form.submit.is_empty() {
            return fail("schedule cells and submit selectors must be set");
        }
        if self.verification.indicators.is_empty() {
            return fail("at least one verification indicator is required");
        }
        let _ = self.schedule.grid()?;
        Ok(())
    }
}
