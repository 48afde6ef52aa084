//! SlotFinder - locate a time slot on the day's schedule grid.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::{ElementHandle, PortalDriver};
use crate::locator::{PageLocator, SelectorChain};
use crate::result::{BookingError, BookingResult};

fn time_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)\b([0-9]{1,2})(?::([0-9]{2}))?\s*([ap])\.?\s*m\b\.?").ok())
        .as_ref()
}

/// Canonical form of the first clock time in `text`, e.g. `"5:00 PM"`
#[must_use]
pub fn parse_time_label(text: &str) -> Option<String> {
    let caps = time_pattern()?.captures(text)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute = caps.get(2).map_or("00", |m| m.as_str());
    let meridiem = caps.get(3)?.as_str().to_ascii_uppercase();
    Some(format!("{hour}:{minute} {meridiem}M"))
}

/// Normalize a time label for comparison.
///
/// Text holding a clock time reduces to its canonical form (`"5:00pm"`,
/// `" 5:00 P.M."` and `"05:00 PM"` all become `"5:00 PM"`). Anything else
/// is whitespace-collapsed and upper-cased. Normalizing twice changes
/// nothing.
#[must_use]
pub fn normalize_time_label(text: &str) -> String {
    parse_time_label(text).unwrap_or_else(|| {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase()
    })
}

/// Availability of a schedule slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    Open,
    Booked,
    Unknown,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Booked => "booked",
            Self::Unknown => "unknown",
        })
    }
}

/// Grid cell matching a time label. Only valid until the page navigates.
#[derive(Debug, Clone)]
pub struct ScheduleSlot {
    /// Normalized time label
    pub time_label: String,
    /// Cell handle
    pub handle: ElementHandle,
    /// Availability derived from class and text markers
    pub availability: Availability,
    /// Court named by the cell, if any
    pub court: Option<String>,
    /// Cell text
    pub text: String,
}

/// How to read the schedule grid
#[derive(Debug, Clone)]
pub struct ScheduleGrid {
    /// Candidate cells, scanned in document order
    pub cells: SelectorChain,
    /// Lower-case class or text fragments marking a held slot
    pub booked_markers: Vec<String>,
    /// Lower-case class or text fragments marking a bookable slot
    pub open_markers: Vec<String>,
    /// Extracts the court name from cell text
    pub court_pattern: Option<Regex>,
}

impl ScheduleGrid {
    /// Availability from the cell's class attribute and text.
    ///
    /// Booked markers are checked first, so "reserved" is never read as "reserve".
    #[must_use]
    pub fn availability(&self, class: &str, text: &str) -> Availability {
        let haystack = format!("{} {}", class, text).to_lowercase();
        if self.booked_markers.iter().any(|m| haystack.contains(m.as_str())) {
            Availability::Booked
        } else if self.open_markers.iter().any(|m| haystack.contains(m.as_str())) {
            Availability::Open
        } else {
            Availability::Unknown
        }
    }

    fn court(&self, text: &str) -> Option<String> {
        self.court_pattern
            .as_ref()
            .and_then(|p| p.find(text))
            .map(|m| m.as_str().to_string())
    }
}

/// Scans the schedule grid shown for one date
#[derive(Debug)]
pub struct SlotFinder<'a, D: ?Sized> {
    driver: &'a D,
    grid: &'a ScheduleGrid,
    date: String,
}

impl<'a, D: PortalDriver + ?Sized> SlotFinder<'a, D> {
    /// Create a finder for the grid currently displayed for `date`
    #[must_use]
    pub fn new(driver: &'a D, grid: &'a ScheduleGrid, date: impl Into<String>) -> Self {
        Self {
            driver,
            grid,
            date: date.into(),
        }
    }

    /// Every cell whose time normalizes to `target`, in document order
    pub async fn scan(&self, target: &str) -> BookingResult<Vec<ScheduleSlot>> {
        let wanted = normalize_time_label(target);
        let cells = PageLocator::new(self.driver)
            .find_all(&self.grid.cells, None)
            .await?;
        let mut slots = Vec::new();
        for cell in cells {
            let Some(label) = parse_time_label(&cell.text) else {
                continue;
            };
            if label != wanted {
                continue;
            }
            let class = self
                .driver
                .attribute(&cell, "class")
                .await?
                .unwrap_or_default();
            let title = self
                .driver
                .attribute(&cell, "title")
                .await?
                .unwrap_or_default();
            let availability = self.grid.availability(&class, &cell.text);
            let court = self
                .grid
                .court(&cell.text)
                .or_else(|| self.grid.court(&title));
            debug!(%label, %availability, ?court, id = cell.id, "slot candidate");
            slots.push(ScheduleSlot {
                time_label: label,
                text: cell.text.clone(),
                handle: cell,
                availability,
                court,
            });
        }
        Ok(slots)
    }

    /// First cell matching `target`, or `SlotNotFound`
    pub async fn find_slot(&self, target: &str) -> BookingResult<ScheduleSlot> {
        self.scan(target)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| self.not_found(target))
    }

    /// Matching cells ordered for booking: preferred courts first, then the rest
    /// in document order
    pub async fn find_candidates(
        &self,
        target: &str,
        preferred_courts: &[String],
    ) -> BookingResult<Vec<ScheduleSlot>> {
        let mut slots = self.scan(target).await?;
        if slots.is_empty() {
            return Err(self.not_found(target));
        }
        slots.sort_by_key(|s| court_rank(s.court.as_deref(), preferred_courts));
        Ok(slots)
    }

    fn not_found(&self, target: &str) -> BookingError {
        BookingError::SlotNotFound {
            time_label: normalize_time_label(target),
            date: self.date.clone(),
        }
    }
}

fn court_rank(court: Option<&str>, preferred: &[String]) -> usize {
    court
        .and_then(|c| preferred.iter().position(|p| p.eq_ignore_ascii_case(c)))
        .unwrap_or(preferred.len())
}

/// Pick the slot to book: first open candidate, else first of unknown state.
///
/// Fails with `SlotUnavailable` when every candidate is booked.
pub fn choose_bookable(candidates: Vec<ScheduleSlot>) -> BookingResult<ScheduleSlot> {
    let first_booked = candidates.first().map(|s| (s.time_label.clone(), s.court.clone()));
    let mut unknown = None;
    for slot in candidates {
        match slot.availability {
            Availability::Open => return Ok(slot),
            Availability::Unknown if unknown.is_none() => unknown = Some(slot),
            _ => {}
        }
    }
    match (unknown, first_booked) {
        (Some(slot), _) => Ok(slot),
        (None, Some((time_label, court))) => Err(BookingError::SlotUnavailable { time_label, court }),
        (None, None) => Err(BookingError::SlotUnavailable {
            time_label: String::new(),
            court: None,
        }),
    }
}
