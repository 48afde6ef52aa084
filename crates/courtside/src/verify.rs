//! BookingVerifier - confirm the booking by re-reading the schedule.
//!
//! Indicators are configuration: templates from the site profile expanded
//! against the request. An indicator whose placeholder has no value (no
//! companion player, say) is not required. Some indicator must tie the slot
//! to this booking: when no player, member or username indicator survives
//! expansion, the member's display name is required.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::artifacts::{ArtifactSink, Checkpoint};
use crate::driver::PortalDriver;
use crate::navigation::open_schedule;
use crate::request::BookingRequest;
use crate::result::{BookingError, BookingResult};
use crate::site::SiteProfile;
use crate::slot::{ScheduleSlot, SlotFinder};
use crate::wait::WaitOptions;

/// Placeholders naming who holds the slot
const IDENTITY_PLACEHOLDERS: [&str; 3] = ["{player}", "{member}", "{username}"];

/// Result of the verification pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    /// Indicators seen on the best-matching slot
    pub found: BTreeSet<String>,
    /// Required indicators that were not seen
    pub missing: BTreeSet<String>,
    /// True only when nothing is missing
    pub all_required_present: bool,
}

impl VerificationOutcome {
    fn from_sets(found: BTreeSet<String>, required: &BTreeSet<String>) -> Self {
        let missing: BTreeSet<String> = required.difference(&found).cloned().collect();
        Self {
            all_required_present: missing.is_empty(),
            found,
            missing,
        }
    }
}

/// Values substituted into indicator templates
#[derive(Debug, Clone, Copy)]
pub struct IndicatorValues<'a> {
    pub username: &'a str,
    /// Name the portal shows for the member
    pub member: &'a str,
}

/// Expand indicator templates for `request`.
///
/// Placeholders: `{player}`, `{court_type}`, `{member}`, `{username}`, `{time}`.
/// Templates that reference an empty value, or expand to nothing, are dropped.
#[must_use]
pub fn expand_indicators(
    templates: &[String],
    request: &BookingRequest,
    identity: IndicatorValues<'_>,
) -> BTreeSet<String> {
    let values = [
        ("{player}", request.additional_player().unwrap_or_default()),
        ("{court_type}", request.court_type().label()),
        ("{member}", identity.member),
        ("{username}", identity.username),
        ("{time}", request.time_label()),
    ];
    templates
        .iter()
        .filter_map(|template| {
            let mut expanded = template.clone();
            for (placeholder, value) in values {
                if expanded.contains(placeholder) {
                    if value.is_empty() {
                        return None;
                    }
                    expanded = expanded.replace(placeholder, value);
                }
            }
            let expanded = expanded.trim().to_string();
            (!expanded.is_empty()).then_some(expanded)
        })
        .collect()
}

/// Reloads the target day and checks the slot carries every indicator
#[derive(Debug)]
pub struct BookingVerifier<'a, D> {
    driver: &'a D,
    site: &'a SiteProfile,
    artifacts: &'a ArtifactSink,
    username: &'a str,
    wait: WaitOptions,
}

impl<'a, D: PortalDriver> BookingVerifier<'a, D> {
    #[must_use]
    pub fn new(
        driver: &'a D,
        site: &'a SiteProfile,
        artifacts: &'a ArtifactSink,
        username: &'a str,
    ) -> Self {
        Self {
            driver,
            site,
            artifacts,
            username,
            wait: WaitOptions::default(),
        }
    }

    /// Bound the wait for the schedule to render
    #[must_use]
    pub const fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Indicators `request` must show, always including one that identifies
    /// the booking.
    ///
    /// Fails with a profile error when nothing applies.
    pub fn required_indicators(&self, request: &BookingRequest) -> BookingResult<BTreeSet<String>> {
        let verification = &self.site.verification;
        let identity = IndicatorValues {
            username: self.username,
            member: verification
                .member_name
                .as_deref()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(self.username),
        };
        let mut required = expand_indicators(&verification.indicators, request, identity);

        let identifying: Vec<String> = verification
            .indicators
            .iter()
            .filter(|t| IDENTITY_PLACEHOLDERS.iter().any(|p| t.contains(p)))
            .cloned()
            .collect();
        if expand_indicators(&identifying, request, identity).is_empty() {
            let member = identity.member.trim();
            if !member.is_empty() {
                debug!(%member, "requiring member name on the slot");
                required.insert(member.to_string());
            }
        }

        if required.is_empty() {
            return Err(BookingError::Profile {
                message: "no verification indicator applies to this booking".to_string(),
            });
        }
        Ok(required)
    }

    /// Re-open the schedule for the request's date and check the slot.
    ///
    /// With `booked_court` known only that court's cell is judged; otherwise
    /// the cell showing the most indicators is. With no matching slot at all,
    /// every indicator is missing.
    pub async fn verify(
        &self,
        request: &BookingRequest,
        booked_court: Option<&str>,
    ) -> BookingResult<VerificationOutcome> {
        let required = self.required_indicators(request)?;
        open_schedule(
            self.driver,
            &self.site.schedule,
            request.target_date(),
            request.days_ahead(),
            &self.wait,
        )
        .await?;

        let grid = self.site.schedule.grid()?;
        let finder = SlotFinder::new(self.driver, &grid, request.target_date().to_string());
        let slots: Vec<ScheduleSlot> = finder
            .scan(request.time_label())
            .await?
            .into_iter()
            .filter(|slot| on_court(slot, booked_court))
            .collect();
        if slots.is_empty() {
            warn!(court = ?booked_court, "booked slot not on the schedule");
        }

        let mut best = BTreeSet::new();
        for slot in &slots {
            let mut haystack = slot.text.clone();
            for name in &self.site.verification.attributes {
                if let Some(value) = self.driver.attribute(&slot.handle, name).await? {
                    haystack.push(' ');
                    haystack.push_str(&value);
                }
            }
            let haystack = haystack.to_lowercase();
            let found: BTreeSet<String> = required
                .iter()
                .filter(|indicator| haystack.contains(&indicator.to_lowercase()))
                .cloned()
                .collect();
            debug!(id = slot.handle.id, court = ?slot.court, found = found.len(), "slot checked");
            if found.len() > best.len() {
                best = found;
            }
        }
        let _ = self.artifacts.capture(self.driver, Checkpoint::Verification).await;

        let outcome = VerificationOutcome::from_sets(best, &required);
        if outcome.all_required_present {
            info!(found = ?outcome.found, "booking verified");
        } else {
            warn!(found = ?outcome.found, missing = ?outcome.missing, "booking only partly verified");
        }
        Ok(outcome)
    }
}

fn on_court(slot: &ScheduleSlot, booked_court: Option<&str>) -> bool {
    match booked_court {
        Some(court) => slot
            .court
            .as_deref()
            .is_some_and(|c| c.trim().eq_ignore_ascii_case(court.trim())),
        None => true,
    }
}
