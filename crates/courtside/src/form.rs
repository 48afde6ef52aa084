//! BookingFormFiller - the linear booking pipeline.
//!
//! Steps run strictly in order and the first failure ends the run. Every
//! failure is returned as a [`StepFailure`] naming the step, with a
//! `failure.png` screenshot when artifacts are enabled.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::artifacts::{ArtifactSink, Checkpoint};
use crate::driver::{ElementHandle, PortalDriver};
use crate::dropdown::{labels_match, DropdownSelector, DropdownWidget, SelectionReport};
use crate::locator::{PageLocator, Selector};
use crate::navigation::open_schedule;
use crate::request::{BookingRequest, Credentials};
use crate::result::{BookingError, BookingResult, BookingStep, StepFailure};
use crate::site::{DropdownProfile, SiteProfile};
use crate::slot::{choose_bookable, ScheduleSlot, SlotFinder};
use crate::wait::{poll_until, WaitOptions, DEFAULT_OPTION_TIMEOUT_MS};

const SCROLL_INTO_VIEW: &str = "el.scrollIntoView({block: 'center', inline: 'center'}); return true;";
const SCRIPT_CLICK: &str = "el.click(); return true;";

/// Bounded waits used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSettings {
    /// Elements appearing after navigation or a click
    pub element: WaitOptions,
    /// Dropdown options rendering
    pub option: WaitOptions,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            element: WaitOptions::default(),
            option: WaitOptions::from_millis(DEFAULT_OPTION_TIMEOUT_MS),
        }
    }
}

impl WaitSettings {
    /// Element waits bounded by `timeout`, option waits by the default
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            element: WaitOptions::new(timeout),
            ..Self::default()
        }
    }
}

/// What the pipeline did
#[derive(Debug, Clone, Serialize)]
pub struct BookingOutcome {
    pub date: NaiveDate,
    /// Normalized time of the booked slot
    pub time_label: String,
    /// Court of the booked slot, when the grid names it
    pub court: Option<String>,
    pub court_type: SelectionReport,
    pub duration: Option<SelectionReport>,
    /// Suggestion text the companion player resolved to
    pub player: Option<String>,
    /// False for dry runs
    pub submitted: bool,
}

/// Run one named step, turning its error into a [`StepFailure`]
pub(crate) async fn run_step<D, T, F>(
    driver: &D,
    artifacts: &ArtifactSink,
    step: BookingStep,
    work: F,
) -> Result<T, StepFailure>
where
    D: PortalDriver + ?Sized,
    F: Future<Output = BookingResult<T>>,
{
    async {
        info!("step started");
        match work.await {
            Ok(value) => {
                debug!("step finished");
                Ok(value)
            }
            Err(error) => {
                let artifact = artifacts.capture(driver, Checkpoint::Failure).await;
                warn!(kind = %error.kind(), %error, artifact = ?artifact, "step failed");
                Err(StepFailure {
                    step,
                    error,
                    artifact,
                })
            }
        }
    }
    .instrument(info_span!("step", step = %step))
    .await
}

/// Drives login, date navigation, slot selection, form filling and submission
#[derive(Debug)]
pub struct BookingFormFiller<'a, D> {
    driver: &'a D,
    site: &'a SiteProfile,
    credentials: &'a Credentials,
    artifacts: &'a ArtifactSink,
    waits: WaitSettings,
    dropdowns: DropdownSelector,
    dry_run: bool,
}

impl<'a, D: PortalDriver> BookingFormFiller<'a, D> {
    #[must_use]
    pub fn new(
        driver: &'a D,
        site: &'a SiteProfile,
        credentials: &'a Credentials,
        artifacts: &'a ArtifactSink,
    ) -> Self {
        let waits = WaitSettings::default();
        Self {
            driver,
            site,
            credentials,
            artifacts,
            waits,
            dropdowns: DropdownSelector::standard(waits.option),
            dry_run: false,
        }
    }

    /// Override waits
    #[must_use]
    pub fn with_waits(mut self, waits: WaitSettings) -> Self {
        self.waits = waits;
        self.dropdowns = DropdownSelector::standard(waits.option);
        self
    }

    /// Replace the dropdown strategies
    #[must_use]
    pub fn with_dropdowns(mut self, dropdowns: DropdownSelector) -> Self {
        self.dropdowns = dropdowns;
        self
    }

    /// Stop before submitting
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run every step for `request`
    pub async fn run(&self, request: &BookingRequest) -> Result<BookingOutcome, StepFailure> {
        info!(
            date = %request.target_date(),
            time = request.time_label(),
            court_type = %request.court_type(),
            dry_run = self.dry_run,
            "starting booking"
        );
        self.step(BookingStep::Authenticate, self.authenticate())
            .await?;
        self.step(BookingStep::NavigateToDate, self.navigate(request))
            .await?;
        let slot = self
            .step(BookingStep::LocateSlot, self.locate_slot(request))
            .await?;
        let modal = self.step(BookingStep::OpenForm, self.open_form(&slot)).await?;

        let court_type = self
            .step(
                BookingStep::SelectCourtType,
                self.select_court_type(&modal, request.court_type().label()),
            )
            .await?;
        let duration = match &self.site.form.duration {
            Some(profile) => {
                self.step(
                    BookingStep::SelectDuration,
                    self.select_duration(&modal, profile, &request.duration_label()),
                )
                .await?
            }
            None => None,
        };
        let player = match request.additional_player() {
            Some(name) => Some(
                self.step(BookingStep::EnterPlayer, self.enter_player(&modal, name))
                    .await?,
            ),
            None => None,
        };
        let _ = self.artifacts.capture(self.driver, Checkpoint::FormFilled).await;

        let outcome = BookingOutcome {
            date: request.target_date(),
            time_label: slot.time_label.clone(),
            court: slot.court.clone(),
            court_type,
            duration,
            player,
            submitted: !self.dry_run,
        };
        if self.dry_run {
            info!("dry run: stopping before submission");
            return Ok(outcome);
        }
        self.step(BookingStep::Submit, self.submit(&modal)).await?;
        Ok(outcome)
    }

    async fn step<T>(
        &self,
        step: BookingStep,
        work: impl Future<Output = BookingResult<T>>,
    ) -> Result<T, StepFailure> {
        run_step(self.driver, self.artifacts, step, work).await
    }

    fn locator(&self) -> PageLocator<'a, D> {
        PageLocator::new(self.driver)
    }

    async fn authenticate(&self) -> BookingResult<()> {
        let login = &self.site.login;
        let driver = self.driver;
        let locator = &self.locator();

        driver.navigate(&login.url).await?;
        let username = locator.wait_for(&login.username, None, &self.waits.element).await?;
        let _ = self.artifacts.capture(driver, Checkpoint::LoginPage).await;

        driver.clear(&username).await?;
        driver.type_text(&username, &self.credentials.username).await?;
        let password = locator.locate(&login.password, None).await?;
        driver.clear(&password).await?;
        driver.type_text(&password, &self.credentials.password).await?;
        let submit = locator.locate(&login.submit, None).await?;
        driver.click(&submit).await?;

        poll_until(&self.waits.element, "post-login marker", move || async move {
            if let Some(fragment) = &login.success_url_fragment {
                if driver.current_url().await?.contains(fragment.as_str()) {
                    return Ok(Some(()));
                }
            }
            if !login.success_marker.is_empty()
                && locator.find(&login.success_marker, None).await?.is_some()
            {
                return Ok(Some(()));
            }
            Ok::<_, BookingError>(None)
        })
        .await
        .map_err(|e| match e {
            BookingError::Timeout { ms, .. } => BookingError::AuthenticationFailed {
                message: format!("post-login marker did not appear within {ms}ms"),
            },
            other => other,
        })?;

        let _ = self.artifacts.capture(driver, Checkpoint::AfterLogin).await;
        info!(username = %self.credentials.username, "authenticated");
        Ok(())
    }

    async fn navigate(&self, request: &BookingRequest) -> BookingResult<()> {
        open_schedule(
            self.driver,
            &self.site.schedule,
            request.target_date(),
            request.days_ahead(),
            &self.waits.element,
        )
        .await?;
        let _ = self.artifacts.capture(self.driver, Checkpoint::BookingPage).await;
        Ok(())
    }

    async fn locate_slot(&self, request: &BookingRequest) -> BookingResult<ScheduleSlot> {
        let grid = self.site.schedule.grid()?;
        let finder = SlotFinder::new(self.driver, &grid, request.target_date().to_string());
        let candidates = finder
            .find_candidates(request.time_label(), &self.site.schedule.preferred_courts)
            .await?;
        let slot = choose_bookable(candidates)?;
        info!(
            time = %slot.time_label,
            court = ?slot.court,
            availability = %slot.availability,
            "slot located"
        );
        Ok(slot)
    }

    async fn open_form(&self, slot: &ScheduleSlot) -> BookingResult<ElementHandle> {
        if let Err(e) = self.driver.call_on(&slot.handle, SCROLL_INTO_VIEW).await {
            debug!(error = %e, "could not scroll slot into view");
        }
        if let Err(e) = self.driver.click(&slot.handle).await {
            warn!(error = %e, "slot click failed, retrying with a script click");
            let _ = self.driver.call_on(&slot.handle, SCRIPT_CLICK).await?;
        }
        let modal = self
            .locator()
            .wait_for(&self.site.form.modal, None, &self.waits.element)
            .await?;
        let _ = self.artifacts.capture(self.driver, Checkpoint::BookingForm).await;
        Ok(modal)
    }

    /// Widget for `profile` inside the form, if one can be identified
    async fn resolve_dropdown(
        &self,
        modal: &ElementHandle,
        profile: &DropdownProfile,
    ) -> BookingResult<Option<DropdownWidget>> {
        let roots = self.locator().find_all(&profile.root, Some(modal)).await?;
        let mut chosen = profile.root_hint.as_deref().and_then(|hint| {
            roots
                .iter()
                .find(|r| r.text.to_lowercase().contains(&hint.to_lowercase()))
                .cloned()
        });
        if chosen.is_none() {
            if let Some(input) = &profile.backing_input {
                let backing = Selector::id(input.as_str());
                for root in &roots {
                    if !self.driver.query_all(&backing, Some(root)).await?.is_empty() {
                        chosen = Some(root.clone());
                        break;
                    }
                }
            }
        }
        if chosen.is_none() && profile.fallback_to_first {
            chosen = roots.first().cloned();
        }
        Ok(chosen.map(|root| DropdownWidget {
            root,
            display: profile.display.clone(),
            options: profile.options.clone(),
            focused_option: profile.focused_option.clone(),
            backing_input: profile.backing_input.clone(),
        }))
    }

    async fn select_court_type(
        &self,
        modal: &ElementHandle,
        label: &str,
    ) -> BookingResult<SelectionReport> {
        let profile = &self.site.form.court_type;
        let _ = self
            .locator()
            .wait_for(&profile.root, Some(modal), &self.waits.element)
            .await?;
        let widget = self
            .resolve_dropdown(modal, profile)
            .await?
            .ok_or_else(|| BookingError::ElementNotFound {
                selectors: profile.root.describe(),
            })?;
        self.dropdowns.select(self.driver, &widget, label).await
    }

    async fn select_duration(
        &self,
        modal: &ElementHandle,
        profile: &DropdownProfile,
        label: &str,
    ) -> BookingResult<Option<SelectionReport>> {
        match self.resolve_dropdown(modal, profile).await? {
            Some(widget) => Ok(Some(self.dropdowns.select(self.driver, &widget, label).await?)),
            None => {
                warn!(label, "no duration dropdown on the form, keeping its default");
                Ok(None)
            }
        }
    }

    async fn enter_player(&self, modal: &ElementHandle, name: &str) -> BookingResult<String> {
        let player = &self.site.form.player;
        let driver = self.driver;
        let locator = &self.locator();

        let input = locator
            .wait_for(&player.input, Some(modal), &self.waits.element)
            .await?;
        driver.clear(&input).await?;
        driver.type_text(&input, name).await?;

        let Some(suggestions) = &player.suggestions else {
            return Ok(name.to_string());
        };
        let wait = WaitOptions::from_millis(player.suggestion_timeout_ms)
            .with_poll_interval(self.waits.element.poll_interval);
        let found = poll_until(&wait, "player suggestion", move || async move {
            let items = locator.find_all(suggestions, None).await?;
            Ok::<_, BookingError>(items.into_iter().find(|item| labels_match(&item.text, name)))
        })
        .await;

        match found {
            Ok(item) => {
                driver.click(&item).await?;
                info!(player = %item.text, "companion player selected");
                Ok(item.text)
            }
            Err(BookingError::Timeout { .. }) => {
                let offered = locator
                    .find_all(suggestions, None)
                    .await?
                    .into_iter()
                    .map(|h| h.text)
                    .filter(|t| !t.is_empty())
                    .collect();
                Err(BookingError::PlayerNotFound {
                    name: name.to_string(),
                    suggestions: offered,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn submit(&self, modal: &ElementHandle) -> BookingResult<()> {
        let form = &self.site.form;
        let driver = self.driver;
        let locator = &self.locator();

        let button = locator
            .wait_for(&form.submit, Some(modal), &self.waits.element)
            .await?;
        driver.click(&button).await?;

        let outcome = poll_until(&self.waits.element, "submission outcome", move || async move {
            if let Some(banner) = locator.find(&form.error_banners, None).await? {
                let text = driver.text(&banner).await?;
                if !text.is_empty() {
                    return Ok(Some(Err(text)));
                }
            }
            if locator.find(&form.success_markers, None).await?.is_some() {
                return Ok(Some(Ok("success marker")));
            }
            if form.modal_closes_on_success && locator.find(&form.modal, None).await?.is_none() {
                return Ok(Some(Ok("modal closed")));
            }
            Ok::<_, BookingError>(None)
        })
        .await?;
        let _ = self.artifacts.capture(driver, Checkpoint::AfterSubmit).await;

        match outcome {
            Ok(signal) => {
                info!(signal, "booking submitted");
                Ok(())
            }
            Err(banner) => Err(BookingError::SubmissionRejected { banner }),
        }
    }
}
