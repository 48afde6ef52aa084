//! End-to-end booking: fill and submit the form, then verify.

use serde::Serialize;
use tracing::info;

use crate::artifacts::{ArtifactSink, Checkpoint};
use crate::driver::PortalDriver;
use crate::dropdown::DropdownSelector;
use crate::form::{run_step, BookingFormFiller, BookingOutcome, WaitSettings};
use crate::request::{BookingRequest, Credentials};
use crate::result::{BookingError, BookingStep, StepFailure};
use crate::site::SiteProfile;
use crate::verify::{BookingVerifier, VerificationOutcome};

/// Final report of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub booking: BookingOutcome,
    /// `None` for dry runs
    pub verification: Option<VerificationOutcome>,
}

/// Runs [`BookingFormFiller`] then [`BookingVerifier`] on one driver
#[derive(Debug)]
pub struct BookingWorkflow<'a, D> {
    driver: &'a D,
    site: &'a SiteProfile,
    credentials: &'a Credentials,
    artifacts: &'a ArtifactSink,
    waits: WaitSettings,
    dropdowns: Option<DropdownSelector>,
    dry_run: bool,
}

impl<'a, D: PortalDriver> BookingWorkflow<'a, D> {
    #[must_use]
    pub fn new(
        driver: &'a D,
        site: &'a SiteProfile,
        credentials: &'a Credentials,
        artifacts: &'a ArtifactSink,
    ) -> Self {
        Self {
            driver,
            site,
            credentials,
            artifacts,
            waits: WaitSettings::default(),
            dropdowns: None,
            dry_run: false,
        }
    }

    #[must_use]
    pub fn with_waits(mut self, waits: WaitSettings) -> Self {
        self.waits = waits;
        self
    }

    #[must_use]
    pub fn with_dropdowns(mut self, dropdowns: DropdownSelector) -> Self {
        self.dropdowns = Some(dropdowns);
        self
    }

    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Book and verify.
    ///
    /// A verification that misses any indicator fails the `verify` step with
    /// `VerificationIncomplete`, listing what was found and what was not.
    pub async fn run(self, request: &BookingRequest) -> Result<WorkflowReport, StepFailure> {
        let mut filler = BookingFormFiller::new(self.driver, self.site, self.credentials, self.artifacts)
            .with_waits(self.waits)
            .dry_run(self.dry_run);
        if let Some(dropdowns) = self.dropdowns {
            filler = filler.with_dropdowns(dropdowns);
        }
        let booking = filler.run(request).await?;
        if self.dry_run {
            return Ok(WorkflowReport {
                booking,
                verification: None,
            });
        }

        let verifier = BookingVerifier::new(
            self.driver,
            self.site,
            self.artifacts,
            &self.credentials.username,
        )
        .with_wait(self.waits.element);
        let verification = run_step(
            self.driver,
            self.artifacts,
            BookingStep::Verify,
            verifier.verify(request, booking.court.as_deref()),
        )
        .await?;

        if !verification.all_required_present {
            return Err(StepFailure {
                step: BookingStep::Verify,
                error: BookingError::VerificationIncomplete {
                    found: verification.found,
                    missing: verification.missing,
                },
                artifact: self.artifacts.path_of(Checkpoint::Verification),
            });
        }
        info!(date = %booking.date, time = %booking.time_label, "booking complete");
        Ok(WorkflowReport {
            booking,
            verification: Some(verification),
        })
    }
}
