//! Debug screenshots captured at fixed checkpoints.
//!
//! Capturing never fails a booking: problems are logged and the run goes on.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use crate::driver::PortalDriver;

/// Point in the flow where a screenshot is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Checkpoint {
    LoginPage,
    AfterLogin,
    BookingPage,
    BookingForm,
    FormFilled,
    AfterSubmit,
    Verification,
    Failure,
}

impl Checkpoint {
    /// Fixed file name of the screenshot
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::LoginPage => "login_page.png",
            Self::AfterLogin => "after_login.png",
            Self::BookingPage => "booking_page.png",
            Self::BookingForm => "booking_form.png",
            Self::FormFilled => "form_filled.png",
            Self::AfterSubmit => "after_submit.png",
            Self::Verification => "verification.png",
            Self::Failure => "failure.png",
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Writes checkpoint screenshots into one directory
#[derive(Debug, Default)]
pub struct ArtifactSink {
    dir: Option<PathBuf>,
    captured: Mutex<Vec<(Checkpoint, PathBuf)>>,
}

impl ArtifactSink {
    /// Write screenshots into `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            captured: Mutex::new(Vec::new()),
        }
    }

    /// Take no screenshots
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Target directory, if enabled
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Capture a screenshot; returns the written path
    pub async fn capture<D: PortalDriver + ?Sized>(
        &self,
        driver: &D,
        checkpoint: Checkpoint,
    ) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let bytes = match driver.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%checkpoint, error = %e, "screenshot failed");
                return None;
            }
        };
        let path = dir.join(checkpoint.file_name());
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            warn!(path = %path.display(), error = %e, "could not write screenshot");
            return None;
        }
        debug!(path = %path.display(), bytes = bytes.len(), "screenshot saved");
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((checkpoint, path.clone()));
        Some(path)
    }

    /// Checkpoints captured so far, in order
    #[must_use]
    pub fn captured(&self) -> Vec<Checkpoint> {
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(c, _)| *c)
            .collect()
    }

    /// Path of a captured checkpoint
    #[must_use]
    pub fn path_of(&self, checkpoint: Checkpoint) -> Option<PathBuf> {
        self.captured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|(c, _)| *c == checkpoint)
            .map(|(_, p)| p.clone())
    }
}
