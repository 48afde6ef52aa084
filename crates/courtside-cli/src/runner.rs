//! Runs one booking inside a browser session

use courtside::{ArtifactSink, BookingWorkflow, PortalDriver, WorkflowReport};
use tracing::info;

use crate::config::RunConfig;
use crate::error::CliResult;

/// Launch Chromium, book, and close the browser on every path
#[cfg(feature = "browser")]
pub async fn run(config: &RunConfig) -> CliResult<WorkflowReport> {
    let session = courtside::BrowserSession::launch(&config.browser).await?;
    let result = execute(session.driver(), config).await;
    session.close().await;
    result
}

/// Without the `browser` feature there is nothing to drive
#[cfg(not(feature = "browser"))]
pub async fn run(_config: &RunConfig) -> CliResult<WorkflowReport> {
    Err(crate::error::CliError::config(
        "built without the `browser` feature; rebuild with --features browser",
    ))
}

/// Run the workflow on an already-open driver
pub async fn execute<D: PortalDriver>(driver: &D, config: &RunConfig) -> CliResult<WorkflowReport> {
    let artifacts = match &config.artifacts_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir).await?;
            ArtifactSink::new(dir)
        }
        None => ArtifactSink::disabled(),
    };
    info!(
        profile = %config.site.name,
        date = %config.request.target_date(),
        time = config.request.time_label(),
        "booking run started"
    );
    let report = BookingWorkflow::new(driver, &config.site, &config.credentials, &artifacts)
        .with_waits(config.waits)
        .dry_run(config.dry_run)
        .run(&config.request)
        .await?;
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use chrono::NaiveDate;
    use courtside::{
        BookingRequest, BookingStep, BrowserConfig, Credentials, FailureKind, MockDriver,
        SiteProfile, WaitSettings,
    };
    use std::time::Duration;

    fn config(artifacts_dir: Option<std::path::PathBuf>) -> RunConfig {
        RunConfig {
            request: BookingRequest::new(
                NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
                14,
                "5:00 PM",
                None,
                45,
            )
            .unwrap(),
            credentials: Credentials::new("me", "pw"),
            site: SiteProfile::default(),
            browser: BrowserConfig::default(),
            waits: WaitSettings::with_timeout(Duration::from_millis(500)),
            artifacts_dir,
            dry_run: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_portal_fails_authentication_step() {
        let driver = MockDriver::new();
        let err = execute(&driver, &config(None)).await.unwrap_err();
        assert_eq!(err.step(), Some(BookingStep::Authenticate));
        assert_eq!(err.kind(), FailureKind::ElementNotFound);
        assert!(matches!(err, CliError::Step(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_creates_artifacts_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("shots");
        let driver = MockDriver::new();
        let _ = execute(&driver, &config(Some(nested.clone()))).await;
        assert!(nested.is_dir());
        assert!(nested.join("failure.png").exists());
    }
}
