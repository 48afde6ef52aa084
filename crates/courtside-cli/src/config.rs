//! Run configuration
//!
//! Precedence is flag, then environment (both resolved by clap), then the
//! site profile file, then built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use courtside::{BookingRequest, BrowserConfig, Credentials, SiteProfile, WaitSettings};
use serde::{Deserialize, Serialize};

use crate::commands::{Cli, ColorArg};
use crate::error::{CliError, CliResult};

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Warnings and errors only
    Quiet,
    /// Step progress
    #[default]
    Normal,
    /// Selector and strategy detail
    Verbose,
    /// Everything, including driver calls
    Debug,
}

impl Verbosity {
    /// From `-q` and the `-v` count
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Level for this workspace's crates
    #[must_use]
    pub const fn level(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Verbose => "debug",
            Self::Debug => "trace",
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => console::Term::stdout().features().colors_supported(),
        }
    }
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Everything one booking run needs
#[derive(Debug)]
pub struct RunConfig {
    pub request: BookingRequest,
    pub credentials: Credentials,
    pub site: SiteProfile,
    pub browser: BrowserConfig,
    pub waits: WaitSettings,
    /// `None` disables screenshots
    pub artifacts_dir: Option<PathBuf>,
    pub dry_run: bool,
}

impl RunConfig {
    /// Resolve the run from parsed arguments, booking relative to `today`
    pub fn from_cli(cli: &Cli, today: NaiveDate) -> CliResult<Self> {
        let credentials = credentials(cli)?;

        let mut site = match &cli.profile {
            Some(path) => SiteProfile::load(path).map_err(|e| CliError::config(e.to_string()))?,
            None => SiteProfile::default(),
        };
        if let Some(name) = cli.member_name.as_deref().filter(|n| !n.trim().is_empty()) {
            site.verification.member_name = Some(name.trim().to_string());
        }

        let player = if cli.no_player {
            None
        } else {
            cli.player.clone()
        };
        let request = BookingRequest::new(today, cli.days_ahead, &cli.time, player, cli.duration)
            .map_err(|e| CliError::config(e.to_string()))?;

        let mut browser = BrowserConfig::default().with_headless(!cli.headed);
        if let Some(path) = &cli.chromium_path {
            browser = browser.with_chromium_path(path.as_str());
        }

        Ok(Self {
            request,
            credentials,
            site,
            browser,
            waits: WaitSettings::with_timeout(Duration::from_secs(cli.wait_timeout)),
            artifacts_dir: (!cli.no_artifacts).then(|| cli.artifacts_dir.clone()),
            dry_run: cli.dry_run,
        })
    }
}

fn credentials(cli: &Cli) -> CliResult<Credentials> {
    let present = |value: &Option<String>| value.as_deref().filter(|v| !v.is_empty()).map(String::from);
    let username = present(&cli.username).ok_or(CliError::MissingCredential {
        variable: "ESC_USERNAME",
        flag: "username",
    })?;
    let password = present(&cli.password).ok_or(CliError::MissingCredential {
        variable: "ESC_PASSWORD",
        flag: "password",
    })?;
    Ok(Credentials::new(username, password))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::Parser;
    use courtside::CourtType;

    fn cli(args: &[&str]) -> Cli {
        let base = ["courtside", "--username", "me@club.test", "--password", "pw"];
        Cli::try_parse_from(base.iter().chain(args.iter()).copied()).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_quiet_wins() {
            assert_eq!(Verbosity::from_flags(true, 2), Verbosity::Quiet);
            assert!(Verbosity::from_flags(true, 0).is_quiet());
        }

        #[test]
        fn test_levels() {
            assert_eq!(Verbosity::from_flags(false, 0).level(), "info");
            assert_eq!(Verbosity::from_flags(false, 1).level(), "debug");
            assert_eq!(Verbosity::from_flags(false, 5).level(), "trace");
        }

        #[test]
        fn test_color_choice() {
            assert!(ColorChoice::from(ColorArg::Always).should_color());
            assert!(!ColorChoice::from(ColorArg::Never).should_color());
        }
    }

    mod run_config_tests {
        use super::*;

        #[test]
        fn test_player_selects_singles() {
            let config = RunConfig::from_cli(&cli(&["--player", "Jane Doe"]), today()).unwrap();
            assert_eq!(config.request.court_type(), CourtType::Singles);
            assert_eq!(
                config.request.target_date(),
                NaiveDate::from_ymd_opt(2026, 10, 29).unwrap()
            );
            assert_eq!(config.waits.element.timeout_ms(), 45_000);
            assert_eq!(config.artifacts_dir, Some(PathBuf::from(".")));
        }

        #[test]
        fn test_no_player_overrides_player() {
            let config =
                RunConfig::from_cli(&cli(&["--player", "Jane Doe", "--no-player"]), today())
                    .unwrap();
            assert_eq!(config.request.court_type(), CourtType::SoloPractice);
            assert!(config.request.additional_player().is_none());
        }

        #[test]
        fn test_bad_time_is_config_error() {
            let err = RunConfig::from_cli(&cli(&["--time", "teatime"]), today()).unwrap_err();
            assert!(matches!(err, CliError::Config { .. }));
        }

        #[test]
        fn test_headed_and_no_artifacts() {
            let config =
                RunConfig::from_cli(&cli(&["--headed", "--no-artifacts", "--dry-run"]), today())
                    .unwrap();
            assert!(!config.browser.headless);
            assert!(config.artifacts_dir.is_none());
            assert!(config.dry_run);
        }

        #[test]
        fn test_profile_file_overrides_site() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("club.yaml");
            std::fs::write(
                &path,
                "schedule:\n  preferred_courts: [\"Court 2\"]\n",
            )
            .unwrap();
            let config =
                RunConfig::from_cli(&cli(&["--profile", path.to_str().unwrap()]), today()).unwrap();
            assert_eq!(config.site.schedule.preferred_courts, vec!["Court 2".to_string()]);
        }

        #[test]
        fn test_member_name_overrides_profile() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("club.yaml");
            std::fs::write(&path, "verification:\n  member_name: Old Name\n").unwrap();
            let profile = path.to_str().unwrap();

            let kept = RunConfig::from_cli(&cli(&["--profile", profile]), today()).unwrap();
            assert_eq!(kept.site.verification.member_name.as_deref(), Some("Old Name"));

            let overridden = RunConfig::from_cli(
                &cli(&["--profile", profile, "--member-name", " Sam Member "]),
                today(),
            )
            .unwrap();
            assert_eq!(
                overridden.site.verification.member_name.as_deref(),
                Some("Sam Member")
            );
        }

        #[test]
        fn test_missing_password() {
            let parsed = Cli::try_parse_from(["courtside", "--username", "me", "--password", ""])
                .unwrap();
            let err = RunConfig::from_cli(&parsed, today()).unwrap_err();
            assert!(matches!(
                err,
                CliError::MissingCredential {
                    variable: "ESC_PASSWORD",
                    ..
                }
            ));
        }
    }
}
