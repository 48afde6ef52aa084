//! CLI argument definitions using clap

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// Longest accepted `--wait-timeout`, in seconds
pub const MAX_WAIT_SECS: u64 = 3_600;

/// Courtside: book the daily squash court slot on the club portal
#[derive(Parser, Debug)]
#[command(name = "courtside")]
#[command(author, version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, value_enum, default_value = "auto")]
    pub color: ColorArg,

    /// Log line format
    #[arg(long, value_enum, default_value = "pretty")]
    pub log_format: LogFormatArg,

    /// Summary format
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputArg,

    /// Book this many days after today
    #[arg(long, env = "INPUT_DAYS_AHEAD", default_value_t = 14)]
    pub days_ahead: u32,

    /// Slot start time as the schedule shows it
    #[arg(long = "time", default_value = "5:00 PM")]
    pub time: String,

    /// Seconds to wait for any element to appear (1 to 3600)
    #[arg(long, default_value_t = 45, value_parser = clap::value_parser!(u64).range(1..=MAX_WAIT_SECS))]
    pub wait_timeout: u64,

    /// Companion player; books Singles when set
    #[arg(long, env = "ESC_ADDITIONAL_PLAYER")]
    pub player: Option<String>,

    /// Book Solo Practice even if a player is configured
    #[arg(long)]
    pub no_player: bool,

    /// Your name as the schedule shows it on your bookings
    #[arg(long, env = "ESC_MEMBER_NAME")]
    pub member_name: Option<String>,

    /// Booking length in minutes
    #[arg(long, default_value_t = 45)]
    pub duration: u32,

    /// Site profile (YAML) overriding the built-in portal selectors
    #[arg(long, env = "COURTSIDE_PROFILE")]
    pub profile: Option<PathBuf>,

    /// Directory for checkpoint screenshots
    #[arg(long, default_value = ".")]
    pub artifacts_dir: PathBuf,

    /// Do not write screenshots
    #[arg(long)]
    pub no_artifacts: bool,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Chromium executable (auto-detected when unset)
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium_path: Option<String>,

    /// Fill the form but do not submit
    #[arg(long)]
    pub dry_run: bool,

    /// Portal username
    #[arg(long, env = "ESC_USERNAME", hide_env_values = true)]
    pub username: Option<String>,

    /// Portal password
    #[arg(long, env = "ESC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Detect terminal
    #[default]
    Auto,
    /// Always color
    Always,
    /// Never color
    Never,
}

/// Log format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Summary format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputArg {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON document on stdout
    Json,
}
