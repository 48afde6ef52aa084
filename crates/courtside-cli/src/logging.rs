//! tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::commands::LogFormatArg;
use crate::config::Verbosity;

/// Filter directive for `verbosity`; other crates stay at `warn`
#[must_use]
pub fn default_directive(verbosity: Verbosity) -> String {
    let level = verbosity.level();
    format!("warn,courtside={level},courtside_cli={level}")
}

/// Install the global subscriber. `RUST_LOG` overrides the verbosity flags.
///
/// Logs go to stderr so the summary on stdout stays machine-readable.
pub fn init(verbosity: Verbosity, format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = match format {
        LogFormatArg::Pretty => builder.try_init(),
        LogFormatArg::Json => builder.json().try_init(),
    };
    if let Err(e) = installed {
        eprintln!("warning: logging not initialized: {e}");
    }
}
