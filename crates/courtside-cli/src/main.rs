//! Courtside CLI: book the squash court slot N days ahead
//!
//! ## Usage
//!
//! ```bash
//! ESC_USERNAME=... ESC_PASSWORD=... courtside                 # 5:00 PM, 14 days out
//! courtside --days-ahead 7 --time "6:15 PM" --player "Jane Doe"
//! courtside --dry-run --headed -v                             # watch it fill the form
//! ```

use clap::Parser;
use courtside_cli::{logging, runner, Cli, CliResult, ColorChoice, Reporter, RunConfig, Verbosity};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    logging::init(verbosity, cli.log_format);
    let reporter = Reporter::new(
        cli.output,
        ColorChoice::from(cli.color).should_color(),
        verbosity.is_quiet(),
    );

    match run(&cli).await {
        Ok(report) => {
            reporter.success(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(kind = %e.kind(), step = ?e.step(), error = %e, "booking failed");
            reporter.failure(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: &Cli) -> CliResult<courtside::WorkflowReport> {
    let today = chrono::Local::now().date_naive();
    let config = RunConfig::from_cli(cli, today)?;
    runner::run(&config).await
}
