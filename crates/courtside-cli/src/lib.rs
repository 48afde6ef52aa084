//! Courtside CLI library
//!
//! Argument parsing, configuration, logging and reporting for the
//! `courtside` binary.

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
pub mod runner;

pub use commands::{Cli, ColorArg, LogFormatArg, OutputArg};
pub use config::{ColorChoice, RunConfig, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{Reporter, Summary};
