//! CLI argument definitions for the NDOP publication.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "ndop",
    version,
    about = "National Data Opt-out monthly publication",
    long_about = "Build the National Data Opt-out monthly publication.\n\n\
                  Aggregates opt-out records over a rolling reporting period and writes\n\
                  the age/gender, registration and residence extracts, the summary\n\
                  workbook payload and a manifest of every output."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow NHS numbers and patient identifiers in trace output.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the publication for a reporting period and write its outputs.
    Run(RunArgs),

    /// Load the configured fallback mapping files and report integrity failures.
    CheckMappings(CheckMappingsArgs),

    /// Create the source tables in a SQLite database.
    InitDb(InitDbArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Reporting period end date, the first day of the latest month (YYYY-MM-DD).
    #[arg(long = "rped", value_name = "DATE")]
    pub rped: String,

    /// Publication date shown on the summary workbook (YYYY-MM-DD).
    #[arg(long = "pub-date", value_name = "DATE")]
    pub pub_date: String,

    /// Months in the reporting period, ending with the RPED month.
    #[arg(long = "months", value_name = "N", default_value_t = ndop_model::DEFAULT_REPORTING_MONTHS)]
    pub months: u32,

    /// Publication configuration file (TOML).
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SQLite database to read (overrides the configuration file).
    #[arg(long = "database", value_name = "FILE")]
    pub database: Option<PathBuf>,

    /// Output directory (overrides the configuration file).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Parser)]
pub struct CheckMappingsArgs {
    /// Publication configuration file (TOML).
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Parser)]
pub struct InitDbArgs {
    /// SQLite database to create or update.
    #[arg(long = "database", value_name = "FILE")]
    pub database: PathBuf,
}

/// CLI log level choices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
