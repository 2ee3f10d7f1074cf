//! Command-line interface definitions.
//!
//! `oscan <ADDRESS> <PORTS> [KEYWORDS...] [FLAGS]`. The bare keywords
//! `service`, `dump`, `os` and `ntp` are accepted after the port range and
//! behave exactly like the matching flags.

mod scan;

pub use scan::ScanCommand;

use crate::config::AppSettings;
use crate::error::CliResult;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// oscan - a fast TCP connect port scanner with service follow-ups.
///
/// Scans a single host over a contiguous port range, sized to the process
/// file descriptor limit, then optionally probes FTP, SMB and HTTP on the
/// ports it found open.
#[derive(Parser, Debug)]
#[command(name = "oscan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A fast TCP connect port scanner", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub scan: ScanCommand,

    /// Enable verbose output and a progress bar
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a settings file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Settings from `--config`, or from the default location.
    pub fn settings(&self) -> CliResult<AppSettings> {
        let settings = match &self.config {
            Some(path) => AppSettings::load_from(path)?,
            None => AppSettings::load()?,
        };
        Ok(settings)
    }

    /// Run the scan and its follow-ups.
    pub async fn execute(&self) -> CliResult<()> {
        let settings = self.settings()?;
        self.scan.execute(&settings, self.verbose, self.quiet).await
    }
}

/// Turn a bare `help` anywhere after the program name into `--help`, so it
/// prints usage and exits without scanning.
pub fn expand_help_keyword<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            let arg = arg.into();
            if i > 0 && arg == "help" {
                OsString::from("--help")
            } else {
                arg
            }
        })
        .collect()
}

/// Trailing keywords accepted in place of flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Keyword {
    /// Same as --service
    Service,
    /// Same as --dump
    Dump,
    /// Same as --os
    Os,
    /// Same as --ntp
    Ntp,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
}

impl OutputFormat {
    /// Whether stdout must carry nothing but the report.
    pub fn is_machine_readable(self) -> bool {
        matches!(self, Self::Json)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
        }
    }
}
