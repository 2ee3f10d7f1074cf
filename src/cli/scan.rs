//! Scan command implementation.
//!
//! Parses the port range and target, runs the selected backend, prints the
//! results and then hands open ports to the service enumerators.

use super::{Keyword, OutputFormat};
use crate::config::AppSettings;
use crate::enumerate::{default_enumerators, run_enumerators, sync_time, EnumContext};
use crate::error::{CliError, CliResult, ScanError};
use crate::output::{self, RenderOptions, ScanReport};
use crate::scanner::nmap::{is_root, os_fingerprint};
use crate::scanner::{create_scanner, ScanBackend, ScanConfig};
use crate::types::{PortRange, ScanTarget};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Scan a target for open ports.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Target IP address or hostname
    #[arg(value_name = "ADDRESS")]
    pub address: String,

    /// Ports to scan: "all", a range like "1-1024", or a single port
    #[arg(value_name = "PORTS")]
    pub ports: String,

    /// Bare keywords: service, dump, os, ntp (help prints this message)
    #[arg(value_enum, value_name = "KEYWORDS", hide_possible_values = true)]
    pub keywords: Vec<Keyword>,

    /// Show the well-known service name of each open port
    #[arg(short = 's', long)]
    pub service: bool,

    /// Download FTP and SMB content where access allows
    #[arg(short = 'd', long)]
    pub dump: bool,

    /// Run nmap OS detection after the scan (needs root)
    #[arg(long)]
    pub os: bool,

    /// Synchronize the local clock with the target's NTP server
    #[arg(long)]
    pub ntp: bool,

    /// Scanning backend
    #[arg(long, value_enum, default_value_t = ScanBackend::Connect)]
    pub backend: ScanBackend,

    /// Connection timeout in milliseconds
    #[arg(short = 't', long, env = "OSCAN_TIMEOUT_MS", value_name = "MS")]
    pub timeout: Option<u64>,

    /// Upper bound on concurrent probes (never above the descriptor limit)
    #[arg(short = 'c', long, env = "OSCAN_CONCURRENCY", value_name = "N")]
    pub concurrency: Option<usize>,

    /// Retries after running out of file descriptors
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Probe starts per second (0 = unlimited)
    #[arg(long = "rate", value_name = "N", default_value = "0")]
    pub rate_limit: u32,

    /// Abort the scan after this many seconds
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Output format for results
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// List closed and filtered ports too
    #[arg(long)]
    pub show_closed: bool,

    /// Report filtered ports as closed
    #[arg(long)]
    pub no_filtered: bool,

    /// Skip FTP, SMB and HTTP enumeration of open ports
    #[arg(long)]
    pub no_enum: bool,

    /// Directory that receives ftp_dump/ and smb_dump/
    #[arg(long, value_name = "DIR")]
    pub dump_dir: Option<PathBuf>,
}

impl ScanCommand {
    /// Whether `keyword` was requested either as a flag or as a bare word.
    pub fn wants(&self, keyword: Keyword) -> bool {
        let flag = match keyword {
            Keyword::Service => self.service,
            Keyword::Dump => self.dump,
            Keyword::Os => self.os,
            Keyword::Ntp => self.ntp,
        };
        flag || self.keywords.contains(&keyword)
    }

    /// Merge flags over `settings` into a scanner configuration.
    pub fn scan_config(&self, settings: &AppSettings, verbose: bool) -> CliResult<ScanConfig> {
        if self.concurrency == Some(0) {
            return Err(ScanError::InvalidConfig("concurrency must be at least 1".to_string()).into());
        }

        let timeout_ms = self.timeout.unwrap_or(settings.timeout_ms);
        if timeout_ms == 0 {
            return Err(ScanError::InvalidConfig("timeout must be at least 1 ms".to_string()).into());
        }

        let mut config = ScanConfig::default()
            .with_timeout(Duration::from_millis(timeout_ms))
            .with_max_retries(self.retries.unwrap_or(settings.max_retries))
            .with_fallback_concurrency(settings.fallback_concurrency)
            .with_concurrency_cap(self.concurrency)
            .with_rate_limit(self.rate_limit)
            .with_deadline(self.deadline.map(Duration::from_secs));

        if verbose {
            config = config.with_progress();
        }
        Ok(config)
    }

    /// The `--output` flag, else the settings file, else plain.
    pub fn output_format(&self, settings: &AppSettings) -> CliResult<OutputFormat> {
        if let Some(format) = self.output {
            return Ok(format);
        }
        OutputFormat::from_str(&settings.output_format, true).map_err(|_| {
            CliError::Other(format!(
                "unknown output format '{}' in settings",
                settings.output_format
            ))
        })
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            service_names: self.wants(Keyword::Service),
            show_closed: self.show_closed,
            collapse_filtered: self.no_filtered,
        }
    }

    /// Execute the scan command.
    pub async fn execute(&self, settings: &AppSettings, verbose: bool, quiet: bool) -> CliResult<()> {
        // Everything that can be wrong with the input fails before any probe
        let ports: PortRange = self.ports.parse()?;
        let format = self.output_format(settings)?;
        // Enumerator and OS lines must not interleave with a JSON report
        output::set_messages_to_stderr(format.is_machine_readable());
        let config = self.scan_config(settings, verbose && !quiet)?;
        let target = ScanTarget::resolve(&self.address, ports).await?;
        let timeout = config.timeout;

        let scanner = create_scanner(self.backend, config)?;
        if scanner.requires_privileges() && !is_root() {
            output::print_warning(&format!(
                "{} backend requires root privileges; results may be incomplete.",
                self.backend
            ));
        }

        let plain = !quiet && format == OutputFormat::Plain;
        if plain {
            output::print_scan_header(
                &target.address,
                &target.ip.to_string(),
                &scanner.backend().to_string(),
                target.ports.len(),
            );
        }

        let started_at = Utc::now();
        let results = scanner.scan(&target).await?;
        let completed_at = Utc::now();

        let report = ScanReport::build(
            &target,
            scanner.backend(),
            &results,
            started_at,
            completed_at,
            &self.render_options(),
        );
        output::print_results(&report, format);

        if !self.no_enum {
            let ctx = EnumContext {
                address: target.address.clone(),
                ip: target.ip,
                dump: self.wants(Keyword::Dump),
                dump_root: self.dump_dir.clone().unwrap_or_else(|| settings.dump_dir.clone()),
                timeout: timeout.max(Duration::from_secs(3)),
            };
            run_enumerators(&results, &ctx, &default_enumerators()).await;
        }

        if self.wants(Keyword::Os) {
            self.detect_os(&target).await;
        }

        if self.wants(Keyword::Ntp) {
            if let Err(e) = sync_time(&target.ip.to_string()).await {
                output::print_warning(&format!("Time synchronization failed: {}", e));
            }
        }

        Ok(())
    }

    async fn detect_os(&self, target: &ScanTarget) {
        if !is_root() {
            output::print_warning("OS detection requires root privileges.");
        }

        match os_fingerprint(&target.ip.to_string()).await {
            Ok(Some(os)) => output::print_success(&format!("OS: {}", os)),
            Ok(None) => output::print_info("Could not determine the operating system"),
            Err(e) => output::print_warning(&format!("OS detection failed: {}", e)),
        }
    }
}
