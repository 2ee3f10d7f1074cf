//! Output formatting module.
//!
//! Results are first folded into a [`ScanReport`] (sorted, filtered and
//! annotated according to [`RenderOptions`]) and then written as plain text
//! or JSON. Rendering never aborts a run: write failures are logged.

mod json_format;
mod plain;

pub use json_format::render_json;
pub use plain::{
    messages_to_stderr, print_detail, print_error, print_info, print_scan_header, print_success,
    print_warning, render_plain, set_messages_to_stderr,
};

use crate::cli::OutputFormat;
use crate::scanner::{PortState, ResultSet, ScanBackend};
use crate::services;
use crate::types::{Port, ScanTarget};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};

/// What the formatter should include.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Annotate open ports with their well-known service name.
    pub service_names: bool,
    /// List closed and filtered ports too.
    pub show_closed: bool,
    /// Report filtered ports as closed.
    pub collapse_filtered: bool,
}

/// One rendered port line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortEntry {
    pub port: Port,
    pub state: PortState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// Everything the renderers need about a finished scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub target: String,
    pub ip_address: String,
    pub backend: String,
    pub port_range: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub ports_scanned: usize,
    pub open_ports: usize,
    pub closed_ports: usize,
    pub filtered_ports: usize,
    pub results: Vec<PortEntry>,
}

impl ScanReport {
    /// Build a report from a frozen result set.
    pub fn build(
        target: &ScanTarget,
        backend: ScanBackend,
        results: &ResultSet,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        options: &RenderOptions,
    ) -> Self {
        let state_of = |state: PortState| match state {
            PortState::Filtered if options.collapse_filtered => PortState::Closed,
            other => other,
        };

        let mut open_ports = 0;
        let mut closed_ports = 0;
        let mut filtered_ports = 0;
        let mut entries = Vec::new();

        // ResultSet iterates in ascending port order
        for outcome in results.iter() {
            let state = state_of(outcome.state);
            match state {
                PortState::Open => open_ports += 1,
                PortState::Closed => closed_ports += 1,
                PortState::Filtered => filtered_ports += 1,
            }

            if !state.is_open() && !options.show_closed {
                continue;
            }

            let service = (options.service_names && state.is_open()).then(|| {
                services::tcp_service_description(outcome.port.as_u16()).to_string()
            });
            entries.push(PortEntry {
                port: outcome.port,
                state,
                service,
            });
        }

        let duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;

        Self {
            target: target.address.clone(),
            ip_address: target.ip.to_string(),
            backend: backend.to_string(),
            port_range: target.ports.to_string(),
            started_at,
            completed_at,
            duration_ms,
            ports_scanned: results.len(),
            open_ports,
            closed_ports,
            filtered_ports,
            results: entries,
        }
    }
}

/// Write the report in `format` to `out`.
pub fn render<W: Write>(report: &ScanReport, format: OutputFormat, out: &mut W) -> io::Result<()> {
    match format {
        OutputFormat::Plain => render_plain(report, out),
        OutputFormat::Json => render_json(report, out),
    }
}

/// Print the report to standard output. Failures are logged, not returned.
pub fn print_results(report: &ScanReport, format: OutputFormat) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = render(report, format, &mut out).and_then(|_| out.flush()) {
        tracing::warn!(error = %e, "failed to write scan results");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::ProbeOutcome;
    use std::net::{IpAddr, Ipv4Addr};

    pub(super) fn sample_report(options: &RenderOptions) -> ScanReport {
        let target = ScanTarget::new(
            "127.0.0.1",
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            "20-25".parse().unwrap(),
        );
        let results: ResultSet = [
            (25, PortState::Closed),
            (22, PortState::Open),
            (20, PortState::Closed),
            (21, PortState::Filtered),
            (23, PortState::Closed),
            (24, PortState::Closed),
        ]
        .into_iter()
        .map(|(p, s)| ProbeOutcome::new(Port::new(p).unwrap(), s))
        .collect();

        let now = Utc::now();
        ScanReport::build(&target, ScanBackend::Connect, &results, now, now, options)
    }

    #[test]
    fn test_report_only_open_by_default() {
        let report = sample_report(&RenderOptions::default());
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].port.as_u16(), 22);
        assert_eq!(report.results[0].service, None);
        assert_eq!(report.ports_scanned, 6);
        assert_eq!((report.open_ports, report.closed_ports, report.filtered_ports), (1, 4, 1));
    }

    #[test]
    fn test_report_show_closed_is_ascending() {
        let options = RenderOptions {
            show_closed: true,
            ..Default::default()
        };
        let report = sample_report(&options);
        let ports: Vec<u16> = report.results.iter().map(|e| e.port.as_u16()).collect();
        assert_eq!(ports, vec![20, 21, 22, 23, 24, 25]);
        assert_eq!(report.results[1].state, PortState::Filtered);
    }

    #[test]
    fn test_report_collapse_filtered() {
        let options = RenderOptions {
            show_closed: true,
            collapse_filtered: true,
            ..Default::default()
        };
        let report = sample_report(&options);
        assert_eq!(report.filtered_ports, 0);
        assert_eq!(report.closed_ports, 5);
        assert_eq!(report.results[1].state, PortState::Closed);
    }

    #[test]
    fn test_report_service_names() {
        let options = RenderOptions {
            service_names: true,
            show_closed: true,
            ..Default::default()
        };
        let report = sample_report(&options);
        let open = report.results.iter().find(|e| e.state.is_open()).unwrap();
        assert_eq!(open.service.as_deref(), Some("ssh"));
        // Only open ports are annotated
        assert!(report
            .results
            .iter()
            .filter(|e| !e.state.is_open())
            .all(|e| e.service.is_none()));
    }
}
