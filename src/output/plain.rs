//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use super::ScanReport;
use crate::scanner::PortState;
use console::{style, Style};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

/// Write one line per reported port, then a summary.
pub fn render_plain<W: Write>(report: &ScanReport, out: &mut W) -> io::Result<()> {
    if report.results.is_empty() {
        writeln!(out, "{}", style("No open ports found.").dim())?;
    }

    for entry in &report.results {
        let (marker, marker_style) = match entry.state {
            PortState::Open => ("[∮]", Style::new().green().bold()),
            PortState::Closed => ("[-]", Style::new().red()),
            PortState::Filtered => ("[?]", Style::new().yellow()),
        };

        write!(out, "{} {} {}", marker_style.apply_to(marker), entry.state, entry.port)?;
        match &entry.service {
            Some(service) => writeln!(out, " - {}", service)?,
            None => writeln!(out)?,
        }
    }

    writeln!(out)?;
    writeln!(
        out,
        "{} {} ports scanned in {:.2}s: {} open, {} closed, {} filtered",
        style("Statistics:").bold(),
        report.ports_scanned,
        report.duration_ms as f64 / 1000.0,
        style(report.open_ports).green().bold(),
        style(report.closed_ports).red(),
        style(report.filtered_ports).yellow()
    )?;

    Ok(())
}

/// Print a scan header before scanning begins.
pub fn print_scan_header(target: &str, ip: &str, backend: &str, ports: usize) {
    println!();
    println!("ʕ •ᴥ•ʔ {} v{}", style("oscan").cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("{} Backend: {}", style("•").dim(), style(backend).yellow());
    println!(
        "{} Target: {} ({})",
        style("•").dim(),
        style(target).white().bold(),
        ip
    );
    println!(
        "{} Scanning {} ports...",
        style("•").dim(),
        style(ports).white().bold()
    );
    println!();
}

/// Set while stdout carries a machine-readable report. Status lines then
/// go to stderr so the report stays parseable.
static MESSAGES_TO_STDERR: AtomicBool = AtomicBool::new(false);

/// Route success and info lines to stderr (`true`) or stdout (`false`).
pub fn set_messages_to_stderr(enabled: bool) {
    MESSAGES_TO_STDERR.store(enabled, Ordering::Relaxed);
}

pub fn messages_to_stderr() -> bool {
    MESSAGES_TO_STDERR.load(Ordering::Relaxed)
}

fn print_message(line: impl std::fmt::Display) {
    if messages_to_stderr() {
        eprintln!("{}", line);
    } else {
        println!("{}", line);
    }
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("[!]").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("[!]").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    print_message(format_args!("{} {}", style("[*]").green().bold(), msg));
}

/// Print an info message.
pub fn print_info(msg: &str) {
    print_message(format_args!("{} {}", style("[*]").blue().bold(), msg));
}

/// Print an indented detail line under a previous message.
pub fn print_detail(msg: &str) {
    print_message(format_args!("    {}", msg));
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_report;
    use super::super::RenderOptions;
    use super::*;

    fn rendered(options: RenderOptions) -> String {
        console::set_colors_enabled(false);
        let report = sample_report(&options);
        let mut buf = Vec::new();
        render_plain(&report, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_open_ports_only() {
        let text = rendered(RenderOptions::default());
        assert!(text.starts_with("[∮] open 22\n"));
        assert!(!text.contains("closed 23"));
        assert!(text.contains("6 ports scanned"));
    }

    #[test]
    fn test_service_names() {
        let text = rendered(RenderOptions {
            service_names: true,
            ..Default::default()
        });
        assert!(text.starts_with("[∮] open 22 - ssh\n"));
    }

    #[test]
    fn test_show_closed_in_order() {
        let text = rendered(RenderOptions {
            show_closed: true,
            ..Default::default()
        });
        let lines: Vec<&str> = text.lines().take(6).collect();
        assert_eq!(
            lines,
            vec![
                "[-] closed 20",
                "[?] filtered 21",
                "[∮] open 22",
                "[-] closed 23",
                "[-] closed 24",
                "[-] closed 25",
            ]
        );
    }
}
