//! JSON output formatting.

use super::ScanReport;
use std::io::{self, Write};

/// Write the report as pretty-printed JSON.
pub fn render_json<W: Write>(report: &ScanReport, out: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report).map_err(io::Error::other)?;
    writeln!(out)
}
