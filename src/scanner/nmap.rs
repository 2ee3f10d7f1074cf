//! Library-backed alternative scanner.
//!
//! Delegates the whole scan to an installed `nmap` and reads its greppable
//! output back into a [`ResultSet`], so it can stand in for the connect
//! engine anywhere a [`Scanner`] is expected.

use super::aggregator::ResultSet;
use super::traits::{PortState, ProbeOutcome, ScanBackend, ScanConfig, Scanner};
use crate::error::{EnumError, EnumResult, ScanError, ScanResult};
use crate::types::{Port, ScanTarget};
use async_trait::async_trait;
use std::io;
use std::process::Output;
use tokio::process::Command;

const NMAP: &str = "nmap";

pub struct NmapScanner {
    config: ScanConfig,
}

impl NmapScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    fn arguments(&self, target: &ScanTarget) -> Vec<String> {
        let mut args = vec![
            "-Pn".to_string(),
            "-sT".to_string(),
            "-p".to_string(),
            format!("{}-{}", target.ports.first(), target.ports.last()),
            "--max-rtt-timeout".to_string(),
            format!("{}ms", self.config.timeout.as_millis().max(1)),
        ];

        if let Some(cap) = self.config.concurrency_cap {
            args.push("--max-parallelism".to_string());
            args.push(cap.to_string());
        }
        if self.config.rate_limit > 0 {
            args.push("--max-rate".to_string());
            args.push(self.config.rate_limit.to_string());
        }
        if let Some(deadline) = self.config.deadline {
            args.push("--host-timeout".to_string());
            args.push(format!("{}s", deadline.as_secs().max(1)));
        }

        args.extend(["-oG".to_string(), "-".to_string(), target.ip.to_string()]);
        args
    }
}

#[async_trait]
impl Scanner for NmapScanner {
    fn backend(&self) -> ScanBackend {
        ScanBackend::Nmap
    }

    fn requires_privileges(&self) -> bool {
        false
    }

    async fn scan(&self, target: &ScanTarget) -> ScanResult<ResultSet> {
        let args = self.arguments(target);
        tracing::info!(host = %target, ?args, "delegating scan to nmap");

        let output = run_nmap(&args).await.map_err(|e| ScanError::Backend {
            backend: NMAP,
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(ScanError::Backend {
                backend: NMAP,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_greppable(&stdout, target))
    }
}

async fn run_nmap(args: &[String]) -> io::Result<Output> {
    Command::new(NMAP)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                io::Error::new(e.kind(), "nmap is not installed or not in PATH")
            } else {
                e
            }
        })
}

/// Build a result set from `-oG` output.
///
/// Ports nmap folds into "Ignored State" take that state; ports outside
/// the target range are dropped.
pub fn parse_greppable(output: &str, target: &ScanTarget) -> ResultSet {
    let mut listed = Vec::new();
    let mut ignored = PortState::Closed;

    for line in output.lines().filter(|l| l.starts_with("Host:")) {
        for field in line.split('\t') {
            if let Some(ports) = field.strip_prefix("Ports: ") {
                listed.extend(ports.split(", ").filter_map(parse_port_entry));
            } else if let Some(state) = field.strip_prefix("Ignored State: ") {
                let name = state.split_whitespace().next().unwrap_or_default();
                ignored = state_from_nmap(name);
            }
        }
    }

    let mut results: ResultSet = listed
        .into_iter()
        .filter(|o: &ProbeOutcome| target.ports.contains(o.port))
        .collect();

    for port in target.ports.iter() {
        results.insert(ProbeOutcome::new(port, ignored));
    }
    results
}

/// `22/open/tcp//ssh///`
fn parse_port_entry(entry: &str) -> Option<ProbeOutcome> {
    let mut parts = entry.trim().split('/');
    let port: u16 = parts.next()?.parse().ok()?;
    let state = parts.next()?;
    let protocol = parts.next()?;
    if protocol != "tcp" {
        return None;
    }
    Some(ProbeOutcome::new(Port::new(port)?, state_from_nmap(state)))
}

fn state_from_nmap(state: &str) -> PortState {
    match state {
        "open" => PortState::Open,
        "filtered" | "open|filtered" | "closed|filtered" => PortState::Filtered,
        _ => PortState::Closed,
    }
}

/// Run nmap OS detection against `address`.
///
/// Returns the reported OS description, or `None` when nmap could not
/// make a guess. Needs root for raw sockets.
pub async fn os_fingerprint(address: &str) -> EnumResult<Option<String>> {
    let args = ["-O".to_string(), "-Pn".to_string(), address.to_string()];
    let output = run_nmap(&args).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => EnumError::MissingTool(NMAP),
        _ => EnumError::Io(e),
    })?;

    if !output.status.success() {
        return Err(EnumError::ToolFailed {
            tool: NMAP,
            status: output.status,
            output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(parse_os_details(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_os_details(output: &str) -> Option<String> {
    const KEYS: [&str; 3] = ["OS details:", "Aggressive OS guesses:", "Running:"];

    KEYS.iter().find_map(|key| {
        output
            .lines()
            .find_map(|line| line.strip_prefix(key))
            .map(|rest| rest.trim().to_string())
            .filter(|rest| !rest.is_empty())
    })
}

/// Check if running with root/admin privileges.
pub fn is_root() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    const SAMPLE: &str = "# Nmap 7.94 scan initiated as: nmap -Pn -sT -p 20-25 -oG - 127.0.0.1\n\
Host: 127.0.0.1 (localhost)\tStatus: Up\n\
Host: 127.0.0.1 (localhost)\tPorts: 21/filtered/tcp//ftp///, 22/open/tcp//ssh///\tIgnored State: closed (4)\n\
# Nmap done at Sat Oct 17 12:00:00 2026 -- 1 IP address (1 host up) scanned in 0.05 seconds\n";

    fn target(range: &str) -> ScanTarget {
        ScanTarget::new(
            "127.0.0.1",
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            range.parse().unwrap(),
        )
    }

    #[test]
    fn test_parse_greppable() {
        let results = parse_greppable(SAMPLE, &target("20-25"));
        assert_eq!(results.len(), 6);
        assert!(results.is_open(22));
        assert_eq!(results.get(Port::new(21).unwrap()), Some(PortState::Filtered));
        assert_eq!(results.get(Port::new(25).unwrap()), Some(PortState::Closed));
    }

    #[test]
    fn test_ignored_state_filtered() {
        let output = "Host: 10.0.0.1 ()\tPorts: 443/open/tcp//https///\tIgnored State: filtered (9)\n";
        let results = parse_greppable(output, &target("440-449"));
        assert_eq!(results.count(PortState::Open), 1);
        assert_eq!(results.count(PortState::Filtered), 9);
    }

    #[test]
    fn test_parse_port_entry() {
        let entry = parse_port_entry("80/open|filtered/tcp//http///").unwrap();
        assert_eq!(entry.state, PortState::Filtered);
        assert!(parse_port_entry("53/open/udp//domain///").is_none());
        assert!(parse_port_entry("garbage").is_none());
    }

    #[test]
    fn test_arguments() {
        let config = ScanConfig::default()
            .with_timeout(Duration::from_millis(250))
            .with_concurrency_cap(Some(64));
        let args = NmapScanner::new(config).arguments(&target("1-1024"));
        assert!(args.windows(2).any(|w| w[0] == "-p" && w[1] == "1-1024"));
        assert!(args.windows(2).any(|w| w[0] == "--max-parallelism" && w[1] == "64"));
        assert_eq!(args.last().map(String::as_str), Some("127.0.0.1"));
    }

    #[test]
    fn test_parse_os_details() {
        let output = "Device type: general purpose\nRunning: Linux 5.X\nOS details: Linux 5.0 - 5.14\n";
        assert_eq!(parse_os_details(output).as_deref(), Some("Linux 5.0 - 5.14"));
        assert_eq!(parse_os_details("nothing useful"), None);
    }
}
