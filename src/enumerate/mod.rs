//! Follow-on enumeration of well-known services.
//!
//! Enumerators run after the scan, one at a time, and only for ports the
//! scan found open. They never modify the scan results; a failing
//! enumerator is reported as a warning and the run carries on.

mod ftp;
mod http;
mod ntp;
mod smb;

pub use ftp::FtpEnumerator;
pub use http::HttpEnumerator;
pub use ntp::sync_time;
pub use smb::SmbEnumerator;

use crate::error::{EnumError, EnumResult};
use crate::output;
use crate::scanner::ResultSet;
use async_trait::async_trait;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Inputs shared by all enumerators.
#[derive(Debug, Clone)]
pub struct EnumContext {
    /// Address as the user gave it.
    pub address: String,
    /// Resolved address to connect to.
    pub ip: IpAddr,
    /// Download content where the service allows it.
    pub dump: bool,
    /// Directory that receives `ftp_dump/` and `smb_dump/`.
    pub dump_root: PathBuf,
    /// Network timeout for protocol exchanges.
    pub timeout: Duration,
}

#[async_trait]
pub trait Enumerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// The port whose being open triggers this enumerator.
    fn port(&self) -> u16;

    async fn run(&self, ctx: &EnumContext) -> EnumResult<()>;
}

/// FTP on 21, SMB on 445, HTTP on 80.
pub fn default_enumerators() -> Vec<Box<dyn Enumerator>> {
    vec![
        Box::new(FtpEnumerator::default()),
        Box::new(SmbEnumerator::default()),
        Box::new(HttpEnumerator::default()),
    ]
}

/// Run every enumerator whose port is open. Returns how many ran.
pub async fn run_enumerators(
    results: &ResultSet,
    ctx: &EnumContext,
    enumerators: &[Box<dyn Enumerator>],
) -> usize {
    let mut ran = 0;
    for enumerator in enumerators.iter().filter(|e| results.is_open(e.port())) {
        ran += 1;
        tracing::info!(name = enumerator.name(), port = enumerator.port(), "running enumerator");
        if let Err(e) = enumerator.run(ctx).await {
            output::print_warning(&format!("{} enumeration failed: {}", enumerator.name(), e));
        }
    }
    ran
}

/// Run an external tool to completion and capture its output.
pub(crate) async fn run_tool(
    tool: &'static str,
    args: &[&str],
    dir: Option<&Path>,
) -> EnumResult<Output> {
    let mut command = Command::new(tool);
    command.args(args).kill_on_drop(true);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    tracing::debug!(tool, ?args, "running external tool");
    let output = command.output().await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => EnumError::MissingTool(tool),
        _ => EnumError::Io(e),
    })?;

    if !output.status.success() {
        let mut text = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if text.is_empty() {
            text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
        return Err(EnumError::ToolFailed {
            tool,
            status: output.status,
            output: text,
        });
    }
    Ok(output)
}

/// Check that `tool` can be started.
pub(crate) async fn tool_available(tool: &'static str) -> bool {
    run_tool(tool, &["--version"], None).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{PortState, ProbeOutcome};
    use crate::types::Port;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Recording {
        port: u16,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Enumerator for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn port(&self) -> u16 {
            self.port
        }

        async fn run(&self, _ctx: &EnumContext) -> EnumResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(EnumError::Timeout { service: "recording" })
            } else {
                Ok(())
            }
        }
    }

    fn context() -> EnumContext {
        EnumContext {
            address: "127.0.0.1".to_string(),
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            dump: false,
            dump_root: PathBuf::from("."),
            timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_only_open_ports_trigger() {
        let results: ResultSet = [(21, PortState::Open), (445, PortState::Closed)]
            .into_iter()
            .map(|(p, s)| ProbeOutcome::new(Port::new(p).unwrap(), s))
            .collect();

        let ftp_calls = Arc::new(AtomicUsize::new(0));
        let smb_calls = Arc::new(AtomicUsize::new(0));
        let enumerators: Vec<Box<dyn Enumerator>> = vec![
            Box::new(Recording { port: 21, calls: Arc::clone(&ftp_calls), fail: true }),
            Box::new(Recording { port: 445, calls: Arc::clone(&smb_calls), fail: false }),
        ];

        let ran = run_enumerators(&results, &context(), &enumerators).await;
        assert_eq!(ran, 1);
        assert_eq!(ftp_calls.load(Ordering::SeqCst), 1);
        assert_eq!(smb_calls.load(Ordering::SeqCst), 0);
        // A failing enumerator leaves the results untouched
        assert!(results.is_open(21));
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let err = run_tool("oscan-no-such-tool", &[], None).await.unwrap_err();
        assert!(matches!(err, EnumError::MissingTool("oscan-no-such-tool")));
        assert!(!tool_available("oscan-no-such-tool").await);
    }
}
