//! Scanner trait abstraction.
//!
//! Defines the one capability every backend provides: turn a
//! [`ScanTarget`] into a complete [`ResultSet`].

use super::aggregator::ResultSet;
use crate::error::ScanResult;
use crate::types::{Port, ScanTarget};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Final classification of a probed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// A listener accepted the connection.
    Open,
    /// Explicit refusal (RST).
    Closed,
    /// No answer within the timeout, or the host was unreachable.
    Filtered,
}

impl PortState {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Filtered => write!(f, "filtered"),
        }
    }
}

/// The result of probing one port. Produced exactly once per port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub port: Port,
    pub state: PortState,
}

impl ProbeOutcome {
    pub fn new(port: Port, state: PortState) -> Self {
        Self { port, state }
    }
}

/// Available scanning backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScanBackend {
    /// Full TCP connect probes issued by this process.
    #[default]
    Connect,
    /// Delegate to an installed `nmap` binary.
    Nmap,
}

impl fmt::Display for ScanBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "TCP Connect"),
            Self::Nmap => write!(f, "nmap"),
        }
    }
}

impl std::str::FromStr for ScanBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "connect" | "tcp" => Ok(Self::Connect),
            "nmap" => Ok(Self::Nmap),
            _ => Err(format!("unknown scan backend: {}", s)),
        }
    }
}

/// Configuration shared by all backends.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Per-probe connect timeout, also the backoff after descriptor exhaustion.
    pub timeout: Duration,
    /// Retries allowed per port after descriptor exhaustion.
    pub max_retries: u32,
    /// Concurrency used when the descriptor limit is unbounded.
    pub fallback_concurrency: usize,
    /// Optional user ceiling on concurrency.
    pub concurrency_cap: Option<usize>,
    /// Probe starts per second, 0 for unlimited.
    pub rate_limit: u32,
    /// Abort the whole scan after this long.
    pub deadline: Option<Duration>,
    /// Draw a progress bar on stderr.
    pub show_progress: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            max_retries: super::tcp::DEFAULT_MAX_RETRIES,
            fallback_concurrency: super::budget::DEFAULT_FALLBACK,
            concurrency_cap: None,
            rate_limit: 0,
            deadline: None,
            show_progress: false,
        }
    }
}

impl ScanConfig {
    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_fallback_concurrency(mut self, fallback: usize) -> Self {
        self.fallback_concurrency = fallback;
        self
    }

    /// Lower the concurrency below what the descriptor limit allows.
    pub fn with_concurrency_cap(mut self, cap: Option<usize>) -> Self {
        self.concurrency_cap = cap;
        self
    }

    pub fn with_rate_limit(mut self, rate: u32) -> Self {
        self.rate_limit = rate;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Enable the progress bar.
    pub fn with_progress(mut self) -> Self {
        self.show_progress = true;
        self
    }
}

/// Trait for port scanner implementations.
///
/// Implementations are interchangeable: each must report every port of
/// `target.ports` at most once, and must not return until the scan is
/// complete, so a partial result set is never observed.
///
/// # Example
///
/// ```ignore
/// use oscan::scanner::{create_scanner, ScanBackend, ScanConfig};
///
/// let scanner = create_scanner(ScanBackend::Connect, ScanConfig::default())?;
/// let results = scanner.scan(&target).await?;
/// ```
#[async_trait]
pub trait Scanner: Send + Sync {
    /// The backend this scanner implements.
    fn backend(&self) -> ScanBackend;

    /// Check if this scanner requires elevated privileges.
    fn requires_privileges(&self) -> bool;

    /// Scan every port of the target and return the frozen results.
    async fn scan(&self, target: &ScanTarget) -> ScanResult<ResultSet>;
}

/// A boxed scanner for dynamic dispatch.
pub type BoxedScanner = Box<dyn Scanner>;
