//! # oscan - a concurrent TCP connect port scanner
//!
//! oscan probes a contiguous port range on a single host with one async
//! task per port. Concurrency is sized from the process file descriptor
//! limit so a full 65535-port sweep never runs the host out of sockets,
//! and probes that still hit descriptor exhaustion back off and retry a
//! bounded number of times.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use oscan::scanner::{create_scanner, ScanBackend, ScanConfig};
//! use oscan::types::ScanTarget;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let target = ScanTarget::resolve("192.168.1.1", "1-1024".parse()?).await?;
//!     let scanner = create_scanner(ScanBackend::Connect, ScanConfig::default())?;
//!
//!     for port in scanner.scan(&target).await?.open_ports() {
//!         println!("{} is open", port);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - ports, port ranges and scan targets
//! - [`scanner`] - the scan engine and the `Scanner` trait
//! - [`output`] - plain and JSON reports
//! - [`services`] - well-known service names
//! - [`enumerate`] - FTP, SMB and HTTP follow-ups on open ports
//! - [`config`] - the settings file
//! - [`error`] - error types

pub mod cli;
pub mod config;
pub mod enumerate;
pub mod error;
pub mod output;
pub mod scanner;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use error::{CliError, ScanError};
pub use scanner::{PortState, ProbeOutcome, ResultSet, ScanBackend, Scanner};
pub use types::{Port, PortRange, ScanTarget, TargetSpec};
