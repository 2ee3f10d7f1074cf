//! Scanner module - the concurrent port scanning engine.
//!
//! This module turns a [`ScanTarget`](crate::types::ScanTarget) into a
//! [`ResultSet`] behind the [`Scanner`] trait. The raw-connect engine is
//! assembled from small parts:
//!
//! - [`budget`] - descriptor-limit derived concurrency budget
//! - [`limiter`] - admission gate sized to that budget
//! - [`tcp`] - single-port prober with bounded retry
//! - [`aggregator`] - single-writer result collection
//! - [`engine`] - the task-per-port driver
//!
//! [`nmap`] provides the interchangeable library-backed alternative.

pub mod aggregator;
pub mod budget;
pub mod engine;
pub mod limiter;
pub mod nmap;
pub mod rate_limiter;
pub mod tcp;
pub mod traits;

pub use aggregator::{Aggregator, AggregatorHandle, ResultSet};
pub use budget::{ConcurrencyBudget, DescriptorLimit};
pub use engine::ConnectScanner;
pub use limiter::{ConcurrencyLimiter, Slot};
pub use nmap::NmapScanner;
pub use tcp::{Dialer, Prober, TcpDialer};
pub use traits::{BoxedScanner, PortState, ProbeOutcome, ScanBackend, ScanConfig, Scanner};

use crate::error::ScanResult;

/// Build the scanner for `backend`.
///
/// Fails only when the connect engine cannot determine a safe concurrency
/// budget.
pub fn create_scanner(backend: ScanBackend, config: ScanConfig) -> ScanResult<BoxedScanner> {
    match backend {
        ScanBackend::Connect => Ok(Box::new(ConnectScanner::new(config)?)),
        ScanBackend::Nmap => Ok(Box::new(NmapScanner::new(config))),
    }
}
