//! Validated inputs of a scan: which ports, on which host.

mod port;
mod target;

pub use port::{Port, PortError, PortRange};
pub use target::{ScanTarget, TargetError, TargetSpec};
