//! Error types for oscan.
//!
//! Uses `thiserror` for ergonomic error definitions. Probe-level failures
//! never leave the scanner; they are folded into a port state. Everything
//! else either aborts the run before scanning (`CliError`) or is reported as
//! a warning (`EnumError`).

use crate::types::{PortError, TargetError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the scanning engine and its backends.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to query the open file descriptor limit: {0}")]
    ResourceQueryFailed(#[source] std::io::Error),

    #[error("too many open files")]
    ResourceExhausted,

    #[error("Connection refused")]
    ConnectionRefused,

    #[error("Connection timed out")]
    Timeout,

    #[error("Unreachable: {0}")]
    Unreachable(String),

    #[error("Connection to port {port} failed: {reason}")]
    ConnectionFailed { port: u16, reason: String },

    #[error("concurrency limiter closed")]
    LimiterClosed,

    #[error("scan deadline of {0:?} exceeded")]
    DeadlineExceeded(std::time::Duration),

    #[error("result aggregator stopped unexpectedly")]
    AggregatorFailed,

    #[error("{backend} backend failed: {reason}")]
    Backend { backend: &'static str, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Failures of the follow-on service enumerators and helpers.
#[derive(Error, Debug)]
pub enum EnumError {
    #[error("could not connect to {service} on port {port}: {source}")]
    Connect {
        service: &'static str,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("{service} protocol error: {reason}")]
    Protocol { service: &'static str, reason: String },

    #[error("`{0}` is not installed or not in PATH")]
    MissingTool(&'static str),

    #[error("`{tool}` exited with {status}: {output}")]
    ToolFailed {
        tool: &'static str,
        status: std::process::ExitStatus,
        output: String,
    },

    #[error("{service} timed out")]
    Timeout { service: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EnumResult<T> = Result<T, EnumError>;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine the configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file: {0}")]
    InvalidFormat(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level errors that abort a run.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    MalformedPortSpec(#[from] PortError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Other(String),
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_messages() {
        let err = ScanError::DeadlineExceeded(std::time::Duration::from_secs(2));
        assert_eq!(err.to_string(), "scan deadline of 2s exceeded");

        let err: CliError = ScanError::LimiterClosed.into();
        assert!(matches!(err, CliError::Scan(ScanError::LimiterClosed)));
    }

    #[test]
    fn test_port_error_converts_to_cli_error() {
        let err: CliError = PortError::Empty.into();
        assert!(matches!(err, CliError::MalformedPortSpec(_)));
        assert_eq!(err.to_string(), "empty port specification");
    }
}
