//! Target specification types.
//!
//! A run scans exactly one host, given either as an IP literal or as a
//! hostname that is resolved once before scanning starts.

use super::port::PortRange;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// The immutable description of one scan: the host and the port interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ScanTarget {
    /// The original input (hostname or IP string).
    pub address: String,
    /// The resolved IP address.
    pub ip: IpAddr,
    /// Ports to probe, inclusive.
    pub ports: PortRange,
}

impl ScanTarget {
    pub fn new(address: impl Into<String>, ip: IpAddr, ports: PortRange) -> Self {
        Self {
            address: address.into(),
            ip,
            ports,
        }
    }

    /// Resolve `address` and bind it to `ports`.
    pub async fn resolve(address: &str, ports: PortRange) -> Result<Self, TargetError> {
        let spec = TargetSpec::parse(address)?;
        let ip = spec.resolve().await?;
        Ok(Self::new(address.trim(), ip, ports))
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address == self.ip.to_string() {
            write!(f, "{}", self.ip)
        } else {
            write!(f, "{} ({})", self.address, self.ip)
        }
    }
}

/// Why an address could not be turned into something to probe.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TargetError {
    #[error("'{0}' is neither an IP address nor a host name")]
    InvalidFormat(String),
    #[error("could not resolve '{0}': {1}")]
    DnsResolutionFailed(String, String),
    #[error("'{0}' resolved to no addresses")]
    NoAddressesFound(String),
}

/// A single-host target specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// A literal IP address.
    Single(IpAddr),
    /// A hostname to be resolved.
    Hostname(String),
}

impl TargetSpec {
    /// Parse a target specification from a string.
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        let s = s.trim();

        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::Single(ip));
        }

        if is_valid_hostname(s) {
            return Ok(Self::Hostname(s.to_string()));
        }

        Err(TargetError::InvalidFormat(s.to_string()))
    }

    /// Resolve to the address that will be probed.
    ///
    /// Hostnames with several records use the first one returned.
    pub async fn resolve(&self) -> Result<IpAddr, TargetError> {
        match self {
            Self::Single(ip) => Ok(*ip),
            Self::Hostname(hostname) => {
                let resolver =
                    TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

                let response = resolver.lookup_ip(hostname.as_str()).await.map_err(|e| {
                    TargetError::DnsResolutionFailed(hostname.clone(), e.to_string())
                })?;

                let ip = response
                    .iter()
                    .next()
                    .ok_or_else(|| TargetError::NoAddressesFound(hostname.clone()))?;
                tracing::debug!(%hostname, %ip, "resolved target");
                Ok(ip)
            }
        }
    }
}

impl FromStr for TargetSpec {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(ip) => write!(f, "{}", ip),
            Self::Hostname(hostname) => write!(f, "{}", hostname),
        }
    }
}

/// RFC 1123 host name: dot-separated labels of letters, digits and inner
/// hyphens, 63 bytes per label and 253 overall.
fn is_valid_hostname(s: &str) -> bool {
    let label_ok = |label: &str| {
        let bytes = label.as_bytes();
        matches!(bytes.len(), 1..=63)
            && bytes[0].is_ascii_alphanumeric()
            && bytes[bytes.len() - 1].is_ascii_alphanumeric()
            && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
    };

    !s.is_empty() && s.len() <= 253 && s.split('.').all(label_ok)
}
