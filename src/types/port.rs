//! Ports and port ranges.
//!
//! Port 0 is not scannable, so `Port` only holds 1-65535 and a `PortRange`
//! built from two ports can never be empty.
//! `PortRange` is the inclusive interval a single scan walks over.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated network port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(u16);

impl Port {
    /// Minimum valid port number.
    pub const MIN: u16 = 1;
    /// Maximum valid port number.
    pub const MAX: u16 = 65535;

    /// `None` for port 0.
    #[inline]
    pub const fn new(port: u16) -> Option<Self> {
        if port >= Self::MIN {
            Some(Self(port))
        } else {
            None
        }
    }

    /// Get the raw port number.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = PortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(PortError::OutOfRange(value.to_string()))
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Error type for port specifications that cannot be turned into a range.
///
/// Every variant is fatal: the run aborts before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("port {0} is out of valid range (1-65535)")]
    OutOfRange(String),
    #[error("malformed port specification: '{0}' (expected N, N-M or 'all')")]
    InvalidFormat(String),
    #[error("invalid port range: start ({0}) > end ({1})")]
    InvalidRange(u16, u16),
    #[error("empty port specification")]
    Empty,
}

/// An inclusive range of ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRange {
    first: Port,
    last: Port,
}

impl PortRange {
    /// Create a new port range. Inverted ranges are rejected.
    pub fn new(first: Port, last: Port) -> Result<Self, PortError> {
        if first > last {
            Err(PortError::InvalidRange(first.0, last.0))
        } else {
            Ok(Self { first, last })
        }
    }

    /// Create a range containing a single port.
    pub const fn single(port: Port) -> Self {
        Self {
            first: port,
            last: port,
        }
    }

    /// The whole port space, 1-65535.
    pub const fn all() -> Self {
        Self {
            first: Port(Port::MIN),
            last: Port(Port::MAX),
        }
    }

    pub const fn first(&self) -> Port {
        self.first
    }

    pub const fn last(&self) -> Port {
        self.last
    }

    /// Get the number of ports in this range.
    pub const fn len(&self) -> usize {
        (self.last.0 - self.first.0) as usize + 1
    }

    /// A valid range always holds at least one port.
    pub const fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, port: Port) -> bool {
        self.first <= port && port <= self.last
    }

    /// Iterate over all ports in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Port> {
        (self.first.0..=self.last.0).map(Port)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}-{}", self.first, self.last)
        }
    }
}

/// Parses `"all"`, `"A-B"` or a bare `"P"`.
impl FromStr for PortRange {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PortError::Empty);
        }

        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }

        match s.split_once('-') {
            Some((first, last)) => {
                let first = parse_port(first, s)?;
                let last = parse_port(last, s)?;
                Self::new(first, last)
            }
            None => parse_port(s, s).map(Self::single),
        }
    }
}

/// Parse one bound. Only ASCII digits are accepted, so `"+80"` or
/// an empty half of `"80-"` are malformed rather than silently coerced.
fn parse_port(token: &str, spec: &str) -> Result<Port, PortError> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PortError::InvalidFormat(spec.to_string()));
    }

    let value: u16 = token
        .parse()
        .map_err(|_| PortError::OutOfRange(token.to_string()))?;
    Port::try_from(value)
}
