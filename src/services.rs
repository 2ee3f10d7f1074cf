//! Service name lookup keyed by `(port, protocol)`.
//!
//! Reads the system services database once and falls back to a small
//! built-in table of well-known TCP services when the file is missing or
//! has no entry.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

/// Location of the system services database.
pub const SERVICES_PATH: &str = "/etc/services";

/// Marker rendered for ports with no known service.
pub const UNKNOWN_SERVICE: &str = "unknown service";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

const WELL_KNOWN_TCP: &[(u16, &str)] = &[
    (20, "ftp-data"),
    (21, "ftp"),
    (22, "ssh"),
    (23, "telnet"),
    (25, "smtp"),
    (53, "domain"),
    (80, "http"),
    (88, "kerberos"),
    (110, "pop3"),
    (111, "sunrpc"),
    (123, "ntp"),
    (135, "msrpc"),
    (139, "netbios-ssn"),
    (143, "imap"),
    (389, "ldap"),
    (443, "https"),
    (445, "microsoft-ds"),
    (464, "kpasswd"),
    (465, "submissions"),
    (587, "submission"),
    (593, "http-rpc-epmap"),
    (636, "ldaps"),
    (873, "rsync"),
    (993, "imaps"),
    (995, "pop3s"),
    (1433, "ms-sql-s"),
    (1521, "oracle"),
    (2049, "nfs"),
    (3268, "globalcatLDAP"),
    (3306, "mysql"),
    (3389, "ms-wbt-server"),
    (5432, "postgresql"),
    (5900, "vnc"),
    (5985, "wsman"),
    (6379, "redis"),
    (8080, "http-alt"),
    (8443, "https-alt"),
    (9200, "elasticsearch"),
    (11211, "memcache"),
    (27017, "mongodb"),
];

static SYSTEM: LazyLock<ServiceTable> = LazyLock::new(|| ServiceTable::load(SERVICES_PATH));

/// Parsed services database.
#[derive(Debug, Clone, Default)]
pub struct ServiceTable {
    entries: HashMap<(u16, Protocol), String>,
}

impl ServiceTable {
    /// Parse `services(5)` formatted text. The first name listed for a
    /// `(port, protocol)` pair wins.
    pub fn parse(contents: &str) -> Self {
        let mut entries = HashMap::new();

        for line in contents.lines() {
            let line = line.split('#').next().unwrap_or_default();
            let mut fields = line.split_whitespace();
            let (Some(name), Some(spec)) = (fields.next(), fields.next()) else {
                continue;
            };
            let Some((port, proto)) = spec.split_once('/') else {
                continue;
            };
            let (Ok(port), Some(proto)) = (port.parse::<u16>(), Protocol::parse(proto)) else {
                continue;
            };
            entries.entry((port, proto)).or_insert_with(|| name.to_string());
        }

        Self { entries }
    }

    /// Load from a file; an unreadable file yields an empty table.
    pub fn load(path: impl AsRef<Path>) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => Self::parse(&contents),
            Err(e) => {
                tracing::debug!(path = %path.as_ref().display(), error = %e, "no services database");
                Self::default()
            }
        }
    }

    pub fn lookup(&self, port: u16, protocol: Protocol) -> Option<&str> {
        self.entries
            .get(&(port, protocol))
            .map(String::as_str)
            .or_else(|| builtin(port, protocol))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn builtin(port: u16, protocol: Protocol) -> Option<&'static str> {
    if protocol != Protocol::Tcp {
        return None;
    }
    WELL_KNOWN_TCP
        .binary_search_by_key(&port, |&(p, _)| p)
        .ok()
        .map(|i| WELL_KNOWN_TCP[i].1)
}

/// Look up the well-known service name for a port.
pub fn service_name(port: u16, protocol: Protocol) -> Option<&'static str> {
    SYSTEM.lookup(port, protocol)
}

/// Service name for a TCP port, or [`UNKNOWN_SERVICE`].
pub fn tcp_service_description(port: u16) -> &'static str {
    service_name(port, Protocol::Tcp).unwrap_or(UNKNOWN_SERVICE)
}
