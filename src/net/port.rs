//! Transport-layer port value type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport protocol of a [`Port`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum PortProtocol {
    #[default]
    Unknown,
    Tcp,
    Udp,
    Icmp,
}

impl PortProtocol {
    /// Returns the lowercase protocol name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "?",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Icmp => "icmp",
        }
    }
}

impl fmt::Display for PortProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors when parsing a port from its string form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortParseError {
    /// The input is not of the form `number/protocol`.
    #[error("expected 'number/protocol', got '{0}'")]
    MissingSeparator(String),
    /// The number part is not a valid u16.
    #[error("invalid port number '{0}'")]
    InvalidNumber(String),
    /// The protocol part names no known transport protocol.
    #[error("unknown transport protocol '{0}'")]
    UnknownProtocol(String),
}

/// A transport-layer port.
///
/// Ordered by number first, protocol second. Displays as `"8080/tcp"`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Port {
    number: u16,
    protocol: PortProtocol,
}

impl Port {
    /// Creates a port from number and protocol.
    #[must_use]
    pub const fn new(number: u16, protocol: PortProtocol) -> Self {
        Self { number, protocol }
    }

    /// Returns the port number.
    #[must_use]
    pub const fn number(&self) -> u16 {
        self.number
    }

    /// Returns the port's transport protocol.
    #[must_use]
    pub const fn protocol(&self) -> PortProtocol {
        self.protocol
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol)
    }
}

impl FromStr for Port {
    type Err = PortParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, protocol) = s
            .split_once('/')
            .ok_or_else(|| PortParseError::MissingSeparator(s.to_owned()))?;
        let number = number
            .parse()
            .map_err(|_| PortParseError::InvalidNumber(number.to_owned()))?;
        let protocol = match protocol {
            "?" => PortProtocol::Unknown,
            "tcp" => PortProtocol::Tcp,
            "udp" => PortProtocol::Udp,
            "icmp" => PortProtocol::Icmp,
            other => return Err(PortParseError::UnknownProtocol(other.to_owned())),
        };
        Ok(Self { number, protocol })
    }
}
