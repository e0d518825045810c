//! Broker endpoint identity and address types.
//!
//! These types are intentionally transport-agnostic: the channel layer never
//! opens sockets itself, it only needs stable identities and a way to report
//! where a peer was reached.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::net::port::Port;

/// Unique identifier of a broker endpoint.
///
/// Generated randomly at endpoint startup; collisions between 64-bit random
/// identities are not a practical concern for broker-sized deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointId(u64);

impl EndpointId {
    /// Generates a new random endpoint identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::random())
    }

    /// Raw value for wire serialization.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for EndpointId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Network-level address of a peer as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Host address (IP literal or DNS name, as the transport saw it).
    pub address: String,
    /// Transport-layer port.
    pub port: Port,
}

impl NetworkInfo {
    /// Creates network info from address and port.
    #[must_use]
    pub fn new(address: impl Into<String>, port: Port) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for NetworkInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::port::PortProtocol;

    #[test]
    fn generated_ids_are_distinct() {
        let a = EndpointId::generate();
        let b = EndpointId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn id_displays_as_fixed_width_hex() {
        let id = EndpointId::from(0xAB);
        assert_eq!(id.to_string(), "00000000000000ab");
    }

    #[test]
    fn network_info_display() {
        let info = NetworkInfo::new("10.0.0.1", Port::new(9999, PortProtocol::Tcp));
        assert_eq!(info.to_string(), "10.0.0.1:9999/tcp");
    }
}
