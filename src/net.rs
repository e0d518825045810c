//! Network value types consumed by the channel layer and its host.
//!
//! No sockets live here: the transport itself is an external collaborator.

pub mod endpoint;
pub mod port;

pub use endpoint::{EndpointId, NetworkInfo};
pub use port::{Port, PortParseError, PortProtocol};
