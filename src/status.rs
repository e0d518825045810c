//! Status codes reported to the host application.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::NetworkInfo;

/// Broker status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// Catch-all for a context-specific status.
    Unspecified,
    /// A new peer was added.
    PeerAdded,
    /// A peering was deliberately removed.
    PeerRemoved,
    /// A peer was lost without a graceful shutdown.
    PeerLost,
}

impl StatusCode {
    /// Returns the snake_case name of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::PeerAdded => "peer_added",
            Self::PeerRemoved => "peer_removed",
            Self::PeerLost => "peer_lost",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing a [`StatusCode`] from its string form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status code '{0}'")]
pub struct StatusParseError(String);

impl FromStr for StatusCode {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unspecified" => Ok(Self::Unspecified),
            "peer_added" => Ok(Self::PeerAdded),
            "peer_removed" => Ok(Self::PeerRemoved),
            "peer_lost" => Ok(Self::PeerLost),
            other => Err(StatusParseError(other.to_owned())),
        }
    }
}

/// A status report: a code plus optional human-readable context and the
/// network address of the peer it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    code: StatusCode,
    message: Option<String>,
    peer: Option<NetworkInfo>,
}

impl Status {
    /// Creates a status carrying only a code.
    #[must_use]
    pub const fn new(code: StatusCode) -> Self {
        Self {
            code,
            message: None,
            peer: None,
        }
    }

    /// Attaches a human-readable context message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches the network address of the affected peer.
    #[must_use]
    pub fn with_peer(mut self, peer: NetworkInfo) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Returns the status code.
    #[must_use]
    pub const fn code(&self) -> StatusCode {
        self.code
    }

    /// Returns the context message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the affected peer's address, if any.
    #[must_use]
    pub const fn peer(&self) -> Option<&NetworkInfo> {
        self.peer.as_ref()
    }
}

impl PartialEq<StatusCode> for Status {
    fn eq(&self, other: &StatusCode) -> bool {
        self.code == *other
    }
}

impl PartialEq<Status> for StatusCode {
    fn eq(&self, other: &Status) -> bool {
        *self == other.code
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.code.fmt(f)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}
