//! Bookkeeping for one established peering.
//!
//! The channel layer itself never decides that a peer is gone; the host
//! does, either by observing stalled ACK progress on a producer path or by
//! running the graceful BYE handshake tracked here. A `Peering` records
//! which of the two happened so the disconnect can be reported with the
//! right status code.
//!
//! Unpeering works like a final ping: `remove` arms a random 64-bit BYE
//! token and a tick-based deadline. When the matching acknowledgment comes
//! back, all in-flight messages are known to have drained and the
//! connection can be torn down; if the deadline passes first, the host
//! tears it down anyway.

use crate::net::{EndpointId, NetworkInfo};
use crate::status::{Status, StatusCode};
use crate::trace::debug;

/// Token carried by the final message of a graceful unpeering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByeToken(u64);

impl ByeToken {
    /// Raw value for wire serialization.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for ByeToken {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

#[derive(Debug, Clone, Copy)]
struct ByeState {
    token: u64,
    deadline: u64,
}

/// State of one peering between this endpoint and a remote one.
pub struct Peering {
    /// The ID of this node.
    id: EndpointId,
    /// The ID of the peered node.
    peer_id: EndpointId,
    /// Network address as reported from the transport.
    addr: Option<NetworkInfo>,
    /// Whether we have deliberately removed this peering.
    removed: bool,
    /// Pending BYE handshake, if any.
    bye: Option<ByeState>,
}

impl Peering {
    /// Creates bookkeeping for a fresh peering.
    #[must_use]
    pub const fn new(id: EndpointId, peer_id: EndpointId) -> Self {
        Self {
            id,
            peer_id,
            addr: None,
            removed: false,
            bye: None,
        }
    }

    /// Returns the ID of this node.
    #[must_use]
    pub const fn id(&self) -> EndpointId {
        self.id
    }

    /// Returns the ID of the peered node.
    #[must_use]
    pub const fn peer_id(&self) -> EndpointId {
        self.peer_id
    }

    /// Returns the network address of the peered node, if known.
    #[must_use]
    pub const fn addr(&self) -> Option<&NetworkInfo> {
        self.addr.as_ref()
    }

    /// Records the network address reported by the transport.
    pub fn set_addr(&mut self, addr: NetworkInfo) {
        self.addr = Some(addr);
    }

    /// Queries whether [`remove`](Self::remove) was called.
    #[must_use]
    pub const fn removed(&self) -> bool {
        self.removed
    }

    /// Tags this peering as removed and arms the BYE handshake.
    ///
    /// Returns the token the host must attach to its final message to the
    /// peer. Calling `remove` again re-arms the deadline but keeps the
    /// original token.
    pub fn remove(&mut self, now: u64, timeout: u64) -> ByeToken {
        self.removed = true;
        let deadline = now + timeout;
        let state = self.bye.get_or_insert_with(|| ByeState {
            token: rand::random(),
            deadline,
        });
        state.deadline = deadline;
        ByeToken(state.token)
    }

    /// Processes the acknowledgment for our BYE.
    ///
    /// Returns true if `token` completes the pending handshake; stray or
    /// repeated acknowledgments return false.
    pub fn on_bye_ack(&mut self, token: ByeToken) -> bool {
        match self.bye {
            Some(state) if state.token == token.0 => {
                self.bye = None;
                true
            }
            _ => {
                debug!("ignoring BYE ack with unexpected token");
                false
            }
        }
    }

    /// Returns true while a BYE handshake is armed and unacknowledged.
    #[must_use]
    pub const fn bye_pending(&self) -> bool {
        self.bye.is_some()
    }

    /// Returns true if the armed BYE handshake has passed its deadline.
    #[must_use]
    pub fn bye_timed_out(&self, now: u64) -> bool {
        self.bye.is_some_and(|state| now >= state.deadline)
    }

    /// Returns the code describing how this peering ended.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        if self.removed {
            StatusCode::PeerRemoved
        } else {
            StatusCode::PeerLost
        }
    }

    /// Builds the status report for losing the connection to this peer.
    #[must_use]
    pub fn disconnect_status(&self) -> Status {
        let message = if self.removed {
            "removed connection to remote peer"
        } else {
            "lost connection to remote peer"
        };
        let status = Status::new(self.status_code()).with_message(message);
        match &self.addr {
            Some(addr) => status.with_peer(addr.clone()),
            None => status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{Port, PortProtocol};

    fn peering() -> Peering {
        Peering::new(EndpointId::generate(), EndpointId::generate())
    }

    #[test]
    fn fresh_peering_reports_peer_lost() {
        let p = peering();
        assert!(!p.removed());
        assert_eq!(p.status_code(), StatusCode::PeerLost);
        assert!(!p.bye_pending());
    }

    #[test]
    fn remove_arms_bye_and_flips_status() {
        let mut p = peering();
        let token = p.remove(10, 5);

        assert!(p.removed());
        assert!(p.bye_pending());
        assert_eq!(p.status_code(), StatusCode::PeerRemoved);
        assert!(!p.bye_timed_out(14));
        assert!(p.bye_timed_out(15));

        assert!(p.on_bye_ack(token));
        assert!(!p.bye_pending());
        assert!(!p.bye_timed_out(100));
    }

    #[test]
    fn repeated_remove_keeps_token_rearms_deadline() {
        let mut p = peering();
        let first = p.remove(0, 5);
        let second = p.remove(10, 5);

        assert_eq!(first, second);
        assert!(!p.bye_timed_out(14));
        assert!(p.bye_timed_out(15));
    }

    #[test]
    fn wrong_token_does_not_complete_bye() {
        let mut p = peering();
        let token = p.remove(0, 5);

        assert!(!p.on_bye_ack(ByeToken::from(token.as_u64().wrapping_add(1))));
        assert!(p.bye_pending());
    }

    #[test]
    fn disconnect_status_carries_peer_address() {
        let mut p = peering();
        p.set_addr(NetworkInfo::new("10.0.0.7", Port::new(9999, PortProtocol::Tcp)));

        let status = p.disconnect_status();
        assert_eq!(status, StatusCode::PeerLost);
        assert_eq!(status.peer().unwrap().address, "10.0.0.7");

        p.remove(0, 5);
        assert_eq!(p.disconnect_status(), StatusCode::PeerRemoved);
    }
}
