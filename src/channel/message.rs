//! Messages exchanged between the producer and its consumers.
//!
//! Six message kinds cross the wire. Field order is the serialization
//! contract (see [`crate::channel::wire`]).
//!
//! | Kind                | Direction | Fields                           |
//! |---------------------|-----------|----------------------------------|
//! | `Handshake`         | P → C     | `first_seq`, `heartbeat_interval`|
//! | `Event`             | P → C     | `seq`, `content`                 |
//! | `RetransmitFailed`  | P → C     | `seq`                            |
//! | `Heartbeat`         | P → C     | `seq`                            |
//! | `CumulativeAck`     | C → P     | `seq`                            |
//! | `Nack`              | C → P     | `seqs`                           |

use serde::{Deserialize, Serialize};

use crate::channel::types::{SeqNum, TickInterval};

/// Tells a consumer which is the first sequence number after it started
/// listening to the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// The consumer processes and acknowledges events starting at
    /// `first_seq + 1`.
    pub first_seq: SeqNum,
    /// Interval (in ticks) between heartbeats. Lets the consumer adjust its
    /// timeouts for detecting a failed producer.
    pub heartbeat_interval: TickInterval,
}

/// Transmits one ordered payload to a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event<P> {
    pub seq: SeqNum,
    pub content: P,
}

/// Tells a consumer that the producer can no longer retransmit an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetransmitFailed {
    pub seq: SeqNum,
}

/// Tells all consumers that the producer is still alive and what the latest
/// sequence number is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub seq: SeqNum,
}

/// Tells the producer that a consumer received all events up to and
/// including `seq`. Consumers repeat their latest ACK periodically as a
/// keepalive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeAck {
    pub seq: SeqNum,
}

/// Tells the producer that a consumer failed to receive some events.
///
/// `seqs` is sorted ascending. The single-element list `[SeqNum::ZERO]` is
/// the special request "please re-send the handshake".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nack {
    pub seqs: Vec<SeqNum>,
}

/// Messages sent by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProducerMessage<P> {
    Handshake(Handshake),
    Event(Event<P>),
    RetransmitFailed(RetransmitFailed),
    Heartbeat(Heartbeat),
}

/// Messages sent by a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumerMessage {
    CumulativeAck(CumulativeAck),
    Nack(Nack),
}
