//! Reliable-ordered message channel over an unreliable, unordered layer.
//!
//! A channel belongs to a single [`Producer`] with any number of
//! [`Consumer`]s. The producer assigns sequence numbers and retains events
//! for retransmission; consumers reorder, detect gaps, and acknowledge
//! cumulatively. Both sides are single-threaded state machines driven by
//! explicit `tick()` calls, which keeps the whole protocol deterministic
//! under a simulated clock.

pub mod backend;
pub mod consumer;
pub mod message;
pub mod producer;
pub mod types;
pub mod wire;

pub use backend::{ConsumerBackend, ProducerBackend};
pub use consumer::{Consumer, EventSlot, DEFAULT_NACK_TIMEOUT};
pub use message::{
    ConsumerMessage, CumulativeAck, Event, Handshake, Heartbeat, Nack, ProducerMessage,
    RetransmitFailed,
};
pub use producer::{ChannelError, Path, Producer, DEFAULT_HEARTBEAT_INTERVAL};
pub use types::{SeqNum, TickInterval};
pub use wire::{Wire, WireError};
