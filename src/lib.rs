//! Reliable-ordered channel transport for a publish/subscribe broker.
//!
//! The underlying communication layer is assumed to be unreliable and
//! unordered: messages may be lost, duplicated, reordered, or delayed. The
//! [`channel`] module reconstructs a totally ordered, gap-free,
//! at-most-once-delivered event stream per producer, with bounded
//! retransmission buffers and tick-driven liveness signals. The remaining
//! modules carry the value types and peering bookkeeping a broker endpoint
//! needs around that core.

pub mod channel;
pub mod net;
pub mod peering;
pub mod status;

mod trace;

pub use channel::{
    ChannelError, Consumer, ConsumerBackend, ConsumerMessage, Event, Producer, ProducerBackend,
    ProducerMessage, SeqNum, TickInterval,
};
pub use trace::init_tracing;
