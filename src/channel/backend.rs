//! Backend capability traits: the channel's only contact with the
//! underlying (unreliable) communication layer.
//!
//! Backends are type parameters of the producer and consumer, so the hot
//! paths are monomorphized rather than dynamically dispatched. None of the
//! methods may block, and none may re-enter the channel that invoked them.

use crate::channel::message::{ConsumerMessage, ProducerMessage};

/// Transmits messages on behalf of a [`Producer`](crate::channel::Producer).
///
/// `H` uniquely addresses one consumer; `P` is the payload type.
pub trait ProducerBackend<H, P> {
    /// Unicast `msg` to the consumer addressed by `hdl`.
    fn send(&mut self, hdl: &H, msg: ProducerMessage<P>);

    /// Fan `msg` out to all known consumers.
    fn broadcast(&mut self, msg: ProducerMessage<P>);
}

/// Handles delivery and feedback on behalf of a
/// [`Consumer`](crate::channel::Consumer).
pub trait ConsumerBackend<P> {
    /// Error produced when a lost event cannot be tolerated.
    type Error;

    /// Process one in-order event.
    fn consume(&mut self, payload: P);

    /// Process a lost event. Returning an error aborts delivery: the
    /// consumer immediately calls [`close`](Self::close) with it and stops.
    fn consume_nil(&mut self) -> Result<(), Self::Error>;

    /// Send feedback to the producer.
    fn send(&mut self, msg: ConsumerMessage);

    /// Drop this consumer. After this call the consumer makes no further
    /// calls into the backend.
    fn close(&mut self, err: Self::Error);
}
