//! Producer half of the reliable-ordered channel.
//!
//! The producer assigns monotonically increasing sequence numbers to
//! payloads, broadcasts them, and retains every event in a retransmission
//! buffer until all registered consumers have cumulatively acknowledged it.
//! Selective NACKs are answered from that buffer; events that have already
//! been evicted are answered with `RetransmitFailed` so the consumer can
//! decide locally whether to tolerate the gap.
//!
//! Time is logical: the host calls [`Producer::tick`] at a fixed cadence and
//! every timeout in the protocol is expressed in ticks.

use std::collections::VecDeque;

use thiserror::Error;

use crate::channel::backend::ProducerBackend;
use crate::channel::message::{Event, Handshake, Heartbeat, ProducerMessage, RetransmitFailed};
use crate::channel::types::{SeqNum, TickInterval};
use crate::trace::{debug, trace};

/// Default number of ticks between heartbeats when nothing else is
/// broadcast. 0 disables heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: TickInterval = 5;

/// Errors surfaced to the host by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// A consumer with this handle is already registered.
    #[error("consumer is already registered on this channel")]
    ConsumerExists,
}

/// Bookkeeping state for one consumer.
///
/// # Invariants
///
/// - `offset <= acked <= producer.seq`
/// - `first_acked <= last_acked`
#[derive(Debug, Clone)]
pub struct Path<H> {
    /// Allows the backend to uniquely address this consumer.
    hdl: H,
    /// The sequence number that was active when adding this consumer.
    offset: SeqNum,
    /// The sequence number of the last cumulative ACK.
    acked: SeqNum,
    /// The first tick at which we received a cumulative ACK for `acked`.
    first_acked: u64,
    /// The last tick at which we received a cumulative ACK for `acked`.
    last_acked: u64,
}

impl<H> Path<H> {
    /// Returns the handle addressing this consumer.
    #[must_use]
    pub const fn handle(&self) -> &H {
        &self.hdl
    }

    /// Returns the sequence number that was active when this consumer was
    /// added.
    #[must_use]
    pub const fn offset(&self) -> SeqNum {
        self.offset
    }

    /// Returns the highest cumulatively acknowledged sequence number.
    #[must_use]
    pub const fn acked(&self) -> SeqNum {
        self.acked
    }

    /// Returns the tick at which `acked` first reached its current value.
    #[must_use]
    pub const fn first_acked(&self) -> u64 {
        self.first_acked
    }

    /// Returns the last tick at which this consumer confirmed `acked`.
    ///
    /// Hosts detect peer loss by comparing this against the current tick.
    #[must_use]
    pub const fn last_acked(&self) -> u64 {
        self.last_acked
    }
}

/// Produces events for any number of consumers.
///
/// # Invariants
///
/// - Sequence numbers in `buf` are strictly increasing; `buf.front()` is the
///   oldest event not yet acknowledged by every consumer.
/// - Every event with `seq <= min(path.acked)` has been erased from `buf`.
pub struct Producer<H, P, B> {
    /// Transmits messages to the consumers.
    backend: B,
    /// Highest sequence number assigned so far (starts at 0; the first
    /// event carries 1).
    seq: SeqNum,
    /// Monotonically increasing logical clock.
    tick: u64,
    /// The tick at which we last broadcast anything.
    last_broadcast: u64,
    /// Events retained for retransmission.
    buf: VecDeque<Event<P>>,
    /// One entry per registered consumer.
    paths: Vec<Path<H>>,
    /// Maximum number of silent ticks before a heartbeat is broadcast.
    heartbeat_interval: TickInterval,
}

impl<H, P, B> Producer<H, P, B>
where
    H: PartialEq,
    P: Clone,
    B: ProducerBackend<H, P>,
{
    /// Creates a producer that transmits through `backend`.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            seq: SeqNum::ZERO,
            tick: 0,
            last_broadcast: 0,
            buf: VecDeque::new(),
            paths: Vec::new(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    /// Assigns the next sequence number to `content` and broadcasts it.
    ///
    /// With no registered consumers the payload is dropped: there is nobody
    /// to retain it for.
    pub fn produce(&mut self, content: P) {
        if self.paths.is_empty() {
            trace!("produce without consumers, dropping payload");
            return;
        }
        self.seq = self.seq.next();
        let event = Event {
            seq: self.seq,
            content,
        };
        self.buf.push_back(event.clone());
        self.last_broadcast = self.tick;
        self.backend.broadcast(ProducerMessage::Event(event));
    }

    /// Registers a new consumer and unicasts it a handshake.
    ///
    /// The handshake tells the consumer that the first sequence number it
    /// should expect is `seq + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ConsumerExists`] if a path with this handle
    /// is already registered.
    pub fn add(&mut self, hdl: H) -> Result<(), ChannelError> {
        if self.find_path(&hdl).is_some() {
            return Err(ChannelError::ConsumerExists);
        }
        self.paths.push(Path {
            hdl,
            offset: self.seq,
            acked: self.seq,
            first_acked: self.tick,
            last_acked: self.tick,
        });
        let handshake = ProducerMessage::Handshake(Handshake {
            first_seq: self.seq,
            heartbeat_interval: self.heartbeat_interval,
        });
        let hdl = &self.paths[self.paths.len() - 1].hdl;
        self.backend.send(hdl, handshake);
        Ok(())
    }

    /// Processes a cumulative ACK from the consumer addressed by `hdl`.
    ///
    /// Stale ACKs (below the path's current `acked`) are ignored. Repeated
    /// ACKs only refresh the path's `last_acked` tick. A new ACK advances
    /// the path and erases every event from the buffer head that all
    /// consumers have now acknowledged.
    pub fn handle_ack(&mut self, hdl: &H, seq: SeqNum) {
        let tick = self.tick;
        let Some(path) = self.paths.iter_mut().find(|p| &p.hdl == hdl) else {
            debug!("ACK from unknown consumer, ignoring");
            return;
        };
        if path.acked > seq {
            // A blast from the past.
            trace!("stale ACK {}, path already at {}", seq, path.acked);
            return;
        }
        if path.acked == seq {
            // Old news; only note that the consumer is alive.
            path.last_acked = tick;
            return;
        }
        path.acked = seq;
        path.first_acked = tick;
        path.last_acked = tick;
        let min_acked = self
            .paths
            .iter()
            .map(|p| p.acked)
            .min()
            .unwrap_or(SeqNum::ZERO);
        while let Some(front) = self.buf.front() {
            if front.seq > min_acked {
                break;
            }
            self.buf.pop_front();
        }
    }

    /// Processes a NACK listing missing sequence numbers (sorted ascending).
    ///
    /// `seqs[0] == 0` requests a fresh handshake. Otherwise `seqs[0] - 1` is
    /// taken as an implicit cumulative ACK, and each listed event is either
    /// retransmitted from the buffer or answered with `RetransmitFailed`.
    pub fn handle_nack(&mut self, hdl: &H, seqs: &[SeqNum]) {
        let Some(first) = seqs.first().copied() else {
            return;
        };
        let Some(path) = self.find_path(hdl) else {
            debug!("NACK from unknown consumer, ignoring");
            return;
        };
        if first == SeqNum::ZERO {
            // The consumer lost its handshake state; resynchronize it.
            let handshake = ProducerMessage::Handshake(Handshake {
                first_seq: path.offset(),
                heartbeat_interval: self.heartbeat_interval,
            });
            self.backend.send(hdl, handshake);
            return;
        }
        self.handle_ack(hdl, SeqNum::new(first.as_u64() - 1));
        for &seq in seqs {
            let msg = match self.find_event(seq) {
                Some(event) => ProducerMessage::Event(event.clone()),
                None => {
                    debug!("event {seq} evicted, answering with retransmit-failed");
                    ProducerMessage::RetransmitFailed(RetransmitFailed { seq })
                }
            };
            self.backend.send(hdl, msg);
        }
    }

    /// Advances the logical clock by one tick.
    ///
    /// Broadcasts a heartbeat when exactly `heartbeat_interval` ticks have
    /// passed since the last broadcast; any regular broadcast resets the
    /// timer.
    pub fn tick(&mut self) {
        self.tick += 1;
        if self.heartbeat_interval > 0
            && self.last_broadcast + u64::from(self.heartbeat_interval) == self.tick
        {
            self.last_broadcast = self.tick;
            self.backend
                .broadcast(ProducerMessage::Heartbeat(Heartbeat { seq: self.seq }));
        }
    }

    /// Returns true if every consumer has acknowledged the latest event.
    #[must_use]
    pub fn idle(&self) -> bool {
        self.paths.iter().all(|p| p.acked == self.seq)
    }

    /// Returns the highest sequence number assigned so far.
    #[must_use]
    pub const fn seq(&self) -> SeqNum {
        self.seq
    }

    /// Returns the number of ticks elapsed.
    #[must_use]
    pub const fn num_ticks(&self) -> u64 {
        self.tick
    }

    /// Returns the retransmission buffer.
    #[must_use]
    pub const fn buf(&self) -> &VecDeque<Event<P>> {
        &self.buf
    }

    /// Returns the per-consumer bookkeeping records.
    #[must_use]
    pub fn paths(&self) -> &[Path<H>] {
        &self.paths
    }

    /// Returns the heartbeat interval in ticks (0 = disabled).
    #[must_use]
    pub const fn heartbeat_interval(&self) -> TickInterval {
        self.heartbeat_interval
    }

    /// Sets the heartbeat interval in ticks (0 disables heartbeats).
    pub fn set_heartbeat_interval(&mut self, value: TickInterval) {
        self.heartbeat_interval = value;
    }

    /// Returns the backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the backend mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn find_path(&self, hdl: &H) -> Option<&Path<H>> {
        self.paths.iter().find(|p| &p.hdl == hdl)
    }

    fn find_event(&self, seq: SeqNum) -> Option<&Event<P>> {
        self.buf.iter().find(|e| e.seq == seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::message::ProducerMessage;

    type Msg = ProducerMessage<&'static str>;

    /// Records every outgoing message instead of transmitting it.
    #[derive(Default)]
    struct RecordingBackend {
        sent: Vec<(u32, Msg)>,
        broadcasts: Vec<Msg>,
    }

    impl ProducerBackend<u32, &'static str> for RecordingBackend {
        fn send(&mut self, hdl: &u32, msg: Msg) {
            self.sent.push((*hdl, msg));
        }

        fn broadcast(&mut self, msg: Msg) {
            self.broadcasts.push(msg);
        }
    }

    fn producer() -> Producer<u32, &'static str, RecordingBackend> {
        Producer::new(RecordingBackend::default())
    }

    fn seq(n: u64) -> SeqNum {
        SeqNum::new(n)
    }

    /// Verifies the documented buffer and path invariants.
    fn assert_invariants(p: &Producer<u32, &'static str, RecordingBackend>) {
        let mut prev = None;
        for event in p.buf() {
            if let Some(prev) = prev {
                assert!(event.seq > prev, "buffer sequences must strictly increase");
            }
            prev = Some(event.seq);
        }
        for path in p.paths() {
            assert!(path.offset() <= path.acked(), "offset must not exceed acked");
            assert!(path.acked() <= p.seq(), "acked must not exceed seq");
            assert!(path.first_acked() <= path.last_acked());
        }
        if let Some(min_acked) = p.paths().iter().map(Path::acked).min() {
            if let Some(front) = p.buf().front() {
                assert!(front.seq > min_acked, "acknowledged events must be erased");
            }
        }
    }

    #[test]
    fn produce_without_consumers_drops_payload() {
        let mut p = producer();
        p.produce("a");
        assert_eq!(p.seq(), seq(0));
        assert!(p.buf().is_empty());
        assert!(p.backend().broadcasts.is_empty());
        assert_invariants(&p);
    }

    #[test]
    fn add_sends_handshake() {
        let mut p = producer();
        p.add(1).unwrap();

        assert_eq!(p.paths().len(), 1);
        assert_eq!(p.paths()[0].offset(), seq(0));
        assert_eq!(
            p.backend().sent,
            vec![(
                1,
                ProducerMessage::Handshake(Handshake {
                    first_seq: seq(0),
                    heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
                })
            )]
        );
        assert_invariants(&p);
    }

    #[test]
    fn add_duplicate_handle_fails() {
        let mut p = producer();
        p.add(1).unwrap();
        assert_eq!(p.add(1), Err(ChannelError::ConsumerExists));
        assert_eq!(p.paths().len(), 1);
    }

    #[test]
    fn add_mid_stream_uses_current_seq_as_offset() {
        let mut p = producer();
        p.add(1).unwrap();
        p.produce("a");
        p.produce("b");
        p.add(2).unwrap();

        assert_eq!(p.paths()[1].offset(), seq(2));
        assert_eq!(p.paths()[1].acked(), seq(2));
        let (_, last) = p.backend().sent.last().unwrap();
        assert_eq!(
            *last,
            ProducerMessage::Handshake(Handshake {
                first_seq: seq(2),
                heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            })
        );
        assert_invariants(&p);
    }

    #[test]
    fn produce_broadcasts_and_buffers() {
        let mut p = producer();
        p.add(1).unwrap();
        p.produce("a");
        p.produce("b");

        assert_eq!(p.seq(), seq(2));
        assert_eq!(p.buf().len(), 2);
        assert_eq!(
            p.backend().broadcasts,
            vec![
                ProducerMessage::Event(Event {
                    seq: seq(1),
                    content: "a"
                }),
                ProducerMessage::Event(Event {
                    seq: seq(2),
                    content: "b"
                }),
            ]
        );
        assert_invariants(&p);
    }

    #[test]
    fn ack_erases_acknowledged_prefix() {
        let mut p = producer();
        p.add(1).unwrap();
        p.produce("a");
        p.produce("b");
        p.produce("c");

        p.handle_ack(&1, seq(2));
        assert_eq!(p.buf().len(), 1);
        assert_eq!(p.buf().front().unwrap().seq, seq(3));
        assert!(!p.idle());

        p.handle_ack(&1, seq(3));
        assert!(p.buf().is_empty());
        assert!(p.idle());
        assert_invariants(&p);
    }

    #[test]
    fn buffer_trims_to_minimum_across_consumers() {
        let mut p = producer();
        p.add(1).unwrap();
        p.add(2).unwrap();
        for payload in ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"] {
            p.produce(payload);
        }

        p.handle_ack(&1, seq(10));
        p.handle_ack(&2, seq(7));

        let remaining: Vec<_> = p.buf().iter().map(|e| e.seq.as_u64()).collect();
        assert_eq!(remaining, vec![8, 9, 10]);
        assert_invariants(&p);
    }

    #[test]
    fn stale_ack_is_ignored() {
        let mut p = producer();
        p.add(1).unwrap();
        p.produce("a");
        p.produce("b");
        p.handle_ack(&1, seq(2));

        p.handle_ack(&1, seq(1));
        assert_eq!(p.paths()[0].acked(), seq(2));
        assert_invariants(&p);
    }

    #[test]
    fn repeated_ack_refreshes_last_acked_only() {
        let mut p = producer();
        p.add(1).unwrap();
        p.produce("a");
        p.handle_ack(&1, seq(1));
        let first = p.paths()[0].first_acked();

        p.tick();
        p.tick();
        p.handle_ack(&1, seq(1));

        assert_eq!(p.paths()[0].first_acked(), first);
        assert_eq!(p.paths()[0].last_acked(), 2);
        assert_invariants(&p);
    }

    #[test]
    fn ack_from_unknown_consumer_is_ignored() {
        let mut p = producer();
        p.add(1).unwrap();
        p.produce("a");

        p.handle_ack(&99, seq(1));
        assert_eq!(p.buf().len(), 1);
        assert_invariants(&p);
    }

    #[test]
    fn nack_retransmits_buffered_events() {
        let mut p = producer();
        p.add(1).unwrap();
        p.produce("a");
        p.produce("b");
        p.produce("c");
        p.backend_mut().sent.clear();

        p.handle_nack(&1, &[seq(2)]);

        // seqs[0] - 1 is an implicit cumulative ACK.
        assert_eq!(p.paths()[0].acked(), seq(1));
        assert_eq!(
            p.backend().sent,
            vec![(
                1,
                ProducerMessage::Event(Event {
                    seq: seq(2),
                    content: "b"
                })
            )]
        );
        assert_invariants(&p);
    }

    #[test]
    fn nack_for_evicted_event_answers_retransmit_failed() {
        let mut p = producer();
        p.add(1).unwrap();
        p.add(2).unwrap();
        p.produce("a");
        p.produce("b");
        p.handle_ack(&1, seq(2));
        p.handle_ack(&2, seq(2));
        assert!(p.buf().is_empty());
        p.backend_mut().sent.clear();

        p.handle_nack(&1, &[seq(1)]);

        assert_eq!(
            p.backend().sent,
            vec![(
                1,
                ProducerMessage::RetransmitFailed(RetransmitFailed { seq: seq(1) })
            )]
        );
    }

    #[test]
    fn nack_zero_resends_handshake_with_offset() {
        let mut p = producer();
        p.produce("dropped");
        p.add(1).unwrap();
        p.produce("a");
        p.backend_mut().sent.clear();

        p.handle_nack(&1, &[SeqNum::ZERO]);

        assert_eq!(
            p.backend().sent,
            vec![(
                1,
                ProducerMessage::Handshake(Handshake {
                    first_seq: seq(0),
                    heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
                })
            )]
        );
        // No implicit ACK, no retransmissions.
        assert_eq!(p.paths()[0].acked(), seq(0));
        assert_eq!(p.buf().len(), 1);
    }

    #[test]
    fn empty_nack_and_unknown_handle_are_ignored() {
        let mut p = producer();
        p.add(1).unwrap();
        p.produce("a");
        p.backend_mut().sent.clear();

        p.handle_nack(&1, &[]);
        p.handle_nack(&99, &[seq(1)]);

        assert!(p.backend().sent.is_empty());
    }

    #[test]
    fn heartbeat_fires_once_per_silent_interval() {
        let mut p = producer();
        p.add(1).unwrap();

        for _ in 0..15 {
            p.tick();
        }

        let heartbeats: Vec<_> = p
            .backend()
            .broadcasts
            .iter()
            .filter(|m| matches!(m, ProducerMessage::Heartbeat(_)))
            .collect();
        assert_eq!(heartbeats.len(), 3);
    }

    #[test]
    fn broadcast_resets_heartbeat_timer() {
        let mut p = producer();
        p.add(1).unwrap();

        p.tick();
        p.tick();
        p.produce("a");
        for _ in 0..4 {
            p.tick();
        }

        // The produce at tick 2 delays the heartbeat until tick 7.
        assert!(!p
            .backend()
            .broadcasts
            .iter()
            .any(|m| matches!(m, ProducerMessage::Heartbeat(_))));

        p.tick();
        assert!(matches!(
            p.backend().broadcasts.last(),
            Some(ProducerMessage::Heartbeat(Heartbeat { seq })) if *seq == SeqNum::new(1)
        ));
    }

    #[test]
    fn zero_interval_disables_heartbeats() {
        let mut p = producer();
        p.set_heartbeat_interval(0);
        p.add(1).unwrap();

        for _ in 0..20 {
            p.tick();
        }
        assert!(p.backend().broadcasts.is_empty());
    }

    #[test]
    fn idle_with_no_consumers() {
        let p = producer();
        assert!(p.idle());
    }
}
