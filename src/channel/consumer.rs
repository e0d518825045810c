//! Consumer half of the reliable-ordered channel.
//!
//! The consumer receives events in any order, reorders them, and hands them
//! to its backend strictly in sequence. Gaps are detected against the
//! highest sequence number the producer has announced (through events or
//! heartbeats) and reported with a selective NACK after `nack_timeout`
//! ticks without progress. An event the producer admits it can no longer
//! retransmit is surfaced through the backend's `consume_nil` hook, which
//! decides whether the stream continues past the hole or shuts down.
//!
//! # Design
//!
//! - `next_seq` is the next sequence to deliver (low water mark).
//! - `last_seq` is the currently known end of the event stream.
//! - The reorder buffer holds slots with `seq >= next_seq`, strictly
//!   increasing, no duplicates. A slot distinguishes a *received* event
//!   (payload present) from a *known-lost* one (payload absent); sequences
//!   with no slot at all are merely pending. Known-lost slots are not
//!   NACKed again, pending ones are.

use std::collections::VecDeque;

use crate::channel::backend::ConsumerBackend;
use crate::channel::message::{ConsumerMessage, CumulativeAck, Nack};
use crate::channel::types::{SeqNum, TickInterval};
use crate::trace::{debug, trace, warn};

/// Default number of ticks without progress before a NACK is sent.
pub const DEFAULT_NACK_TIMEOUT: TickInterval = 5;

/// A slot in the reorder buffer.
///
/// A slot without content represents an event the producer reported as no
/// longer retransmittable. A late arrival of the real event may still fill
/// it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSlot<P> {
    seq: SeqNum,
    content: Option<P>,
}

impl<P> EventSlot<P> {
    const fn received(seq: SeqNum, content: P) -> Self {
        Self {
            seq,
            content: Some(content),
        }
    }

    const fn lost(seq: SeqNum) -> Self {
        Self { seq, content: None }
    }

    /// Returns the sequence number of this slot.
    #[must_use]
    pub const fn seq(&self) -> SeqNum {
        self.seq
    }

    /// Returns the buffered payload, or `None` for a known-lost event.
    #[must_use]
    pub const fn content(&self) -> Option<&P> {
        self.content.as_ref()
    }
}

/// Handles events from a single producer.
///
/// # Invariants
///
/// - `next_seq <= last_seq` once the handshake has arrived.
/// - Buffer slots have `seq >= next_seq` and strictly increasing sequence
///   numbers.
/// - After `close` has fired, no further backend calls are made.
pub struct Consumer<P, B: ConsumerBackend<P>> {
    /// Handles incoming events and outgoing feedback.
    backend: B,
    /// The next sequence number ready for delivery (0 until the handshake).
    next_seq: SeqNum,
    /// The currently known end of the event stream.
    last_seq: SeqNum,
    /// Out-of-order and known-lost events awaiting delivery.
    buf: VecDeque<EventSlot<P>>,
    /// Monotonically increasing logical clock.
    tick: u64,
    /// Value of `next_seq` at the previous tick.
    last_tick_seq: SeqNum,
    /// Number of ticks without delivery progress.
    idle_ticks: u16,
    /// Frequency of ACK messages (configured by the producer's handshake).
    heartbeat_interval: TickInterval,
    /// Number of idle ticks before sending a NACK.
    nack_timeout: TickInterval,
    /// Set once `close` has fired; every entry point is a no-op afterward.
    closed: bool,
}

impl<P, B: ConsumerBackend<P>> Consumer<P, B> {
    /// Creates a consumer that delivers through `backend`.
    ///
    /// The consumer stays uninitialized (`next_seq == 0`) until the
    /// producer's handshake arrives.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            next_seq: SeqNum::ZERO,
            last_seq: SeqNum::ZERO,
            buf: VecDeque::new(),
            tick: 0,
            last_tick_seq: SeqNum::ZERO,
            idle_ticks: 0,
            heartbeat_interval: 0,
            nack_timeout: DEFAULT_NACK_TIMEOUT,
            closed: false,
        }
    }

    /// Processes the producer's handshake.
    ///
    /// Sets up delivery to start at `offset + 1`. A handshake that would
    /// rewind the stream (lower offset than already reached) is ignored.
    pub fn handle_handshake(&mut self, offset: SeqNum, heartbeat_interval: TickInterval) {
        if self.closed {
            return;
        }
        if offset >= self.next_seq {
            self.next_seq = offset.next();
            self.last_seq = self.next_seq;
            self.heartbeat_interval = heartbeat_interval;
            // Events that arrived before the handshake may predate the
            // offset; they were delivered to earlier subscribers only.
            while self
                .buf
                .front()
                .is_some_and(|slot| slot.seq < self.next_seq)
            {
                self.buf.pop_front();
            }
            self.try_consume_buffer();
        }
    }

    /// Processes a producer heartbeat announcing the latest sequence number.
    ///
    /// Ignored before the handshake and while the producer has not produced
    /// anything yet.
    pub fn handle_heartbeat(&mut self, seq: SeqNum) {
        if self.closed {
            return;
        }
        if self.last_seq == SeqNum::ZERO || seq == SeqNum::ZERO {
            return;
        }
        if seq.next() > self.last_seq {
            self.last_seq = seq.next();
        }
    }

    /// Processes one event.
    ///
    /// In-order events are delivered immediately (followed by whatever the
    /// buffer can now contribute); future events are buffered; duplicates
    /// and already-delivered sequences are dropped.
    pub fn handle_event(&mut self, seq: SeqNum, content: P) {
        if self.closed {
            return;
        }
        if seq == self.next_seq {
            self.backend.consume(content);
            self.bump_seq();
            self.try_consume_buffer();
        } else if seq > self.next_seq {
            if seq > self.last_seq {
                self.last_seq = seq;
            }
            match self.buf.iter().position(|slot| slot.seq >= seq) {
                None => self.buf.push_back(EventSlot::received(seq, content)),
                Some(i) if self.buf[i].seq != seq => {
                    self.buf.insert(i, EventSlot::received(seq, content));
                }
                Some(i) => {
                    // A late arrival may resurrect a slot previously marked
                    // as lost; a real duplicate is dropped.
                    let slot = &mut self.buf[i];
                    if slot.content.is_none() {
                        slot.content = Some(content);
                    } else {
                        trace!("duplicate event {}, dropping", seq);
                    }
                }
            }
        } else {
            trace!("event {} already delivered, dropping", seq);
        }
    }

    /// Processes the producer's notice that `seq` can no longer be
    /// retransmitted.
    ///
    /// At the delivery frontier this immediately consults `consume_nil`;
    /// ahead of it an empty slot is recorded unless the event (or an earlier
    /// notice) already occupies that position.
    pub fn handle_retransmit_failed(&mut self, seq: SeqNum) {
        if self.closed {
            return;
        }
        if seq == self.next_seq {
            if let Err(err) = self.backend.consume_nil() {
                self.close(err);
                return;
            }
            self.bump_seq();
            self.try_consume_buffer();
        } else if seq > self.next_seq {
            debug!("event {} reported lost ahead of the frontier", seq);
            match self.buf.iter().position(|slot| slot.seq >= seq) {
                None => self.buf.push_back(EventSlot::lost(seq)),
                Some(i) if self.buf[i].seq != seq => self.buf.insert(i, EventSlot::lost(seq)),
                // A buffered payload outranks the loss notice.
                Some(_) => {}
            }
        }
    }

    /// Advances the logical clock by one tick.
    ///
    /// Emits a cumulative ACK every `heartbeat_interval` ticks and, after
    /// `nack_timeout` ticks without progress while events are known to be
    /// outstanding, a NACK listing every missing sequence number.
    pub fn tick(&mut self) {
        if self.closed {
            return;
        }
        let progressed = self.next_seq > self.last_tick_seq;
        self.last_tick_seq = self.next_seq;
        self.tick += 1;
        if progressed {
            self.idle_ticks = 0;
            if self.ack_due() {
                self.send_ack();
            }
            return;
        }
        self.idle_ticks += 1;
        if self.next_seq < self.last_seq && self.idle_ticks >= self.nack_timeout {
            self.idle_ticks = 0;
            let seqs = self.missing_seqs();
            debug!("no progress for {} ticks, NACKing {} events", self.nack_timeout, seqs.len());
            self.backend.send(ConsumerMessage::Nack(Nack { seqs }));
            return;
        }
        if self.ack_due() {
            self.send_ack();
        }
    }

    /// Returns the reorder buffer.
    #[must_use]
    pub const fn buf(&self) -> &VecDeque<EventSlot<P>> {
        &self.buf
    }

    /// Returns the number of ticks elapsed.
    #[must_use]
    pub const fn num_ticks(&self) -> u64 {
        self.tick
    }

    /// Returns the number of ticks since delivery last progressed.
    #[must_use]
    pub const fn idle_ticks(&self) -> u16 {
        self.idle_ticks
    }

    /// Returns the next sequence number ready for delivery.
    #[must_use]
    pub const fn next_seq(&self) -> SeqNum {
        self.next_seq
    }

    /// Returns the currently known end of the event stream.
    #[must_use]
    pub const fn last_seq(&self) -> SeqNum {
        self.last_seq
    }

    /// Returns the heartbeat interval announced by the producer (0 until
    /// the handshake).
    #[must_use]
    pub const fn heartbeat_interval(&self) -> TickInterval {
        self.heartbeat_interval
    }

    /// Returns the NACK timeout in idle ticks.
    #[must_use]
    pub const fn nack_timeout(&self) -> TickInterval {
        self.nack_timeout
    }

    /// Sets the NACK timeout in idle ticks.
    pub fn set_nack_timeout(&mut self, value: TickInterval) {
        self.nack_timeout = value;
    }

    /// Returns true once `close` has fired.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
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

    /// Advances the delivery frontier past one delivered (or tolerated)
    /// event.
    fn bump_seq(&mut self) {
        self.next_seq = self.next_seq.next();
        if self.next_seq > self.last_seq {
            self.last_seq = self.next_seq;
        }
    }

    /// Delivers buffered events until the end of the buffer or the first
    /// gap, whichever comes first.
    fn try_consume_buffer(&mut self) {
        loop {
            match self.buf.front() {
                Some(slot) if slot.seq == self.next_seq => {}
                _ => return,
            }
            let Some(slot) = self.buf.pop_front() else {
                return;
            };
            match slot.content {
                Some(payload) => self.backend.consume(payload),
                None => {
                    if let Err(err) = self.backend.consume_nil() {
                        self.close(err);
                        return;
                    }
                }
            }
            self.bump_seq();
        }
    }

    /// Collects the sequence numbers in `[next_seq, last_seq)` without a
    /// buffer slot, in ascending order.
    fn missing_seqs(&self) -> Vec<SeqNum> {
        let last = self.last_seq.as_u64();
        let mut seqs = Vec::new();
        let mut cursor = self.next_seq.as_u64();
        for slot in &self.buf {
            let present = slot.seq.as_u64();
            if present >= last {
                break;
            }
            seqs.extend((cursor..present).map(SeqNum::new));
            cursor = present + 1;
        }
        seqs.extend((cursor..last).map(SeqNum::new));
        seqs
    }

    fn ack_due(&self) -> bool {
        self.heartbeat_interval > 0 && self.tick % u64::from(self.heartbeat_interval) == 0
    }

    fn send_ack(&mut self) {
        let seq = SeqNum::new(self.next_seq.as_u64().saturating_sub(1));
        self.backend
            .send(ConsumerMessage::CumulativeAck(CumulativeAck { seq }));
    }

    fn close(&mut self, err: B::Error) {
        warn!("closing consumer after sink error");
        self.closed = true;
        self.backend.close(err);
    }
}
