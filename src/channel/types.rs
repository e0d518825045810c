//! Sequencing primitives shared by the producer and consumer state machines.
//!
//! Sequence numbers are u64 for wrap-safety: at a thousand events per second
//! a counter of this width lasts longer than the host hardware will.
//! Logical time is counted in plain `u64` ticks; configurable intervals
//! (heartbeat cadence, NACK timeout) fit in a `u16`.

use serde::{Deserialize, Serialize};

/// Sequence number of a channel event.
///
/// `SeqNum::ZERO` is a sentinel meaning "before any event"; the first
/// produced event carries sequence 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct SeqNum(u64);

impl SeqNum {
    /// Sentinel preceding the first real event.
    pub const ZERO: Self = Self(0);

    /// Creates a sequence number from a raw counter value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Next sequence number.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl From<u64> for SeqNum {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl From<SeqNum> for u64 {
    fn from(s: SeqNum) -> Self {
        s.0
    }
}

impl std::fmt::Display for SeqNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Number of ticks between two recurring protocol actions.
///
/// A value of 0 disables the action in question.
pub type TickInterval = u16;
