//! Byte-level codec for channel messages.
//!
//! Every message is a tagged record; field order is the serialization
//! contract. All multi-byte integers are little-endian. Event payloads are
//! embedded as length-prefixed `postcard` blobs so the channel never has to
//! inspect them.
//!
//! # Wire Format
//!
//! | Message           | Layout                                        |
//! |-------------------|-----------------------------------------------|
//! | Handshake         | `[tag:1][first_seq:8][heartbeat_interval:2]`  |
//! | Event             | `[tag:1][seq:8][len:4][payload:len]`          |
//! | RetransmitFailed  | `[tag:1][seq:8]`                              |
//! | Heartbeat         | `[tag:1][seq:8]`                              |
//! | CumulativeAck     | `[tag:1][seq:8]`                              |
//! | Nack              | `[tag:1][count:4][seq:8]*count`               |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::message::{
    ConsumerMessage, CumulativeAck, Event, Handshake, Heartbeat, Nack, ProducerMessage,
    RetransmitFailed,
};
use crate::channel::types::SeqNum;

/// Marker trait for payload types that can cross the wire.
///
/// Automatically implemented for all `Serialize + Deserialize` types.
pub trait Wire: Serialize + for<'de> Deserialize<'de> {}
impl<T> Wire for T where T: Serialize + for<'de> Deserialize<'de> {}

/// Message tag bytes.
///
/// Producer-to-consumer tags occupy 0x01-0x04, consumer-to-producer tags
/// 0x05-0x06.
pub mod message_tag {
    pub const HANDSHAKE: u8 = 0x01;
    pub const EVENT: u8 = 0x02;
    pub const RETRANSMIT_FAILED: u8 = 0x03;
    pub const HEARTBEAT: u8 = 0x04;
    pub const CUMULATIVE_ACK: u8 = 0x05;
    pub const NACK: u8 = 0x06;
}

/// Errors during message encode/decode.
#[derive(Debug, Error)]
pub enum WireError {
    /// Buffer too small to decode the message.
    #[error("buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },
    /// Unknown message tag.
    #[error("unknown message tag: 0x{0:02x}")]
    UnknownTag(u8),
    /// Payload serialization or deserialization failed.
    #[error("malformed payload: {0}")]
    Payload(#[from] postcard::Error),
}

/// Writer for encoding messages.
struct MessageWriter<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> MessageWriter<'a> {
    fn new(buf: &'a mut Vec<u8>) -> Self {
        buf.clear();
        Self { buf }
    }

    fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

/// Reader for decoding messages.
struct MessageReader<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> MessageReader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, cursor: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    fn take_u8(&mut self) -> Result<u8, WireError> {
        if self.remaining() < 1 {
            return Err(WireError::BufferTooSmall {
                need: 1,
                have: self.remaining(),
            });
        }
        let v = self.buf[self.cursor];
        self.cursor += 1;
        Ok(v)
    }

    fn take_u16(&mut self) -> Result<u16, WireError> {
        if self.remaining() < 2 {
            return Err(WireError::BufferTooSmall {
                need: 2,
                have: self.remaining(),
            });
        }
        let mut arr = [0u8; 2];
        arr.copy_from_slice(&self.buf[self.cursor..self.cursor + 2]);
        self.cursor += 2;
        Ok(u16::from_le_bytes(arr))
    }

    fn take_u32(&mut self) -> Result<u32, WireError> {
        if self.remaining() < 4 {
            return Err(WireError::BufferTooSmall {
                need: 4,
                have: self.remaining(),
            });
        }
        let mut arr = [0u8; 4];
        arr.copy_from_slice(&self.buf[self.cursor..self.cursor + 4]);
        self.cursor += 4;
        Ok(u32::from_le_bytes(arr))
    }

    fn take_u64(&mut self) -> Result<u64, WireError> {
        if self.remaining() < 8 {
            return Err(WireError::BufferTooSmall {
                need: 8,
                have: self.remaining(),
            });
        }
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&self.buf[self.cursor..self.cursor + 8]);
        self.cursor += 8;
        Ok(u64::from_le_bytes(arr))
    }

    fn take_bytes(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < len {
            return Err(WireError::BufferTooSmall {
                need: len,
                have: self.remaining(),
            });
        }
        let bytes = &self.buf[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(bytes)
    }
}

/// Encode a producer message into the buffer.
///
/// The buffer is cleared and reused (preserves capacity).
pub fn encode_producer_message<P: Wire>(
    msg: &ProducerMessage<P>,
    buf: &mut Vec<u8>,
) -> Result<(), WireError> {
    let mut w = MessageWriter::new(buf);

    match msg {
        ProducerMessage::Handshake(m) => {
            w.put_u8(message_tag::HANDSHAKE);
            w.put_u64(m.first_seq.as_u64());
            w.put_u16(m.heartbeat_interval);
        }
        ProducerMessage::Event(m) => {
            let payload = postcard::to_stdvec(&m.content)?;
            w.put_u8(message_tag::EVENT);
            w.put_u64(m.seq.as_u64());
            w.put_u32(payload.len() as u32);
            w.put_bytes(&payload);
        }
        ProducerMessage::RetransmitFailed(m) => {
            w.put_u8(message_tag::RETRANSMIT_FAILED);
            w.put_u64(m.seq.as_u64());
        }
        ProducerMessage::Heartbeat(m) => {
            w.put_u8(message_tag::HEARTBEAT);
            w.put_u64(m.seq.as_u64());
        }
    }

    Ok(())
}

/// Decode a producer message from bytes.
pub fn decode_producer_message<P: Wire>(bytes: &[u8]) -> Result<ProducerMessage<P>, WireError> {
    let mut r = MessageReader::new(bytes);

    match r.take_u8()? {
        message_tag::HANDSHAKE => {
            let first_seq = SeqNum::from(r.take_u64()?);
            let heartbeat_interval = r.take_u16()?;
            Ok(ProducerMessage::Handshake(Handshake {
                first_seq,
                heartbeat_interval,
            }))
        }
        message_tag::EVENT => {
            let seq = SeqNum::from(r.take_u64()?);
            let len = r.take_u32()? as usize;
            let content = postcard::from_bytes(r.take_bytes(len)?)?;
            Ok(ProducerMessage::Event(Event { seq, content }))
        }
        message_tag::RETRANSMIT_FAILED => {
            let seq = SeqNum::from(r.take_u64()?);
            Ok(ProducerMessage::RetransmitFailed(RetransmitFailed { seq }))
        }
        message_tag::HEARTBEAT => {
            let seq = SeqNum::from(r.take_u64()?);
            Ok(ProducerMessage::Heartbeat(Heartbeat { seq }))
        }
        other => Err(WireError::UnknownTag(other)),
    }
}

/// Encode a consumer message into the buffer.
///
/// The buffer is cleared and reused (preserves capacity).
pub fn encode_consumer_message(msg: &ConsumerMessage, buf: &mut Vec<u8>) {
    let mut w = MessageWriter::new(buf);

    match msg {
        ConsumerMessage::CumulativeAck(m) => {
            w.put_u8(message_tag::CUMULATIVE_ACK);
            w.put_u64(m.seq.as_u64());
        }
        ConsumerMessage::Nack(m) => {
            w.put_u8(message_tag::NACK);
            w.put_u32(m.seqs.len() as u32);
            for seq in &m.seqs {
                w.put_u64(seq.as_u64());
            }
        }
    }
}

/// Decode a consumer message from bytes.
pub fn decode_consumer_message(bytes: &[u8]) -> Result<ConsumerMessage, WireError> {
    let mut r = MessageReader::new(bytes);

    match r.take_u8()? {
        message_tag::CUMULATIVE_ACK => {
            let seq = SeqNum::from(r.take_u64()?);
            Ok(ConsumerMessage::CumulativeAck(CumulativeAck { seq }))
        }
        message_tag::NACK => {
            let count = r.take_u32()? as usize;
            let mut seqs = Vec::with_capacity(count.min(bytes.len() / 8));
            for _ in 0..count {
                seqs.push(SeqNum::from(r.take_u64()?));
            }
            Ok(ConsumerMessage::Nack(Nack { seqs }))
        }
        other => Err(WireError::UnknownTag(other)),
    }
}
