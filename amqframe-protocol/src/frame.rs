//! AMQP 0-9-1 frame format.
//!
//! Frame layout (7 bytes header + payload + frame-end marker):
//!
//! ```text
//! +--------+---------+-------------+-----------------+-----------+
//! |  type  | channel | payload_len |     payload     | frame_end |
//! | 1 byte | 2 bytes |   4 bytes   | payload_len     |  1 byte   |
//! +--------+---------+-------------+-----------------+-----------+
//! ```
//!
//! All integers are big-endian and the frame-end marker is always `0xCE`.

use crate::error::FrameError;
use crate::limits::FrameLimits;
use crate::{CONNECTION_CHANNEL, FRAME_END, FRAME_HEADER_SIZE, FRAME_OVERHEAD};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Frame type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Class/method id followed by method arguments.
    Method = 1,
    /// Content header: class id, body size and properties.
    Header = 2,
    /// A slice of message content.
    Body = 3,
    /// Empty keepalive frame.
    Heartbeat = 8,
}

impl FrameType {
    /// Parses a wire tag.
    pub fn from_u8(tag: u8) -> Result<Self, FrameError> {
        match tag {
            1 => Ok(FrameType::Method),
            2 => Ok(FrameType::Header),
            3 => Ok(FrameType::Body),
            8 => Ok(FrameType::Heartbeat),
            other => Err(FrameError::UnknownFrameType(other)),
        }
    }

    /// Returns the wire tag.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            FrameType::Method => "method",
            FrameType::Header => "header",
            FrameType::Body => "body",
            FrameType::Heartbeat => "heartbeat",
        }
    }
}

impl TryFrom<u8> for FrameType {
    type Error = FrameError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Self::from_u8(tag)
    }
}

impl From<FrameType> for u8 {
    fn from(frame_type: FrameType) -> u8 {
        frame_type.as_u8()
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The fixed 7-byte prefix of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_type: FrameType,
    pub channel: u16,
    /// Payload length as announced on the wire.
    pub payload_len: u32,
}

impl FrameHeader {
    /// Decodes the header at `offset` without looking at the payload.
    pub fn decode(buf: &[u8], offset: usize) -> Result<Self, FrameError> {
        Self::decode_with_limits(buf, offset, &FrameLimits::unlimited())
    }

    /// Decodes the header at `offset`, rejecting payload lengths above
    /// `limits` before any payload byte is required.
    pub fn decode_with_limits(
        buf: &[u8],
        offset: usize,
        limits: &FrameLimits,
    ) -> Result<Self, FrameError> {
        let rest = buf.get(offset..).unwrap_or_default();
        if rest.len() < FRAME_HEADER_SIZE {
            return Err(FrameError::IncompleteFrame {
                needed: FRAME_HEADER_SIZE - rest.len(),
            });
        }

        let frame_type = FrameType::from_u8(rest[0])?;
        let channel = u16::from_be_bytes([rest[1], rest[2]]);
        let payload_len = u32::from_be_bytes([rest[3], rest[4], rest[5], rest[6]]);

        limits.check(payload_len as u64)?;

        Ok(Self {
            frame_type,
            channel,
            payload_len,
        })
    }

    /// Total size of the frame this header starts.
    pub fn frame_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload_len as usize
    }
}

/// A frame decoded in place, borrowing its payload from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRef<'a> {
    pub frame_type: FrameType,
    pub channel: u16,
    pub payload: &'a [u8],
}

impl<'a> FrameRef<'a> {
    pub fn new(frame_type: FrameType, channel: u16, payload: &'a [u8]) -> Self {
        Self {
            frame_type,
            channel,
            payload,
        }
    }

    /// Decodes one frame starting at `offset`.
    ///
    /// Returns the frame and the number of bytes it occupies, so a run of
    /// frames can be walked by advancing `offset`. `IncompleteFrame` means
    /// the buffer ends inside the frame and the call should be retried with
    /// more data.
    pub fn decode(buf: &'a [u8], offset: usize) -> Result<(Self, usize), FrameError> {
        Self::decode_with_limits(buf, offset, &FrameLimits::unlimited())
    }

    /// Like [`FrameRef::decode`], rejecting payloads above `limits`.
    pub fn decode_with_limits(
        buf: &'a [u8],
        offset: usize,
        limits: &FrameLimits,
    ) -> Result<(Self, usize), FrameError> {
        let header = FrameHeader::decode_with_limits(buf, offset, limits)?;
        let rest = &buf[offset..];

        let frame_len = header.frame_len();
        if rest.len() < frame_len {
            return Err(FrameError::IncompleteFrame {
                needed: frame_len - rest.len(),
            });
        }

        let end = rest[frame_len - 1];
        if end != FRAME_END {
            return Err(FrameError::InvalidFrameEnd(end));
        }

        let frame = Self {
            frame_type: header.frame_type,
            channel: header.channel,
            payload: &rest[FRAME_HEADER_SIZE..frame_len - 1],
        };
        Ok((frame, frame_len))
    }

    /// Copies the payload into an owned [`Frame`].
    pub fn to_owned_frame(&self) -> Frame {
        Frame {
            frame_type: self.frame_type,
            channel: self.channel,
            payload: Bytes::copy_from_slice(self.payload),
        }
    }

    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Encodes the frame into a new buffer.
    pub fn encode(&self) -> Result<BytesMut, FrameError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_to(&mut buf)?;
        Ok(buf)
    }

    /// Appends the encoded frame to `dst`. Nothing is written on error.
    pub fn encode_to(&self, dst: &mut BytesMut) -> Result<(), FrameError> {
        let payload_len = u32::try_from(self.payload.len()).map_err(|_| {
            FrameError::InvalidFrame(format!(
                "payload of {} bytes does not fit the 32-bit length field",
                self.payload.len()
            ))
        })?;

        dst.reserve(self.encoded_len());

        // Type (1 byte)
        dst.put_u8(self.frame_type.as_u8());

        // Channel (2 bytes)
        dst.put_u16(self.channel);

        // Payload length (4 bytes)
        dst.put_u32(payload_len);

        // Payload
        dst.put_slice(self.payload);

        // Frame end (1 byte)
        dst.put_u8(FRAME_END);

        Ok(())
    }
}

/// An owned frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    /// Channel number; 0 carries connection-level frames.
    pub channel: u16,
    /// Opaque payload, interpreted according to `frame_type`.
    pub payload: Bytes,
}

impl Frame {
    pub fn new(frame_type: FrameType, channel: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            channel,
            payload: payload.into(),
        }
    }

    pub fn method(channel: u16, payload: impl Into<Bytes>) -> Self {
        Self::new(FrameType::Method, channel, payload)
    }

    pub fn header(channel: u16, payload: impl Into<Bytes>) -> Self {
        Self::new(FrameType::Header, channel, payload)
    }

    pub fn body(channel: u16, payload: impl Into<Bytes>) -> Self {
        Self::new(FrameType::Body, channel, payload)
    }

    /// Heartbeat on the connection channel with an empty payload.
    pub fn heartbeat() -> Self {
        Self::new(FrameType::Heartbeat, CONNECTION_CHANNEL, Bytes::new())
    }

    pub fn is_connection_level(&self) -> bool {
        self.channel == CONNECTION_CHANNEL
    }

    pub fn as_frame_ref(&self) -> FrameRef<'_> {
        FrameRef::new(self.frame_type, self.channel, &self.payload)
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Decodes one frame at `offset`, copying the payload.
    pub fn decode(buf: &[u8], offset: usize) -> Result<(Self, usize), FrameError> {
        Self::decode_with_limits(buf, offset, &FrameLimits::unlimited())
    }

    pub fn decode_with_limits(
        buf: &[u8],
        offset: usize,
        limits: &FrameLimits,
    ) -> Result<(Self, usize), FrameError> {
        let (frame, consumed) = FrameRef::decode_with_limits(buf, offset, limits)?;
        Ok((frame.to_owned_frame(), consumed))
    }

    /// Decodes one frame at `offset` from shared bytes. The payload is a
    /// slice of `buf` rather than a copy.
    pub fn decode_bytes(buf: &Bytes, offset: usize) -> Result<(Self, usize), FrameError> {
        let (frame, consumed) = FrameRef::decode(buf, offset)?;
        let start = offset + FRAME_HEADER_SIZE;
        let payload = buf.slice(start..start + frame.payload.len());
        Ok((Self::new(frame.frame_type, frame.channel, payload), consumed))
    }

    /// Encodes the frame into a new buffer.
    pub fn encode(&self) -> Result<BytesMut, FrameError> {
        self.as_frame_ref().encode()
    }

    /// Appends the encoded frame to `dst`. Nothing is written on error.
    pub fn encode_to(&self, dst: &mut BytesMut) -> Result<(), FrameError> {
        self.as_frame_ref().encode_to(dst)
    }
}

impl From<FrameRef<'_>> for Frame {
    fn from(frame: FrameRef<'_>) -> Self {
        frame.to_owned_frame()
    }
}

/// Walks a contiguous run of frames in a buffer.
///
/// Iteration ends when the buffer is exhausted or only a partial frame is
/// left; [`FrameIter::remainder`] then holds the unconsumed tail. A
/// structural error is yielded once and ends the iteration.
#[derive(Debug, Clone)]
pub struct FrameIter<'a> {
    buf: &'a [u8],
    offset: usize,
    limits: FrameLimits,
    failed: bool,
}

impl<'a> FrameIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_limits(buf, FrameLimits::unlimited())
    }

    pub fn with_limits(buf: &'a [u8], limits: FrameLimits) -> Self {
        Self {
            buf,
            offset: 0,
            limits,
            failed: false,
        }
    }

    /// Offset of the next undecoded byte.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes not consumed by any yielded frame.
    pub fn remainder(&self) -> &'a [u8] {
        &self.buf[self.offset..]
    }
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = Result<FrameRef<'a>, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buf.len() {
            return None;
        }

        match FrameRef::decode_with_limits(self.buf, self.offset, &self.limits) {
            Ok((frame, consumed)) => {
                self.offset += consumed;
                Some(Ok(frame))
            }
            Err(e) if e.is_incomplete() => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Splits message content into body frames no larger than `limits` allow.
///
/// The payloads share `body`'s storage. An empty body produces no frames.
pub fn split_body(channel: u16, body: &Bytes, limits: &FrameLimits) -> Vec<Frame> {
    let chunk = (limits.max_payload_size as usize).max(1);
    let mut frames = Vec::with_capacity(body.len().div_ceil(chunk));

    let mut start = 0;
    while start < body.len() {
        let end = body.len().min(start + chunk);
        frames.push(Frame::body(channel, body.slice(start..end)));
        start = end;
    }

    frames
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn frame_type() -> impl Strategy<Value = FrameType> {
        prop_oneof![
            Just(FrameType::Method),
            Just(FrameType::Header),
            Just(FrameType::Body),
            Just(FrameType::Heartbeat),
        ]
    }

    fn frame() -> impl Strategy<Value = Frame> {
        (
            frame_type(),
            any::<u16>(),
            proptest::collection::vec(any::<u8>(), 0..256),
        )
            .prop_map(|(frame_type, channel, payload)| Frame::new(frame_type, channel, payload))
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(frame in frame()) {
            let encoded = frame.encode().unwrap();
            let (decoded, consumed) = Frame::decode(&encoded, 0).unwrap();
            prop_assert_eq!(decoded, frame);
            prop_assert_eq!(consumed, encoded.len());
        }

        #[test]
        fn consumed_is_payload_plus_overhead(frame in frame(), lead in 0usize..16) {
            let mut buf = BytesMut::from(&vec![0xAAu8; lead][..]);
            frame.encode_to(&mut buf).unwrap();

            let (decoded, consumed) = FrameRef::decode(&buf, lead).unwrap();
            prop_assert_eq!(consumed, 7 + decoded.payload.len() + 1);
        }

        #[test]
        fn strict_prefix_is_incomplete(frame in frame()) {
            let encoded = frame.encode().unwrap();
            for len in 0..encoded.len() {
                let result = FrameRef::decode(&encoded[..len], 0);
                prop_assert!(
                    matches!(result, Err(FrameError::IncompleteFrame { .. })),
                    "prefix of {} bytes gave {:?}", len, result
                );
            }
        }

        #[test]
        fn corrupt_frame_end_is_detected(
            frame in frame(),
            end in any::<u8>().prop_filter("must differ from frame end", |b| *b != FRAME_END),
        ) {
            let mut encoded = frame.encode().unwrap();
            let last = encoded.len() - 1;
            encoded[last] = end;

            let result = FrameRef::decode(&encoded, 0);
            prop_assert!(matches!(result, Err(FrameError::InvalidFrameEnd(b)) if b == end));
        }

        #[test]
        fn unknown_type_is_detected(
            frame in frame(),
            tag in any::<u8>().prop_filter("must be unrecognized", |t| ![1, 2, 3, 8].contains(t)),
        ) {
            let mut encoded = frame.encode().unwrap();
            encoded[0] = tag;

            let result = FrameRef::decode(&encoded, 0);
            prop_assert!(matches!(result, Err(FrameError::UnknownFrameType(t)) if t == tag));
        }

        #[test]
        fn split_body_reassembles(
            body in proptest::collection::vec(any::<u8>(), 0..2048),
            max in 1u32..512,
        ) {
            let body = Bytes::from(body);
            let frames = split_body(1, &body, &FrameLimits::with_max_payload(max));

            prop_assert!(frames.iter().all(|f| f.payload.len() <= max as usize && !f.payload.is_empty()));
            let reassembled: Vec<u8> = frames.iter().flat_map(|f| f.payload.to_vec()).collect();
            prop_assert_eq!(reassembled, body.to_vec());
        }
    }
}
