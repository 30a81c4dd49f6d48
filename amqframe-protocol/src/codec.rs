//! Buffered encoder and decoder for frame streams.

use crate::error::FrameError;
use crate::frame::{Frame, FrameHeader};
use crate::limits::FrameLimits;
use crate::{FRAME_END, FRAME_HEADER_SIZE};
use bytes::{Buf, Bytes, BytesMut};

/// Encodes frames, enforcing payload limits.
#[derive(Debug, Clone, Default)]
pub struct FrameEncoder {
    limits: FrameLimits,
}

impl FrameEncoder {
    pub fn new(limits: FrameLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &FrameLimits {
        &self.limits
    }

    /// Encodes a frame into a new buffer.
    pub fn encode(&self, frame: &Frame) -> Result<BytesMut, FrameError> {
        let mut buf = BytesMut::with_capacity(frame.encoded_len());
        self.encode_to(frame, &mut buf)?;
        Ok(buf)
    }

    /// Appends a frame to `dst`. Nothing is written on error.
    pub fn encode_to(&self, frame: &Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        self.limits.check(frame.payload.len() as u64)?;
        frame.encode_to(dst)
    }
}

/// Accumulates bytes from a stream and yields complete frames.
pub struct FrameDecoder {
    buffer: BytesMut,
    limits: FrameLimits,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_limits(FrameLimits::default())
    }

    pub fn with_limits(limits: FrameLimits) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            limits,
        }
    }

    pub fn limits(&self) -> &FrameLimits {
        &self.limits
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Appends bytes to the internal buffer.
    pub fn extend_bytes(&mut self, data: Bytes) {
        self.buffer.extend_from_slice(&data);
    }

    /// Attempts to decode the next frame from the buffer.
    ///
    /// Returns `Ok(None)` if more data is needed. After an error the buffer
    /// is left untouched and is no longer aligned to a frame boundary.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        match split_frame(&mut self.buffer, &self.limits) {
            Ok(frame) => Ok(Some(frame)),
            Err(e) if e.is_incomplete() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes one complete frame from the front of `buf`. The payload is split
/// off the buffer without copying.
fn split_frame(buf: &mut BytesMut, limits: &FrameLimits) -> Result<Frame, FrameError> {
    let header = FrameHeader::decode_with_limits(&buf[..], 0, limits)?;

    let frame_len = header.frame_len();
    if buf.len() < frame_len {
        return Err(FrameError::IncompleteFrame {
            needed: frame_len - buf.len(),
        });
    }

    let end = buf[frame_len - 1];
    if end != FRAME_END {
        return Err(FrameError::InvalidFrameEnd(end));
    }

    // Consume header
    buf.advance(FRAME_HEADER_SIZE);

    // Read payload
    let payload = buf.split_to(header.payload_len as usize).freeze();

    // Consume frame end
    buf.advance(1);

    Ok(Frame {
        frame_type: header.frame_type,
        channel: header.channel,
        payload,
    })
}

/// `tokio-util` codec for use with `FramedRead`, `FramedWrite` or `Framed`.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    limits: FrameLimits,
}

impl FrameCodec {
    pub fn new(limits: FrameLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &FrameLimits {
        &self.limits
    }
}

impl tokio_util::codec::Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        match split_frame(src, &self.limits) {
            Ok(frame) => Ok(Some(frame)),
            Err(FrameError::IncompleteFrame { needed }) => {
                src.reserve(needed);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl tokio_util::codec::Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        self.limits.check(frame.payload.len() as u64)?;
        frame.encode_to(dst)
    }
}
