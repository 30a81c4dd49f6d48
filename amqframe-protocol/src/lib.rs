//! # amqframe-protocol
//!
//! Frame layer of the AMQP 0-9-1 wire protocol.
//!
//! This crate provides:
//! - Typed frames (method, header, body, heartbeat) with a bit-exact codec
//! - Zero-copy decoding into borrowed views, or owned frames backed by `Bytes`
//! - A resumable streaming decoder and a `tokio-util` codec adapter
//! - Configurable payload limits and content-body splitting
//!
//! Method arguments, content-header properties and connection negotiation are
//! left to higher layers; payloads are opaque here.

pub mod codec;
pub mod error;
pub mod frame;
pub mod limits;

pub use codec::{FrameCodec, FrameDecoder, FrameEncoder};
pub use error::FrameError;
pub use frame::{split_body, Frame, FrameHeader, FrameIter, FrameRef, FrameType};
pub use limits::FrameLimits;

/// Size of the fixed frame header: type (1) + channel (2) + payload length (4).
pub const FRAME_HEADER_SIZE: usize = 7;

/// Frame-end marker following every payload.
pub const FRAME_END: u8 = 0xCE;

/// Bytes a frame adds around its payload (header plus frame-end marker).
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_SIZE + 1;

/// Smallest frame-max a peer may negotiate.
pub const FRAME_MIN_SIZE: u32 = 4096;

/// Frame-max used when none has been negotiated (128 KiB).
pub const DEFAULT_FRAME_MAX: u32 = 128 * 1024;

/// Channel reserved for connection-level frames.
pub const CONNECTION_CHANNEL: u16 = 0;

/// Protocol header a client sends before the first frame.
pub const PROTOCOL_HEADER: [u8; 8] = *b"AMQP\x00\x00\x09\x01";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_constants() {
        assert_eq!(FRAME_OVERHEAD, 8);
        assert_eq!(&PROTOCOL_HEADER[..4], b"AMQP");
        assert_eq!(&PROTOCOL_HEADER[4..], &[0u8, 0, 9, 1]);
    }
}
