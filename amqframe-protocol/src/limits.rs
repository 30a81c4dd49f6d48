//! Payload size limits.
//!
//! The 32-bit length field lets a peer announce payloads of up to 4 GiB.
//! Decoders that buffer input should bound this with the negotiated
//! frame-max instead of trusting the length field.

use crate::error::FrameError;
use crate::{DEFAULT_FRAME_MAX, FRAME_MIN_SIZE, FRAME_OVERHEAD};

/// Upper bound on frame payload sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Largest payload accepted, in bytes.
    pub max_payload_size: u32,
}

impl FrameLimits {
    /// No bound beyond what the length field can express.
    pub const fn unlimited() -> Self {
        Self {
            max_payload_size: u32::MAX,
        }
    }

    /// Limits for a payload of at most `max_payload_size` bytes.
    pub const fn with_max_payload(max_payload_size: u32) -> Self {
        Self { max_payload_size }
    }

    /// Derives limits from a negotiated frame-max, which counts the whole
    /// frame including header and frame-end marker.
    ///
    /// A frame-max of 0 means no limit. Values below [`FRAME_MIN_SIZE`] are
    /// raised to it.
    pub fn from_frame_max(frame_max: u32) -> Self {
        if frame_max == 0 {
            return Self::unlimited();
        }
        let frame_max = frame_max.max(FRAME_MIN_SIZE);
        Self {
            max_payload_size: frame_max - FRAME_OVERHEAD as u32,
        }
    }

    /// Largest total frame size these limits allow.
    pub fn frame_max(&self) -> u64 {
        self.max_payload_size as u64 + FRAME_OVERHEAD as u64
    }

    /// Rejects payload sizes above the limit.
    pub fn check(&self, payload_len: u64) -> Result<(), FrameError> {
        if payload_len > self.max_payload_size as u64 {
            return Err(FrameError::FrameTooLarge {
                size: payload_len,
                max: self.max_payload_size,
            });
        }
        Ok(())
    }
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self::from_frame_max(DEFAULT_FRAME_MAX)
    }
}
