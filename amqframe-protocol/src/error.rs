//! Frame codec error types.

use thiserror::Error;

/// Errors raised while decoding or encoding frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Not enough bytes buffered yet; retry once more input has arrived.
    #[error("incomplete frame: need {needed} more bytes")]
    IncompleteFrame { needed: usize },

    #[error("unknown frame type: {0:#04x}")]
    UnknownFrameType(u8),

    #[error("invalid frame end: expected 0xce, got {0:#04x}")]
    InvalidFrameEnd(u8),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("frame too large: {size} byte payload (max {max})")]
    FrameTooLarge { size: u64, max: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Returns whether the decoder only needs more input.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, FrameError::IncompleteFrame { .. })
    }

    /// Returns whether the error means the byte stream can no longer be
    /// trusted and the connection has to be closed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FrameError::UnknownFrameType(_)
                | FrameError::InvalidFrameEnd(_)
                | FrameError::FrameTooLarge { .. }
        )
    }
}
