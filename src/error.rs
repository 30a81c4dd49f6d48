//! CLI error types.

use amqframe_protocol::FrameError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read {0}: {1}")]
    Input(PathBuf, std::io::Error),

    #[error("frame error at offset {offset}: {source}")]
    Frame {
        offset: u64,
        #[source]
        source: FrameError,
    },

    #[error("encode error: {0}")]
    Encode(#[from] FrameError),

    #[error("invalid hex input: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
