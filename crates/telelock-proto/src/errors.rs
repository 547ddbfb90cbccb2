//! Protocol error types.
//!
//! Raised only on the receiving side (parsing, hex decoding, batch
//! splitting). Building a frame from readings is infallible.

use thiserror::Error;

/// Result alias for wire-format operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding telemetry frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer length does not match the frame size for the IV width
    #[error("frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSizeMismatch {
        /// Frame size for the configured IV width
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },

    /// A semantic marker byte is not the one the layout requires
    #[error("unexpected marker at offset {offset}: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedMarker {
        /// Byte offset within the frame
        offset: usize,
        /// Marker defined by the format
        expected: u8,
        /// Marker found on the wire
        actual: u8,
    },

    /// A block length byte disagrees with the format
    #[error("unexpected block length at offset {offset}: expected {expected}, got {actual}")]
    UnexpectedBlockLength {
        /// Byte offset within the frame
        offset: usize,
        /// Length defined by the format
        expected: u8,
        /// Length found on the wire
        actual: u8,
    },

    /// Counter prefix has the wrong number of bytes for the IV width
    #[error("invalid counter prefix: expected {expected} bytes, got {actual}")]
    InvalidPrefix {
        /// Prefix length for the configured IV width
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },

    /// Combined payload is not a whole number of frames
    #[error("batch of {len} bytes is not a multiple of the {frame_size}-byte frame size")]
    MisalignedBatch {
        /// Combined payload length
        len: usize,
        /// Frame size for the configured IV width
        frame_size: usize,
    },

    /// Wire text is not valid hex
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}
