//! Error types for key material handling.

use thiserror::Error;

/// Errors raised while accepting provisioned key material.
///
/// Derivation itself never fails; only the inputs can be rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Master secret is not 32 or 64 hex characters (16 or 32 bytes)
    #[error("invalid master key length: expected 32 or 64 hex characters, got {actual}")]
    InvalidKeyLength {
        /// Length that was provided, in hex characters
        actual: usize,
    },

    /// Master secret has the right length but is not valid hex
    #[error("invalid master key encoding: {reason}")]
    InvalidKeyEncoding {
        /// Decoder message
        reason: String,
    },
}
