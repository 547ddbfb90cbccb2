//! Node error types.
//!
//! One enum per component. Configuration errors are fatal until the
//! operator re-provisions; link errors are transient and absorbed by the
//! transmit buffer.

use telelock_crypto::CryptoError;
use thiserror::Error;

use crate::storage::StoreError;

/// Errors raised while provisioning or rotating the daily key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyChainError {
    /// Master secret or device identifier is absent and cannot be obtained
    ///
    /// Key derivation is withheld; nothing is derived from empty input.
    #[error("configuration missing: {what}")]
    ConfigurationMissing {
        /// Which identity value is missing
        what: &'static str,
    },

    /// Provisioned master secret is not 32 or 64 hex characters
    #[error("invalid master secret length: expected 32 or 64 hex characters, got {actual}")]
    InvalidKeyLength {
        /// Number of hex characters supplied
        actual: usize,
    },

    /// Provisioned master secret has the right length but is not hex
    #[error("invalid master secret encoding: {reason}")]
    InvalidKeyEncoding {
        /// Decoder message
        reason: String,
    },

    /// Device identifier contains non-ASCII characters
    #[error("invalid device identifier {device_id:?}: must be ASCII")]
    InvalidDeviceId {
        /// Identifier as supplied
        device_id: String,
    },

    /// The provisioning prompt could not be read or written
    #[error("provisioning prompt failed: {0}")]
    Prompt(String),

    /// Persisted chain state could not be read or written
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl KeyChainError {
    /// Whether retrying the operation later may succeed.
    ///
    /// Provisioning problems need an operator; only store I/O can clear up
    /// on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_transient())
    }
}

impl From<CryptoError> for KeyChainError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidKeyLength { actual } => Self::InvalidKeyLength { actual },
            CryptoError::InvalidKeyEncoding { reason } => Self::InvalidKeyEncoding { reason },
        }
    }
}

/// Errors raised while building a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameBuildError {
    /// The send counter reached `u32::MAX`
    ///
    /// Continuing would reuse an IV under the current key. The device needs
    /// a reset (new chain, counter back to zero).
    #[error("send counter exhausted at {counter}; reset required")]
    CounterExhausted {
        /// Last counter value handed out
        counter: u32,
    },

    /// Every 16-bit embedded counter has been used under the current key
    ///
    /// Building another frame would repeat an IV. Clears once the key
    /// rotates.
    #[error("16-bit IV space exhausted at counter {counter} (window opened at {window_start})")]
    IvSpaceExhausted {
        /// Counter that would have been embedded
        counter: u32,
        /// First counter embedded under the current key
        window_start: u32,
    },

    /// Counter could not be persisted, so no frame was built
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FrameBuildError {
    /// Whether retrying the operation later may succeed.
    ///
    /// An exhausted IV window clears at the next rotation.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::IvSpaceExhausted { .. } => true,
            Self::Store(e) => e.is_transient(),
            Self::CounterExhausted { .. } => false,
        }
    }
}

/// Errors raised by the transmit buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransmitError {
    /// Radio session is not activated
    #[error("link not activated")]
    LinkNotActivated,

    /// Radio reported a send failure
    #[error("link send failed with code {code}")]
    LinkSendFailed {
        /// Radio-specific status code
        code: i16,
    },

    /// Pending queue is full; the newest frame was dropped
    #[error("transmit queue full ({capacity} frames); newest frame dropped")]
    QueueFull {
        /// Queue capacity
        capacity: usize,
    },
}

impl TransmitError {
    /// Whether retrying the operation later may succeed.
    ///
    /// Link failures are retried via the pending queue. A dropped frame is
    /// gone.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LinkNotActivated | Self::LinkSendFailed { .. })
    }
}

/// Top-level error for one telemetry cycle or node startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Key chain failure
    #[error("key chain: {0}")]
    KeyChain(#[from] KeyChainError),

    /// Frame construction failure
    #[error("frame build: {0}")]
    FrameBuild(#[from] FrameBuildError),

    /// Transmission failure
    #[error("transmit: {0}")]
    Transmit(#[from] TransmitError),

    /// Store failure outside a component
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

impl NodeError {
    /// Whether the node can keep cycling after this error.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::KeyChain(e) => e.is_transient(),
            Self::FrameBuild(e) => e.is_transient(),
            Self::Transmit(e) => e.is_transient(),
            Self::Store(e) => e.is_transient(),
        }
    }
}
