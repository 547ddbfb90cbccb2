//! Store error types.
//!
//! Defines errors that can occur during store operations:
//! - `Corrupt`: a persisted value has the wrong shape for its key
//! - `Io`: the underlying storage engine failed
//! - `Injected`: a fault injected by `ChaoticStore`

use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Persisted value cannot be decoded as the requested type
    ///
    /// Never defaulted: a corrupt counter or key must stop the device
    /// rather than restart the sequence.
    #[error("corrupt value {namespace}/{key}: {reason}")]
    Corrupt {
        /// Namespace name
        namespace: &'static str,
        /// Key within the namespace
        key: String,
        /// What was wrong with it
        reason: String,
    },

    /// I/O error (file system, database, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Failure injected for chaos testing
    #[error("injected failure during {operation}")]
    Injected {
        /// Store operation that was failed
        operation: &'static str,
    },
}

impl StoreError {
    /// Whether retrying the operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Injected { .. })
    }
}

