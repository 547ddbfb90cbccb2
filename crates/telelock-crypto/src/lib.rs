//! Telelock Cryptographic Primitives
//!
//! Cryptographic building blocks for a telelock telemetry node. Pure
//! functions with deterministic outputs: nothing here touches storage,
//! clocks or randomness. Callers supply every input.
//!
//! # Key Lifecycle
//!
//! A provisioned master secret seeds a one-way hash chain anchored to
//! calendar days. Each day's key is derived from the previous day's key,
//! so the master secret is only needed once, at provisioning.
//!
//! ```text
//! MasterSecret ‖ DeviceId ‖ startEpoch
//!        │
//!        ▼
//! SHA-256[..16] → DailyKey(0)
//!        │
//!        ▼  DailyKey(n-1) ‖ DeviceId ‖ Epoch(n)
//! SHA-256[..16] → DailyKey(n)
//!        │
//!        ▼
//! AES-128-CTR(DailyKey(n), EffectiveIV) → encrypted frame region
//! ```
//!
//! # Security
//!
//! Backward Secrecy:
//! - A compromised `DailyKey(n)` cannot be inverted to recover
//!   `DailyKey(n-1)` or the master secret
//! - Replaced keys are zeroized when dropped
//!
//! Device Isolation:
//! - The device identifier is mixed into every derivation step, so two
//!   devices sharing a master secret never share a key
//!
//! Keystream Uniqueness:
//! - The stream cipher performs no nonce tracking. The caller must never
//!   reuse an (key, IV) pair; the node runtime guarantees this with a
//!   persisted monotonic counter and per-day rotation

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod daily_key;
mod error;
pub mod master_secret;
pub mod stream_cipher;

pub use daily_key::{
    DAILY_KEY_SIZE, DailyKey, SECONDS_PER_DAY, derive_initial_key, derive_key_for_day,
    derive_next_key, normalize_to_day,
};
pub use error::CryptoError;
pub use master_secret::MasterSecret;
pub use stream_cipher::{BLOCK_SIZE, IV_SIZE};
