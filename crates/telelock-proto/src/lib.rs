//! Telelock wire format.
//!
//! A telemetry frame is a small fixed-size binary record, sent over the
//! radio as one hex-encoded ASCII string. It carries a counter prefix from
//! which the receiver rebuilds the cipher IV, a clear block of non-sensitive
//! readings, and a secure block encrypted under the day's key.
//!
//! ```text
//! ┌──────────────┬───────────────────────────┬──────────────────────────┐
//! │ counter (w)  │ clear block (1 + 8)       │ secure block (1 + 11)    │
//! │ 2, 4 or 16 B │ len │ 01 T │ 02 H │ 03 XYZ│ len │ 04 A 05 LAT LON  │
//! └──────────────┴───────────────────────────┴─────────[encrypted]──────┘
//! ```
//!
//! Every field in the clear region is preceded by a one-byte semantic
//! marker and every block by a one-byte length, so a receiver can validate
//! the layout instead of trusting offsets blindly.
//!
//! This crate is pure data: encoding, parsing, and fixed-point scaling. The
//! device runtime decides counter values and performs the encryption.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod errors;
pub mod fields;
pub mod frame;
pub mod iv;

pub use errors::{ProtocolError, Result};
pub use fields::{ClearFields, SecureFields};
pub use frame::{ParsedFrame, TelemetryFrame, marker};
pub use iv::{EffectiveIv, IvWidth, NONCE_SIZE, NonceMode, SessionNonce};
