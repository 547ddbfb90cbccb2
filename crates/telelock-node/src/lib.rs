//! Telelock node runtime.
//!
//! The device side of telelock: persisted key rotation, counter-based frame
//! construction, and buffered delivery over an unreliable radio link.
//!
//! # Architecture
//!
//! Pure derivation and wire-format code lives in [`telelock_crypto`] and
//! [`telelock_proto`]. This crate adds everything that touches state or the
//! outside world, each behind a seam that tests can replace:
//!
//! - [`Store`]: namespaced persistence ([`MemoryStore`], [`RedbStore`],
//!   [`ChaoticStore`])
//! - [`Environment`]: time and randomness ([`SystemEnv`], [`SimEnv`])
//! - [`Sensors`], [`RadioLink`], [`ProvisioningPrompt`]: device capabilities
//!
//! # Components
//!
//! - [`KeyChain`]: daily key rotation with persisted chain state
//! - [`FrameBuilder`]: persisted send counter and frame encryption
//! - [`TransmitBuffer`]: bounded retry queue with combined resends
//! - [`TelemetryNode`]: runs one cycle of all three
//!
//! # Ordering
//!
//! The single correctness rule across components: the send counter is
//! durable before the frame that embeds it exists, and a rotated key is
//! durable before it is used. A crash can skip a counter value or repeat a
//! rotation check; it never reuses a (key, IV) pair.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod env;
pub mod error;
pub mod frame_builder;
pub mod key_chain;
pub mod node;
pub mod provisioning;
pub mod radio;
pub mod sensors;
pub mod storage;
pub mod transmit;

pub use config::{
    FrameConfig, IvWidth, KeyChainConfig, NodeConfig, NonceMode, TimeSource, TransmitConfig,
};
pub use env::{Environment, SimEnv, SystemEnv};
pub use error::{FrameBuildError, KeyChainError, NodeError, TransmitError};
pub use frame_builder::FrameBuilder;
pub use key_chain::{FACTORY_RESET_SCOPE, KeyChain, RESET_SCOPE, Rotation};
pub use node::{CycleReport, TelemetryNode};
pub use provisioning::{DeviceIdentity, LinePrompt, ProvisioningPrompt, provision};
pub use radio::{LinkError, RadioLink, SimulatedRadio};
pub use sensors::{Motion, Position, SensorSnapshot, Sensors, SimulatedSensors};
pub use storage::{ChaoticStore, MemoryStore, Namespace, RedbStore, Store, StoreError};
pub use transmit::{SendOutcome, TransmitBuffer};
