//! Node configuration.
//!
//! Each component takes its own plain config struct; [`NodeConfig`] bundles
//! them for the driver and the binary.

pub use telelock_proto::{IvWidth, NonceMode};

/// Chain origin used when the store holds none: 2025-03-17T00:00:00Z.
pub const DEFAULT_PROVISIONING_EPOCH: u64 = 1_742_169_600;

/// Default number of frames the transmit buffer retains.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

/// Where the key chain's notion of "today" comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeSource {
    /// A local day counter: each rotation advances `last_epoch` by exactly
    /// one day, regardless of the observed time.
    #[default]
    LocalCounter,
    /// An externally acquired absolute time (GPS): each rotation sets
    /// `last_epoch` to the observed time.
    External,
}

/// Key chain configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChainConfig {
    /// How rotations advance the persisted epoch
    pub time_source: TimeSource,
    /// `start_epoch` written on first initialization
    pub provisioning_epoch: u64,
}

impl Default for KeyChainConfig {
    fn default() -> Self {
        Self { time_source: TimeSource::default(), provisioning_epoch: DEFAULT_PROVISIONING_EPOCH }
    }
}

/// Frame builder configuration.
///
/// Both values are a contract with the receiver and must match its
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameConfig {
    /// How much of the effective IV each frame carries
    pub iv_width: IvWidth,
    /// Whether the IV nonce half is zero or drawn at startup
    pub nonce_mode: NonceMode,
}

/// Transmit buffer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitConfig {
    /// Maximum number of pending frames
    pub capacity: usize,
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self { capacity: DEFAULT_QUEUE_CAPACITY }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeConfig {
    /// Key chain settings
    pub key_chain: KeyChainConfig,
    /// Frame builder settings
    pub frame: FrameConfig,
    /// Transmit buffer settings
    pub transmit: TransmitConfig,
}
