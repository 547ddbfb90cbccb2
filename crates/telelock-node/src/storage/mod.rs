//! Persistent key-value store abstraction.
//!
//! Device state lives in named byte blobs grouped into independent
//! namespaces, so wiping one (the send counter, say) never implicitly wipes
//! another. The trait is synchronous: the node runs one cycle at a time and
//! blocks on flash writes.
//!
//! Integers are stored little-endian at their natural width. Values whose
//! length does not match the requested type surface as
//! [`StoreError::Corrupt`] rather than being silently defaulted.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStore;
pub use error::StoreError;
pub use memory::MemoryStore;

pub use self::redb::RedbStore;

/// Independent groups of persisted values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Chain origin, last rotation epoch and the current daily key
    KeyChain,
    /// Provisioned master secret and device identifier
    Identity,
    /// The send counter
    Counter,
    /// Radio session state
    Session,
}

impl Namespace {
    /// Every namespace, in a fixed order.
    pub const ALL: [Self; 4] = [Self::KeyChain, Self::Identity, Self::Counter, Self::Session];

    /// Stable on-disk name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::KeyChain => "dailykeys",
            Self::Identity => "identity",
            Self::Counter => "payload",
            Self::Session => "lorawan",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Durable named byte blobs, grouped by [`Namespace`].
///
/// Must be Clone (shared by the key chain, frame builder and radio session),
/// Send + Sync, and synchronous. Implementations share internal state via
/// Arc, so clones access the same underlying store.
///
/// # Invariants
///
/// - `put_batch` is atomic: after a crash either every entry is visible or
///   none is
/// - `clear` is atomic across all listed namespaces
/// - A successful write is durable before the call returns
pub trait Store: Clone + Send + Sync + 'static {
    /// Read one value. `None` if the key was never written or was cleared.
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write several values in one namespace atomically.
    fn put_batch(&self, namespace: Namespace, entries: &[(&str, &[u8])]) -> Result<(), StoreError>;

    /// Remove every value in every listed namespace atomically.
    fn clear(&self, namespaces: &[Namespace]) -> Result<(), StoreError>;

    /// Write one value.
    fn put(&self, namespace: Namespace, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.put_batch(namespace, &[(key, value)])
    }

    /// Read a little-endian `u32`.
    fn get_u32(&self, namespace: Namespace, key: &str) -> Result<Option<u32>, StoreError> {
        self.get(namespace, key)?
            .map(|bytes| decode_fixed::<4>(namespace, key, &bytes).map(u32::from_le_bytes))
            .transpose()
    }

    /// Write a little-endian `u32`.
    fn put_u32(&self, namespace: Namespace, key: &str, value: u32) -> Result<(), StoreError> {
        self.put(namespace, key, &value.to_le_bytes())
    }

    /// Read a little-endian `u64`.
    fn get_u64(&self, namespace: Namespace, key: &str) -> Result<Option<u64>, StoreError> {
        self.get(namespace, key)?
            .map(|bytes| decode_fixed::<8>(namespace, key, &bytes).map(u64::from_le_bytes))
            .transpose()
    }

    /// Write a little-endian `u64`.
    fn put_u64(&self, namespace: Namespace, key: &str, value: u64) -> Result<(), StoreError> {
        self.put(namespace, key, &value.to_le_bytes())
    }

    /// Read a UTF-8 string.
    fn get_string(&self, namespace: Namespace, key: &str) -> Result<Option<String>, StoreError> {
        self.get(namespace, key)?
            .map(|bytes| {
                String::from_utf8(bytes).map_err(|e| StoreError::Corrupt {
                    namespace: namespace.name(),
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    /// Write a UTF-8 string.
    fn put_string(&self, namespace: Namespace, key: &str, value: &str) -> Result<(), StoreError> {
        self.put(namespace, key, value.as_bytes())
    }
}

fn decode_fixed<const N: usize>(
    namespace: Namespace,
    key: &str,
    bytes: &[u8],
) -> Result<[u8; N], StoreError> {
    bytes.try_into().map_err(|_| StoreError::Corrupt {
        namespace: namespace.name(),
        key: key.to_string(),
        reason: format!("expected {N} bytes, found {}", bytes.len()),
    })
}
