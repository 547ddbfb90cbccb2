//! Daily key hash chain
//!
//! # Security Properties
//!
//! - Backward Secrecy: each key is a truncated SHA-256 of its predecessor,
//!   so past keys cannot be recovered from the current one
//! - Device Binding: the device identifier is part of every hash input
//! - Determinism: same inputs always produce the same chain
//!
//! Epochs are encoded as 8-byte big-endian seconds since the Unix epoch.

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::master_secret::MasterSecret;

/// Size of a daily key in bytes (AES-128).
pub const DAILY_KEY_SIZE: usize = 16;

/// Length of one rotation period.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// The active symmetric key for one calendar day.
///
/// Exactly one key is valid at a time. The bytes are zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct DailyKey {
    key: [u8; DAILY_KEY_SIZE],
}

impl DailyKey {
    /// Wrap raw key bytes (e.g. loaded back from flash).
    pub fn from_bytes(key: [u8; DAILY_KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Wrap a slice, returning `None` unless it is exactly 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let key: [u8; DAILY_KEY_SIZE] = bytes.try_into().ok()?;
        Some(Self { key })
    }

    /// 16-byte AES-128 key.
    pub fn as_bytes(&self) -> &[u8; DAILY_KEY_SIZE] {
        &self.key
    }

    /// Short identifier safe to log: the first four bytes of
    /// `SHA-256(key)`, hex encoded. Reveals nothing usable about the key.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.key);
        hex::encode(&digest[..4])
    }
}

impl std::fmt::Debug for DailyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DailyKey").field(&self.fingerprint()).finish()
    }
}

impl Drop for DailyKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Truncate a timestamp to the start of its UTC day.
pub fn normalize_to_day(epoch: u64) -> u64 {
    (epoch / SECONDS_PER_DAY) * SECONDS_PER_DAY
}

/// Derive `DailyKey(0)` from the master secret.
///
/// `SHA-256(master ‖ device_id ‖ start_epoch_be)[..16]`
///
/// `start_epoch` is hashed as given; provisioning always fixes it to a day
/// boundary.
pub fn derive_initial_key(master: &MasterSecret, device_id: &str, start_epoch: u64) -> DailyKey {
    chain_hash(master.as_bytes(), device_id, start_epoch)
}

/// Derive the next link of the chain.
///
/// `SHA-256(previous ‖ device_id ‖ normalize(epoch)_be)[..16]`
///
/// `epoch` is the *new* day's epoch; it is normalized before hashing so any
/// timestamp within that day yields the same key.
pub fn derive_next_key(previous: &DailyKey, device_id: &str, epoch: u64) -> DailyKey {
    chain_hash(previous.as_bytes(), device_id, normalize_to_day(epoch))
}

/// Replay the chain from `start_epoch` to the day containing
/// `target_epoch`.
///
/// This is the receiver-side view: a verifier holding the master secret
/// computes the key for any day without device state. Targets before the
/// start day yield `DailyKey(0)`.
pub fn derive_key_for_day(
    master: &MasterSecret,
    device_id: &str,
    start_epoch: u64,
    target_epoch: u64,
) -> DailyKey {
    let mut key = derive_initial_key(master, device_id, start_epoch);

    let start_day = normalize_to_day(start_epoch);
    let target_day = normalize_to_day(target_epoch);
    let days = target_day.saturating_sub(start_day) / SECONDS_PER_DAY;

    for day in 1..=days {
        let epoch = start_day + day * SECONDS_PER_DAY;
        key = derive_next_key(&key, device_id, epoch);
    }

    key
}

fn chain_hash(seed: &[u8], device_id: &str, epoch: u64) -> DailyKey {
    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(device_id.as_bytes());
    hasher.update(epoch.to_be_bytes());
    let mut digest = hasher.finalize();

    let mut key = [0u8; DAILY_KEY_SIZE];
    key.copy_from_slice(&digest[..DAILY_KEY_SIZE]);
    digest.as_mut_slice().zeroize();

    DailyKey { key }
}
