//! Daily key rotation on the device.
//!
//! Owns the persisted chain state (`start_epoch`, `last_epoch`, the current
//! daily key) and the day-boundary check. Derivation itself lives in
//! `telelock_crypto`; this module decides *when* to derive and makes the
//! result durable.
//!
//! # Rotation
//!
//! ```text
//! check_rotation(now):
//!   normalize(now) <= normalize(last_epoch)  → Unchanged
//!   otherwise, exactly one step:
//!     LocalCounter: epoch = last_epoch + 1 day
//!     External:     epoch = now
//!     key = H(key ‖ device_id ‖ normalize(epoch))
//!     persist {key, last_epoch = epoch} in one batch
//! ```
//!
//! A multi-day gap is never replayed in one call. With `LocalCounter` the
//! chain catches up one day per subsequent call; with `External` the missed
//! days are skipped (the chain under-rotates, it never reuses a key).

use telelock_crypto::{
    DailyKey, SECONDS_PER_DAY, derive_initial_key, derive_next_key, normalize_to_day,
};

use crate::{
    config::{KeyChainConfig, TimeSource},
    error::KeyChainError,
    provisioning::{DeviceIdentity, load_device_id},
    storage::{Namespace, Store, StoreError},
};

/// Store key for the chain origin.
pub const START_EPOCH: &str = "start_epoch";

/// Store key for the most recent rotation boundary.
pub const LAST_EPOCH: &str = "last_epoch";

/// Store key for the current daily key.
pub const DAILY_KEY: &str = "last_daily_key";

/// Namespaces wiped by [`KeyChain::reset`]. Chain and counter go together:
/// a stale counter under a reseeded chain would repeat IVs.
pub const RESET_SCOPE: [Namespace; 2] = [Namespace::KeyChain, Namespace::Counter];

/// Namespaces wiped by [`KeyChain::factory_reset`].
pub const FACTORY_RESET_SCOPE: [Namespace; 3] =
    [Namespace::KeyChain, Namespace::Counter, Namespace::Identity];

/// Result of a rotation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// Still the same day; the key is unchanged
    Unchanged,
    /// One chain step was taken
    Rotated {
        /// New `last_epoch`
        epoch: u64,
    },
}

/// The device's daily key and its persisted chain state.
///
/// # Invariants
///
/// - A current key always exists once `initialize` returns
/// - The in-memory key and `last_epoch` only change after the store has
///   accepted both
pub struct KeyChain<S: Store> {
    store: S,
    config: KeyChainConfig,
    device_id: String,
    start_epoch: u64,
    last_epoch: u64,
    key: DailyKey,
}

impl<S: Store> KeyChain<S> {
    /// Load the chain from the store, or start it at the provisioning epoch.
    ///
    /// Idempotent across restarts: a persisted key is used as is and the
    /// master secret is only read and parsed when there is none. Only the
    /// device identifier is needed to keep rotating a persisted chain.
    ///
    /// # Errors
    ///
    /// `ConfigurationMissing` / `InvalidKeyLength` when the identity needed
    /// for the branch taken is not provisioned, which blocks derivation.
    /// `Store` if chain state cannot be read, is corrupt, or cannot be
    /// written.
    pub fn initialize(store: S, config: KeyChainConfig) -> Result<Self, KeyChainError> {
        let stored_start = store.get_u64(Namespace::KeyChain, START_EPOCH)?;
        let stored_last = store.get_u64(Namespace::KeyChain, LAST_EPOCH)?;
        let stored_key = store
            .get(Namespace::KeyChain, DAILY_KEY)?
            .map(|bytes| {
                DailyKey::from_slice(&bytes).ok_or_else(|| StoreError::Corrupt {
                    namespace: Namespace::KeyChain.name(),
                    key: DAILY_KEY.to_string(),
                    reason: format!("expected 16 bytes, found {}", bytes.len()),
                })
            })
            .transpose()?;

        let start_epoch = stored_start.unwrap_or(normalize_to_day(config.provisioning_epoch));

        let chain = match (stored_last, stored_key) {
            (Some(last_epoch), Some(key)) => {
                let device_id = load_device_id(&store)?;
                tracing::info!(
                    device_id = %device_id,
                    start_epoch,
                    last_epoch,
                    key = %key.fingerprint(),
                    "loaded daily key from store"
                );
                Self { store, config, device_id, start_epoch, last_epoch, key }
            },
            (stored_last, _) => {
                if stored_last.is_some() {
                    tracing::warn!(start_epoch, "daily key missing, restarting chain at origin");
                }

                let identity = DeviceIdentity::load(&store)?;
                let key = derive_initial_key(identity.master(), identity.device_id(), start_epoch);
                store.put_batch(
                    Namespace::KeyChain,
                    &[
                        (START_EPOCH, &start_epoch.to_le_bytes()[..]),
                        (LAST_EPOCH, &start_epoch.to_le_bytes()[..]),
                        (DAILY_KEY, &key.as_bytes()[..]),
                    ],
                )?;

                tracing::info!(
                    device_id = %identity.device_id(),
                    start_epoch,
                    key = %key.fingerprint(),
                    "derived initial daily key from master secret"
                );
                Self {
                    store,
                    config,
                    device_id: identity.device_id().to_string(),
                    start_epoch,
                    last_epoch: start_epoch,
                    key,
                }
            },
        };

        Ok(chain)
    }

    /// Rotate if `now` falls on a later day than the last rotation.
    ///
    /// Takes at most one chain step per call. On a store failure nothing
    /// changes and the previous key stays active.
    pub fn check_rotation(&mut self, now: u64) -> Result<Rotation, KeyChainError> {
        let current_day = normalize_to_day(now);
        let last_day = normalize_to_day(self.last_epoch);

        if current_day <= last_day {
            return Ok(Rotation::Unchanged);
        }

        let epoch = match self.config.time_source {
            TimeSource::LocalCounter => self.last_epoch + SECONDS_PER_DAY,
            TimeSource::External => now,
        };
        let next = derive_next_key(&self.key, &self.device_id, epoch);

        self.store.put_batch(
            Namespace::KeyChain,
            &[(LAST_EPOCH, &epoch.to_le_bytes()[..]), (DAILY_KEY, &next.as_bytes()[..])],
        )?;

        self.key = next;
        self.last_epoch = epoch;

        let behind = (current_day - normalize_to_day(epoch)) / SECONDS_PER_DAY;
        if behind > 0 {
            tracing::warn!(
                days_behind = behind,
                time_source = ?self.config.time_source,
                "several days elapsed since last rotation; advanced one step"
            );
        }

        tracing::info!(epoch, key = %self.key.fingerprint(), "daily key rotated");

        Ok(Rotation::Rotated { epoch })
    }

    /// The active daily key.
    pub fn current_key(&self) -> &DailyKey {
        &self.key
    }

    /// Chain origin.
    pub fn start_epoch(&self) -> u64 {
        self.start_epoch
    }

    /// Most recent rotation boundary.
    pub fn last_epoch(&self) -> u64 {
        self.last_epoch
    }

    /// Identifier mixed into every derivation.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Wipe chain state and the send counter together.
    ///
    /// The identity survives; the next `initialize` restarts the chain from
    /// the master secret and counting starts over. Returns the store so the
    /// caller can re-initialize.
    pub fn reset(self) -> Result<S, KeyChainError> {
        self.store.clear(&RESET_SCOPE)?;
        tracing::warn!(device_id = %self.device_id, "key chain and send counter reset");
        Ok(self.store)
    }

    /// Wipe chain state, counter and identity together.
    ///
    /// The next boot re-provisions.
    pub fn factory_reset(self) -> Result<S, KeyChainError> {
        self.store.clear(&FACTORY_RESET_SCOPE)?;
        tracing::warn!(device_id = %self.device_id, "factory reset, identity wiped");
        Ok(self.store)
    }
}

impl<S: Store> std::fmt::Debug for KeyChain<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyChain")
            .field("device_id", &self.device_id)
            .field("time_source", &self.config.time_source)
            .field("start_epoch", &self.start_epoch)
            .field("last_epoch", &self.last_epoch)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
