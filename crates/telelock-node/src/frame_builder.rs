//! Frame construction with a persisted send counter.
//!
//! Every frame embeds a fresh counter value and is encrypted under the
//! effective IV built from it. The counter is advanced and persisted
//! *before* the frame exists, so a crash at any point can skip a value on
//! restart but never reuse one.

use telelock_crypto::{DailyKey, stream_cipher};
use telelock_proto::{EffectiveIv, IvWidth, NONCE_SIZE, NonceMode, SessionNonce, TelemetryFrame};

use crate::{
    config::FrameConfig,
    env::Environment,
    error::FrameBuildError,
    sensors::SensorSnapshot,
    storage::{Namespace, Store},
};

/// Store key for the last embedded counter value.
pub const COUNTER: &str = "counter";

/// Store key for the first counter embedded under the current key.
pub const WINDOW_START: &str = "window_start";

/// Store key for the fingerprint of the key that opened the window.
pub const WINDOW_KEY: &str = "window_key";

/// Distinct counters a 2-byte prefix can carry under one key.
const IV_WINDOW: u64 = 1 << 16;

/// Builds encrypted telemetry frames.
pub struct FrameBuilder<S: Store> {
    store: S,
    config: FrameConfig,
    nonce: SessionNonce,
    last_embedded: Option<u32>,
}

impl<S: Store> FrameBuilder<S> {
    /// Create a builder, drawing the session nonce from `env` if configured.
    ///
    /// A random nonce is fixed for this process lifetime and must reach the
    /// receiver out of band when the frames carry a condensed IV.
    pub fn new<E: Environment>(store: S, config: FrameConfig, env: &E) -> Self {
        let nonce = match config.nonce_mode {
            NonceMode::Zero => SessionNonce::zero(),
            NonceMode::Random => {
                let mut bytes = [0u8; NONCE_SIZE];
                env.random_bytes(&mut bytes);
                SessionNonce::from_bytes(bytes)
            },
        };

        if config.nonce_mode == NonceMode::Random && config.iv_width != IvWidth::Full16 {
            tracing::info!(
                nonce = %hex::encode(nonce.as_bytes()),
                iv_width = ?config.iv_width,
                "session nonce drawn; receiver needs it to rebuild condensed IVs"
            );
        }

        Self::with_nonce(store, config, nonce)
    }

    /// Create a builder with an explicit session nonce.
    pub fn with_nonce(store: S, config: FrameConfig, nonce: SessionNonce) -> Self {
        Self { store, config, nonce, last_embedded: None }
    }

    /// The nonce half of every effective IV this builder produces.
    pub fn nonce(&self) -> &SessionNonce {
        &self.nonce
    }

    /// Frame configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Counter embedded in the most recent frame of this process, if any.
    pub fn last_embedded(&self) -> Option<u32> {
        self.last_embedded
    }

    /// The single point where the send counter is read, advanced and
    /// persisted.
    ///
    /// Returns the new value, which is already durable and is the one to
    /// embed. A fresh store starts at 1.
    ///
    /// With a 2-byte prefix the IV only carries the low 16 bits, so at most
    /// 65536 consecutive counters may be embedded under one key. The first
    /// counter used under each key is persisted alongside the counter.
    ///
    /// # Errors
    ///
    /// `CounterExhausted` at `u32::MAX`; `IvSpaceExhausted` once the 16-bit
    /// window under `key` is used up; `Store` if the value cannot be read or
    /// persisted. Nothing is advanced or embedded on error.
    pub fn get_and_advance_counter(&mut self, key: &DailyKey) -> Result<u32, FrameBuildError> {
        let last = self.store.get_u32(Namespace::Counter, COUNTER)?.unwrap_or(0);
        let next = last.checked_add(1).ok_or(FrameBuildError::CounterExhausted { counter: last })?;

        if self.config.iv_width == IvWidth::Counter2 {
            self.advance_in_window(next, key)?;
        } else {
            self.store.put_u32(Namespace::Counter, COUNTER, next)?;
        }

        self.last_embedded = Some(next);
        Ok(next)
    }

    fn advance_in_window(&self, next: u32, key: &DailyKey) -> Result<(), FrameBuildError> {
        let fingerprint = key.fingerprint();
        let stored_key = self.store.get_string(Namespace::Counter, WINDOW_KEY)?;

        if stored_key.as_deref() != Some(fingerprint.as_str()) {
            // First frame under this key opens a new window
            self.store.put_batch(Namespace::Counter, &[
                (COUNTER, &next.to_le_bytes()[..]),
                (WINDOW_START, &next.to_le_bytes()[..]),
                (WINDOW_KEY, fingerprint.as_bytes()),
            ])?;
            return Ok(());
        }

        let window_start = self.store.get_u32(Namespace::Counter, WINDOW_START)?.unwrap_or(next);
        if u64::from(next).saturating_sub(u64::from(window_start)) >= IV_WINDOW {
            tracing::error!(
                counter = next,
                window_start,
                key = %fingerprint,
                "16-bit IV space exhausted under current key; waiting for rotation"
            );
            return Err(FrameBuildError::IvSpaceExhausted { counter: next, window_start });
        }

        self.store.put_u32(Namespace::Counter, COUNTER, next)?;
        Ok(())
    }

    /// Build one frame: advance the counter, lay out the readings, encrypt
    /// the secure block in place under `key`.
    pub fn build_frame(
        &mut self,
        snapshot: &SensorSnapshot,
        key: &DailyKey,
    ) -> Result<TelemetryFrame, FrameBuildError> {
        let counter = self.get_and_advance_counter(key)?;
        let frame = self.seal(counter, snapshot, key);

        tracing::debug!(counter, frame = %frame.to_hex(), "frame built");

        Ok(frame)
    }

    /// Lay out and encrypt a frame for an already reserved counter value.
    ///
    /// Deterministic: the same counter, snapshot, key and nonce always give
    /// the same bytes. Never call it twice with one counter under one key.
    pub fn seal(&self, counter: u32, snapshot: &SensorSnapshot, key: &DailyKey) -> TelemetryFrame {
        let width = self.config.iv_width;
        let iv = EffectiveIv::new(counter, width, &self.nonce);

        let mut frame = TelemetryFrame::encode(
            &iv,
            width,
            &snapshot.clear_fields(),
            &snapshot.secure_fields(),
        );
        stream_cipher::apply(frame.secure_region_mut(), iv.as_bytes(), key);

        frame
    }
}
