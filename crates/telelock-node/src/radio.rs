//! Radio link capability and a simulated implementation.
//!
//! Join and activation procedures belong to the radio stack. The node only
//! asks whether the session is active, sends one payload at a time, and
//! tells the stack when to restore or persist its session.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::storage::{Namespace, Store};

/// Status code returned when a payload is offered to an inactive session.
pub const STATUS_NOT_ACTIVATED: i16 = -1101;

/// Status code for a transmission that was not acknowledged.
pub const STATUS_TX_TIMEOUT: i16 = -5;

/// Store key for the join nonce.
pub const DEV_NONCE: &str = "dev_nonce";

/// Store key for the persisted session.
pub const SESSION: &str = "session";

/// Failed uplink, with the radio's status code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("radio status {code}")]
pub struct LinkError {
    /// Radio-specific status code
    pub code: i16,
}

/// Radio link collaborator.
pub trait RadioLink {
    /// Whether a network session is active.
    fn is_activated(&self) -> bool;

    /// Transmit one payload and wait for the acknowledgement window.
    fn send_receive(&mut self, payload: &[u8]) -> Result<(), LinkError>;

    /// Restore the persisted session, or re-join. Returns whether the link
    /// is active afterwards.
    fn load_session(&mut self) -> bool;

    /// Persist the session after a successful uplink.
    fn save_session(&mut self);
}

/// Seeded radio simulation backed by the node's store.
///
/// Sessions live in the `Session` namespace, so an activated simulated
/// node stays activated across restarts. Each join attempt consumes a
/// persisted join nonce. Every acknowledged payload is recorded.
pub struct SimulatedRadio<S: Store> {
    store: S,
    rng: ChaCha8Rng,
    failure_rate: f64,
    activated: bool,
    join_available: bool,
    forced_failures: usize,
    uplinks: u32,
    delivered: Vec<Vec<u8>>,
}

impl<S: Store> SimulatedRadio<S> {
    /// Radio that fails each uplink with probability `failure_rate`.
    ///
    /// Starts inactive; the first `load_session` restores or joins.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(store: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            store,
            rng: ChaCha8Rng::seed_from_u64(seed),
            failure_rate,
            activated: false,
            join_available: true,
            forced_failures: 0,
            uplinks: 0,
            delivered: Vec::new(),
        }
    }

    /// Fail the next `count` uplinks regardless of `failure_rate`.
    pub fn fail_next(&mut self, count: usize) {
        self.forced_failures = count;
    }

    /// Drop the current session, as after a network-side reset.
    pub fn deactivate(&mut self) {
        self.activated = false;
    }

    /// Allow or refuse joins (coverage lost).
    pub fn set_join_available(&mut self, available: bool) {
        self.join_available = available;
    }

    /// Every acknowledged payload, oldest first.
    pub fn delivered(&self) -> &[Vec<u8>] {
        &self.delivered
    }

    /// Number of uplinks attempted while activated.
    pub fn uplinks(&self) -> u32 {
        self.uplinks
    }

    fn join(&mut self) -> bool {
        if !self.join_available {
            tracing::warn!("join refused, no network coverage");
            return false;
        }

        let nonce = match self.store.get_u32(Namespace::Session, DEV_NONCE) {
            Ok(nonce) => nonce.unwrap_or(0),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read join nonce");
                return false;
            },
        };
        let next = nonce.wrapping_add(1);

        let persisted = self.store.put_batch(
            Namespace::Session,
            &[(DEV_NONCE, &next.to_le_bytes()[..]), (SESSION, &nonce.to_le_bytes()[..])],
        );
        if let Err(e) = persisted {
            tracing::warn!(error = %e, "cannot persist join nonce");
            return false;
        }

        tracing::info!(dev_nonce = nonce, "joined network");
        true
    }
}

impl<S: Store> RadioLink for SimulatedRadio<S> {
    fn is_activated(&self) -> bool {
        self.activated
    }

    fn send_receive(&mut self, payload: &[u8]) -> Result<(), LinkError> {
        if !self.activated {
            return Err(LinkError { code: STATUS_NOT_ACTIVATED });
        }
        self.uplinks += 1;

        if self.forced_failures > 0 {
            self.forced_failures -= 1;
            return Err(LinkError { code: STATUS_TX_TIMEOUT });
        }
        if self.rng.gen_bool(self.failure_rate) {
            return Err(LinkError { code: STATUS_TX_TIMEOUT });
        }

        self.delivered.push(payload.to_vec());
        Ok(())
    }

    fn load_session(&mut self) -> bool {
        let restored = matches!(self.store.get(Namespace::Session, SESSION), Ok(Some(_)));
        self.activated = (restored && self.join_available) || self.join();
        self.activated
    }

    fn save_session(&mut self) {
        if let Err(e) = self.store.put_u32(Namespace::Session, "uplinks", self.uplinks) {
            tracing::warn!(error = %e, "cannot persist radio session");
        }
    }
}
