//! Environment abstraction for deterministic testing.
//!
//! Decouples the node from wall-clock time and the OS RNG. The binary runs
//! on [`SystemEnv`]; tests drive [`SimEnv`], whose clock only moves when told
//! to and whose RNG is seeded.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Time and randomness as seen by the node.
///
/// # Invariants
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (OS entropy
///   exhaustion)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current absolute time in seconds since the Unix epoch.
    ///
    /// Either a local clock or an externally acquired time (a GPS fix); the
    /// key chain treats both the same way.
    fn now_epoch(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);
}

/// Production environment using the system clock and the OS RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. A node without functioning randomness cannot
/// draw a session nonce safely, and RNG failure indicates OS-level issues.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now_epoch(&self) -> u64 {
        // A clock before 1970 reads as the epoch itself
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - node cannot draw nonces");
    }
}

/// Simulated environment with a manual clock and a seeded RNG.
///
/// Clones share the clock and the RNG stream.
#[derive(Clone)]
pub struct SimEnv {
    now: Arc<AtomicU64>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Start the clock at `epoch` with a seeded RNG.
    pub fn new(epoch: u64, seed: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(epoch)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, epoch: u64) {
        self.now.store(epoch, Ordering::SeqCst);
    }
}

impl Environment for SimEnv {
    fn now_epoch(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().expect("SimEnv rng mutex poisoned").fill_bytes(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_env_clock_is_after_provisioning_date() {
        assert!(SystemEnv::new().now_epoch() > 1_742_169_600);
    }

    #[test]
    fn system_env_random_bytes_are_random() {
        let env = SystemEnv::new();

        let mut bytes1 = [0u8; 32];
        let mut bytes2 = [0u8; 32];
        env.random_bytes(&mut bytes1);
        env.random_bytes(&mut bytes2);

        // Extremely unlikely to be equal if random
        assert_ne!(bytes1, bytes2);
    }

    #[test]
    fn sim_env_clock_moves_only_when_told() {
        let env = SimEnv::new(1_000, 7);
        assert_eq!(env.now_epoch(), 1_000);

        env.advance(86_400);
        assert_eq!(env.now_epoch(), 87_400);

        let clone = env.clone();
        clone.set(5);
        assert_eq!(env.now_epoch(), 5);
    }

    #[test]
    fn sim_env_rng_is_reproducible() {
        let a = SimEnv::new(0, 99);
        let b = SimEnv::new(0, 99);

        let mut first = [0u8; 12];
        let mut second = [0u8; 12];
        a.random_bytes(&mut first);
        b.random_bytes(&mut second);

        assert_eq!(first, second);
    }
}
