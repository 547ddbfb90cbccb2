//! Chaotic store wrapper for fault injection testing
//!
//! Wraps another store and randomly fails operations, so tests can verify
//! that a failed flash write never produces a reused counter or a key that
//! disagrees with its epoch.

use std::sync::{Arc, Mutex};

use super::{Namespace, Store, StoreError};

/// Chaotic store wrapper that randomly injects failures
///
/// Delegates to an underlying store but fails operations with a configured
/// probability. A failed write never reaches the inner store, matching the
/// all-or-nothing guarantee of the real backends.
#[derive(Clone)]
pub struct ChaoticStore<S: Store> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Number of failures injected so far
    injected: Arc<Mutex<usize>>,
}

/// Simple deterministic RNG for chaos injection
///
/// Linear congruential generator, so chaos tests are reproducible with the
/// same seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate next random value [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: Store> ChaoticStore<S> {
    /// Create a new chaotic store wrapper
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            injected: Arc::new(Mutex::new(0)),
        }
    }

    /// Underlying store (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of operations failed so far.
    pub fn injected_failures(&self) -> usize {
        #[allow(clippy::expect_used)]
        *self.injected.lock().expect("injected mutex poisoned")
    }

    /// Fail this operation with probability `failure_rate`.
    fn maybe_fail(&self, operation: &'static str) -> Result<(), StoreError> {
        #[allow(clippy::expect_used)]
        let roll = self.rng.lock().expect("ChaoticRng mutex poisoned").next();

        if roll < self.failure_rate {
            #[allow(clippy::expect_used)]
            let mut injected = self.injected.lock().expect("injected mutex poisoned");
            *injected += 1;
            return Err(StoreError::Injected { operation });
        }

        Ok(())
    }
}

impl<S: Store> Store for ChaoticStore<S> {
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.maybe_fail("get")?;
        self.inner.get(namespace, key)
    }

    fn put_batch(&self, namespace: Namespace, entries: &[(&str, &[u8])]) -> Result<(), StoreError> {
        self.maybe_fail("put_batch")?;
        self.inner.put_batch(namespace, entries)
    }

    fn clear(&self, namespaces: &[Namespace]) -> Result<(), StoreError> {
        self.maybe_fail("clear")?;
        self.inner.clear(namespaces)
    }
}
