//! Chaotic key store wrapper for fault injection testing
//!
//! Store wrapper that fails operations to test rotation commit ordering and
//! error reporting. Two modes, usable together:
//! - a random failure rate over every operation (seeded, reproducible)
//! - a write budget: after N successful `put` calls every write fails,
//!   modelling power loss or flash wear-out partway through a rotation

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use super::{KeyStore, StoreError};

/// Chaotic store wrapper that injects failures
///
/// Delegates to an underlying store but fails operations based on a
/// configured failure rate and an optional write budget. Uses Arc<Mutex<>>
/// for the mutable state, making it Clone and thread-safe.
#[derive(Clone)]
pub struct ChaoticStore<S: KeyStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Remaining successful writes, `None` for unlimited
    write_budget: Arc<Mutex<Option<usize>>>,
    /// Operation counter
    operation_count: Arc<Mutex<usize>>,
}

/// Simple deterministic RNG for chaos injection
///
/// Uses linear congruential generator (LCG) for fast, deterministic randomness.
/// This ensures chaos tests are reproducible with the same seed.
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

    fn should_fail(&mut self, failure_rate: f64) -> bool {
        self.next() < failure_rate
    }
}

impl<S: KeyStore> ChaoticStore<S> {
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
            write_budget: Arc::new(Mutex::new(None)),
            operation_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Allow `writes` more successful `put` calls, then fail every write.
    ///
    /// `None` removes the limit.
    #[allow(clippy::expect_used)]
    pub fn set_write_budget(&self, writes: Option<usize>) {
        *self.write_budget.lock().expect("write_budget mutex poisoned") = writes;
    }

    /// Underlying store (for checking persisted state after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of store operations attempted.
    #[allow(clippy::expect_used)]
    pub fn operation_count(&self) -> usize {
        *self.operation_count.lock().expect("operation_count mutex poisoned")
    }

    #[allow(clippy::expect_used)]
    fn increment_operation_count(&self) {
        let mut count = self.operation_count.lock().expect("operation_count mutex poisoned");
        *count += 1;
    }

    #[allow(clippy::expect_used)]
    fn should_fail(&self) -> bool {
        self.rng.lock().expect("ChaoticRng mutex poisoned").should_fail(self.failure_rate)
    }

    /// Consume one write from the budget. False once the budget is spent.
    #[allow(clippy::expect_used)]
    fn take_write(&self) -> bool {
        let mut budget = self.write_budget.lock().expect("write_budget mutex poisoned");
        match budget.as_mut() {
            None => true,
            Some(0) => false,
            Some(remaining) => {
                *remaining -= 1;
                true
            },
        }
    }
}

impl<S: KeyStore> KeyStore for ChaoticStore<S> {
    fn open(&self) -> Result<(), StoreError> {
        self.increment_operation_count();
        if self.should_fail() {
            return Err(StoreError::Unavailable("chaotic failure injection".to_string()));
        }
        self.inner.open()
    }

    fn get(&self, name: &str, out: &mut [u8]) -> Result<(), StoreError> {
        self.increment_operation_count();
        if self.should_fail() {
            return Err(StoreError::Io("chaotic failure injection".to_string()));
        }
        self.inner.get(name, out)
    }

    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.increment_operation_count();
        if self.should_fail() || !self.take_write() {
            return Err(StoreError::Io("chaotic failure injection".to_string()));
        }
        self.inner.put(name, bytes)
    }

    fn len_of(&self, name: &str) -> Result<Option<usize>, StoreError> {
        self.increment_operation_count();
        if self.should_fail() {
            return Err(StoreError::Io("chaotic failure injection".to_string()));
        }
        self.inner.len_of(name)
    }
}
