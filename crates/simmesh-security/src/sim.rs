//! Deterministic environment for tests and simulation.
//!
//! `SimEnv` replaces the boot counter with a virtual clock that only moves
//! when told to, and the hardware RNG with a seeded ChaCha stream. Clones
//! share state, so a test can hold one handle and advance time underneath
//! the components that own the others.

#![allow(clippy::disallowed_types, reason = "Locking simple clock and RNG state")]

use std::sync::{Arc, Mutex};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::env::{EntropyError, Environment};

/// Simulated environment with a virtual millisecond clock and seeded RNG.
///
/// # Panics
///
/// Methods panic if the internal mutex is poisoned (a thread panicked while
/// holding the lock). This is acceptable for test/simulation code.
#[derive(Clone)]
pub struct SimEnv {
    inner: Arc<Mutex<SimState>>,
}

struct SimState {
    now_ms: u32,
    rng: ChaCha20Rng,
    entropy_failing: bool,
}

impl SimEnv {
    /// Create an environment whose clock starts at `start_ms`.
    ///
    /// Same seed, same byte stream.
    pub fn new(seed: u64, start_ms: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                now_ms: start_ms,
                rng: ChaCha20Rng::seed_from_u64(seed),
                entropy_failing: false,
            })),
        }
    }

    /// Advance the virtual clock, wrapping at `u32::MAX` like a tick counter.
    #[allow(clippy::expect_used)]
    pub fn advance(&self, ms: u32) {
        let mut state = self.inner.lock().expect("SimEnv mutex poisoned");
        state.now_ms = state.now_ms.wrapping_add(ms);
    }

    /// Jump the virtual clock to an absolute value (e.g. a reboot resetting
    /// the counter).
    #[allow(clippy::expect_used)]
    pub fn set_millis(&self, now_ms: u32) {
        self.inner.lock().expect("SimEnv mutex poisoned").now_ms = now_ms;
    }

    /// Make every subsequent entropy request fail (or succeed again).
    #[allow(clippy::expect_used)]
    pub fn set_entropy_failing(&self, failing: bool) {
        self.inner.lock().expect("SimEnv mutex poisoned").entropy_failing = failing;
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new(0x5EED_0001, 1_000)
    }
}

impl Environment for SimEnv {
    #[allow(clippy::expect_used)]
    fn now_millis(&self) -> u32 {
        self.inner.lock().expect("SimEnv mutex poisoned").now_ms
    }

    #[allow(clippy::expect_used)]
    fn fill_random(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        let mut state = self.inner.lock().expect("SimEnv mutex poisoned");
        if state.entropy_failing {
            return Err(EntropyError("simulated entropy failure".to_string()));
        }
        state.rng.fill_bytes(buffer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_bytes() {
        let a = SimEnv::new(42, 0);
        let b = SimEnv::new(42, 0);

        let mut bytes_a = [0u8; 32];
        let mut bytes_b = [0u8; 32];
        a.fill_random(&mut bytes_a).unwrap();
        b.fill_random(&mut bytes_b).unwrap();

        assert_eq!(bytes_a, bytes_b);
    }

    #[test]
    fn clones_share_clock() {
        let env = SimEnv::new(1, 500);
        let handle = env.clone();

        handle.advance(250);

        assert_eq!(env.now_millis(), 750);
    }

    #[test]
    fn clock_wraps() {
        let env = SimEnv::new(1, u32::MAX - 10);
        env.advance(20);
        assert_eq!(env.now_millis(), 9);
    }

    #[test]
    fn entropy_failure_is_reported() {
        let env = SimEnv::default();
        env.set_entropy_failing(true);

        let mut buf = [0u8; 4];
        assert!(env.fill_random(&mut buf).is_err());
        assert!(env.random_u32().is_err());

        env.set_entropy_failing(false);
        assert!(env.random_u32().is_ok());
    }
}
