//! Environment abstraction for deterministic testing.
//!
//! Decouples the security layer from device resources (monotonic clock,
//! hardware entropy). Production firmware backs it with the boot counter and
//! the hardware RNG; tests back it with [`crate::SimEnv`] (virtual clock,
//! seeded RNG).

use thiserror::Error;

/// The entropy source could not produce random bytes.
///
/// Always a device-level fault. Nothing in this crate retries after it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("entropy source unavailable: {0}")]
pub struct EntropyError(pub String);

/// Abstract environment providing time and randomness.
///
/// # Invariants
///
/// - `now_millis()` counts milliseconds since boot and wraps at `u32::MAX`
///   like a microcontroller tick counter. Consumers compare timestamps with
///   wrapping arithmetic only.
/// - `fill_random()` uses cryptographically secure entropy in production and
///   either fills the whole buffer or returns an error.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Milliseconds since boot (monotonic, wrapping).
    fn now_millis(&self) -> u32;

    /// Fills the provided buffer with random bytes.
    ///
    /// Blocks until the buffer is filled. Failure is a hard error.
    fn fill_random(&self, buffer: &mut [u8]) -> Result<(), EntropyError>;

    /// Generates a random `u32`, used for envelope nonces.
    fn random_u32(&self) -> Result<u32, EntropyError> {
        let mut bytes = [0u8; 4];
        self.fill_random(&mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }
}
