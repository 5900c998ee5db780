//! Production Environment implementation using the system clock and OS RNG.
//!
//! `SystemEnv` is the production implementation of the Environment trait.
//!
//! # Capabilities
//!
//! - Millisecond counter derived from the system clock, truncated to `u32`
//!   so it wraps like a device tick counter and keeps counting across process
//!   restarts
//! - OS cryptographic RNG (getrandom). Truly random, not reproducible
//!
//! This means production behavior is non-deterministic, but provides
//! real-world timing and security-grade randomness.

use simmesh_security::{EntropyError, Environment};

/// Production environment using system time and cryptographic RNG.
///
/// # Clock
///
/// The tick is wall-clock milliseconds since the Unix epoch, truncated to
/// `u32`, not a monotonic counter since boot. The persisted rotation time is
/// read back by every CLI invocation, and a per-process counter would restart
/// at zero each run and make the stored value meaningless. The cost is that
/// the tick follows clock adjustments: an NTP step backwards makes envelopes
/// sealed just before it look like they come from the future (rejected past
/// the skew allowance), and a step forwards ages them (rejected past the
/// replay window). A step backwards also reads as a counter wrap to the
/// rotation schedule, which then rotates early.
///
/// # Security
///
/// The RNG uses getrandom which provides OS-level cryptographic randomness
/// (e.g., /dev/urandom on Linux, `BCryptGenRandom` on Windows). Failure is
/// reported as [`EntropyError`] rather than a panic so the security layer can
/// refuse the operation and raise a health alarm.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::disallowed_methods)]
    fn now_millis(&self) -> u32 {
        // A clock before the epoch reads as 0 ("never rotated"), which only
        // brings the next rotation forward.
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u32)
            .unwrap_or(0)
    }

    fn fill_random(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        getrandom::fill(buffer).map_err(|e| EntropyError(e.to_string()))
    }
}
