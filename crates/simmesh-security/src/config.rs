//! Tunables for key rotation and replay defense.

use thiserror::Error;

/// Default key rotation interval: 24 hours.
pub const DEFAULT_ROTATION_INTERVAL_MS: u32 = 86_400_000;

/// Default replay window: 5 minutes.
pub const DEFAULT_REPLAY_WINDOW_MS: u32 = 300_000;

/// Default tolerance for timestamps ahead of the local clock: 1 minute.
pub const DEFAULT_CLOCK_SKEW_MS: u32 = 60_000;

/// Security layer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityConfig {
    /// Age after which the key pair is replaced
    pub rotation_interval_ms: u32,
    /// Oldest envelope timestamp accepted, relative to the local clock
    pub replay_window_ms: u32,
    /// Furthest-ahead envelope timestamp accepted
    pub clock_skew_ms: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rotation_interval_ms: DEFAULT_ROTATION_INTERVAL_MS,
            replay_window_ms: DEFAULT_REPLAY_WINDOW_MS,
            clock_skew_ms: DEFAULT_CLOCK_SKEW_MS,
        }
    }
}

/// Rejected configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Rotation interval is zero or too large for the wrap heuristic
    #[error("rotation interval {0} ms out of range")]
    RotationInterval(u32),

    /// Replay window or skew cannot be distinguished on a wrapping clock
    #[error("{name} of {value} ms exceeds half the clock range")]
    WindowTooLarge {
        /// Which field
        name: &'static str,
        /// Offending value
        value: u32,
    },
}

impl SecurityConfig {
    /// Check that the values make sense on a 32-bit wrapping clock.
    ///
    /// The rotation interval must be non-zero and its double must fit in
    /// `u32` (the implausible-delta heuristic compares against it). The
    /// replay window and skew must each fit in `i32` so that age and
    /// lead can be told apart from a wrapping difference.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rotation_interval_ms == 0 || self.rotation_interval_ms.checked_mul(2).is_none() {
            return Err(ConfigError::RotationInterval(self.rotation_interval_ms));
        }

        let half_range = i32::MAX as u32;
        if self.replay_window_ms > half_range {
            return Err(ConfigError::WindowTooLarge {
                name: "replay window",
                value: self.replay_window_ms,
            });
        }
        if self.clock_skew_ms > half_range {
            return Err(ConfigError::WindowTooLarge {
                name: "clock skew",
                value: self.clock_skew_ms,
            });
        }

        Ok(())
    }
}
