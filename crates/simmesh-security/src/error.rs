//! Error types for the security layer.
//!
//! One public error, [`SecurityError`], with a variant per failure class:
//! - `Storage`: key store unavailable, blob missing, or write failed
//! - `Rng`: entropy source unavailable
//! - `Format`: envelope too short, bad ciphertext length or encoding
//! - `Auth`: MAC mismatch
//! - `Replay`: stale or future timestamp, duplicate nonce
//! - `KeyLength`: caller asked for a key into a buffer of the wrong size
//!
//! Every error is terminal for the single operation that produced it. None of
//! them is retried inside the layer.

use thiserror::Error;

use crate::{env::EntropyError, store::StoreError};

/// Structural problems with bytes handed to the layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Envelope shorter than the fixed 40-byte overhead
    #[error("envelope too short: {len} bytes")]
    EnvelopeTooShort {
        /// Received length
        len: usize,
    },

    /// Ciphertext length is not a whole number of encoded blocks
    #[error("ciphertext length {len} is not a positive multiple of the encoded block size")]
    CiphertextLength {
        /// Received length in encoded characters
        len: usize,
    },

    /// Ciphertext is not valid hex
    #[error("ciphertext is not valid hex")]
    InvalidEncoding,

    /// Authenticated payload was expected to carry encoded ciphertext
    #[error("payload is not valid UTF-8 ciphertext")]
    NotUtf8,
}

/// Why a (timestamp, nonce) pair was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayReason {
    /// Timestamp older than the replay window
    #[error("timestamp {age_ms} ms old")]
    Stale {
        /// Age relative to the local clock
        age_ms: u32,
    },

    /// Timestamp further ahead than the clock-skew tolerance
    #[error("timestamp {ahead_ms} ms in the future")]
    Future {
        /// Distance ahead of the local clock
        ahead_ms: u32,
    },

    /// Exact pair already accepted recently
    #[error("duplicate timestamp and nonce")]
    Duplicate,
}

/// Errors produced by the security layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    /// Key store failure (open, read or write)
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Entropy source failure
    #[error("rng error: {0}")]
    Rng(#[from] EntropyError),

    /// Malformed input
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// MAC did not match
    #[error("authentication failed")]
    Auth,

    /// Replay defense rejected the message
    #[error("replay rejected: {0}")]
    Replay(#[from] ReplayReason),

    /// Key requested into a buffer of the wrong size
    #[error("invalid key length: expected {expected}, got {actual}")]
    KeyLength {
        /// Required buffer length
        expected: usize,
        /// Buffer length supplied
        actual: usize,
    },

    /// Component used before `begin()` succeeded
    #[error("{component} used before initialization")]
    NotInitialized {
        /// Which component
        component: &'static str,
    },
}

impl SecurityError {
    /// Returns true for device-level faults (store or entropy source).
    ///
    /// These warrant an operator-visible alarm rather than a debug log line.
    pub fn is_device_fault(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Rng(_))
    }

    /// Returns true for failures that are routine on a live mesh.
    ///
    /// Forged, corrupted, replayed or stale-key traffic all land here and are
    /// dropped without further action.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::Auth | Self::Replay(_))
    }
}
