//! Simmesh Security Layer
//!
//! Key lifecycle, payload encryption and authenticated envelopes for nodes
//! of a SIM-bank mesh. Sans-IO: time and entropy come from an
//! [`Environment`], persistence from a [`KeyStore`], so the whole layer runs
//! deterministically under [`SimEnv`] and [`MemoryStore`] in tests.
//!
//! # Data Flow
//!
//! ```text
//! Environment (entropy, ms clock)
//!        │
//!        ▼
//! KeyManager ◄──► KeyStore ("aes_key", "hmac_key", "last_rotation")
//!        │
//!        ├──► MeshCipher            (cipher key)
//!        └──► MessageAuthenticator  (MAC key)
//!
//! outbound: encrypt ─► append_hmac ─► mesh
//! inbound:  mesh ─► verify_and_extract ─► decrypt
//! ```
//!
//! The manager is started first. Cipher and authenticator copy their working
//! keys from it through [`KeySource`] at startup and again after each
//! completed rotation; [`KeySource::generation`] tells them when.
//!
//! # Security
//!
//! Confidentiality:
//! - AES-256 per block, no chaining (see [`cipher`] for the caveats)
//!
//! Authenticity:
//! - HMAC-SHA256 over `payload || timestamp || nonce`
//! - Constant-time tag comparison
//!
//! Replay defense:
//! - Timestamps older than the replay window are rejected
//! - Timestamps further ahead than the clock skew are rejected
//! - The last 100 accepted (timestamp, nonce) pairs are rejected as duplicates
//!
//! Key hygiene:
//! - Keys are zeroized on drop and never logged
//! - Rotation commits in memory only after all writes persisted

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod auth;
pub mod cipher;
pub mod config;
pub mod env;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod replay;
pub mod sim;
pub mod store;

pub use auth::{MessageAuthenticator, Signature};
pub use cipher::MeshCipher;
pub use config::{ConfigError, SecurityConfig};
pub use env::{EntropyError, Environment};
pub use envelope::{ENVELOPE_OVERHEAD, Envelope, MAC_SIZE};
pub use error::{FormatError, ReplayReason, SecurityError};
pub use keys::{KEY_SIZE, KeyKind, KeyManager, KeySource, KeyStatus, RotationRecord, SecretKey};
pub use replay::{REPLAY_CACHE_SIZE, ReplayCache};
pub use sim::SimEnv;
pub use store::{ChaoticStore, KeyStore, MemoryStore, StoreError};
