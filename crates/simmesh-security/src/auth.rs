//! Envelope authentication with replay defense.
//!
//! Outbound payloads get a timestamp, a random nonce, and an HMAC-SHA256 tag
//! over all three (see [`crate::envelope`] for the layout). Inbound
//! envelopes are accepted only if the timestamp is fresh, the (timestamp,
//! nonce) pair is not among the recently accepted ones, and the tag matches
//! under the current MAC key.
//!
//! Verification order is structure, freshness, then MAC. A rejected envelope
//! leaves the replay cache untouched.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::{
    config::SecurityConfig,
    env::Environment,
    envelope::{self, Envelope, MAC_SIZE},
    error::{ReplayReason, SecurityError},
    keys::{KEY_SIZE, KeySource, SecretKey},
    replay::ReplayCache,
};

type HmacSha256 = Hmac<Sha256>;

/// Detached signature produced by [`MessageAuthenticator::sign_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// HMAC-SHA256 over `message || timestamp || nonce`
    pub tag: [u8; MAC_SIZE],
    /// Signer's monotonic ms
    pub timestamp: u32,
    /// Signer's random nonce
    pub nonce: u32,
}

/// Signs and verifies envelopes with the node's MAC key.
pub struct MessageAuthenticator<E: Environment> {
    env: E,
    config: SecurityConfig,
    mac_key: Option<SecretKey>,
    replay: ReplayCache,
    key_generation: u64,
}

impl<E: Environment> MessageAuthenticator<E> {
    /// Uninitialized authenticator. Call [`begin`](Self::begin) before use.
    pub fn new(env: E, config: SecurityConfig) -> Self {
        Self { env, config, mac_key: None, replay: ReplayCache::new(), key_generation: 0 }
    }

    /// Load the MAC key from `keys`. The replay cache is kept.
    pub fn begin(&mut self, keys: &impl KeySource) -> Result<(), SecurityError> {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        keys.mac_key(&mut key[..])?;

        self.mac_key = Some(SecretKey::from_bytes(*key));
        self.key_generation = keys.generation();

        tracing::debug!(generation = self.key_generation, "Authenticator keyed");
        Ok(())
    }

    /// Reload after a completed rotation. Same as [`begin`](Self::begin).
    pub fn reload(&mut self, keys: &impl KeySource) -> Result<(), SecurityError> {
        self.begin(keys)
    }

    /// Whether a key is loaded.
    pub fn is_initialized(&self) -> bool {
        self.mac_key.is_some()
    }

    /// Generation of the loaded key (0 if unloaded).
    pub fn key_generation(&self) -> u64 {
        self.key_generation
    }

    /// Recently accepted (timestamp, nonce) pairs.
    pub fn replay_cache(&self) -> &ReplayCache {
        &self.replay
    }

    /// Sign `message` with the current time and a fresh nonce.
    pub fn sign_message(&self, message: &[u8]) -> Result<Signature, SecurityError> {
        let key = self.key()?;
        let timestamp = self.env.now_millis();
        let nonce = self.env.random_u32()?;

        let tag = compute_tag(key, &envelope::signed_region(message, timestamp, nonce));
        Ok(Signature { tag, timestamp, nonce })
    }

    /// Check a detached signature.
    ///
    /// Constant-time tag comparison. Stateless: neither freshness nor the
    /// replay cache is consulted or updated.
    pub fn verify_message(
        &self,
        message: &[u8],
        signature: &Signature,
    ) -> Result<(), SecurityError> {
        let key = self.key()?;
        let expected =
            compute_tag(key, &envelope::signed_region(message, signature.timestamp, signature.nonce));

        if tags_match(&expected, &signature.tag) {
            Ok(())
        } else {
            tracing::debug!("Detached signature mismatch");
            Err(SecurityError::Auth)
        }
    }

    /// Wrap `payload` in an authenticated envelope (payload + 40 bytes).
    pub fn append_hmac(&self, payload: &[u8]) -> Result<Vec<u8>, SecurityError> {
        let signature = self.sign_message(payload)?;
        Ok(envelope::seal_parts(payload, signature.timestamp, signature.nonce, &signature.tag))
    }

    /// Verify an envelope and return its payload.
    ///
    /// On success the (timestamp, nonce) pair is recorded so the same
    /// envelope is rejected next time. On failure nothing changes.
    ///
    /// # Errors
    ///
    /// - `Format(EnvelopeTooShort)` if shorter than 40 bytes
    /// - `Replay` if stale, too far ahead, or a duplicate
    /// - `Auth` if the tag does not match
    pub fn verify_and_extract(&mut self, bytes: &[u8]) -> Result<Vec<u8>, SecurityError> {
        let key = self.key()?;
        let envelope = Envelope::parse(bytes).inspect_err(|e| {
            tracing::debug!("Malformed envelope: {e}");
        })?;

        self.check_freshness(envelope.timestamp, envelope.nonce)?;

        let expected = compute_tag(key, envelope.signed);
        if !tags_match(&expected, envelope.tag) {
            tracing::debug!(
                timestamp = envelope.timestamp,
                nonce = envelope.nonce,
                "Envelope MAC mismatch"
            );
            return Err(SecurityError::Auth);
        }

        self.update_replay_cache(envelope.timestamp, envelope.nonce);
        Ok(envelope.payload.to_vec())
    }

    /// Classify a (timestamp, nonce) pair against the local clock and cache.
    ///
    /// The wrapping difference `now - timestamp` is read as a signed value:
    /// non-negative is an age checked against the replay window, negative is
    /// a lead checked against the clock-skew tolerance. A pair that passes
    /// both is then looked up in the replay cache.
    pub fn check_freshness(&self, timestamp: u32, nonce: u32) -> Result<(), SecurityError> {
        let delta = self.env.now_millis().wrapping_sub(timestamp) as i32;

        let rejected = if delta >= 0 {
            let age_ms = delta as u32;
            (age_ms > self.config.replay_window_ms).then_some(ReplayReason::Stale { age_ms })
        } else {
            let ahead_ms = delta.unsigned_abs();
            (ahead_ms > self.config.clock_skew_ms).then_some(ReplayReason::Future { ahead_ms })
        };

        let rejected = rejected
            .or_else(|| self.replay.contains(timestamp, nonce).then_some(ReplayReason::Duplicate));

        match rejected {
            Some(reason) => {
                tracing::debug!(timestamp, nonce, "Replay rejected: {reason}");
                Err(reason.into())
            },
            None => Ok(()),
        }
    }

    /// Whether the pair would be rejected by [`check_freshness`].
    ///
    /// [`check_freshness`]: Self::check_freshness
    pub fn is_replay_attack(&self, timestamp: u32, nonce: u32) -> bool {
        self.check_freshness(timestamp, nonce).is_err()
    }

    /// Record a pair as accepted. Unconditional; callers verify first.
    pub fn update_replay_cache(&mut self, timestamp: u32, nonce: u32) {
        self.replay.record(timestamp, nonce);
    }

    fn key(&self) -> Result<&SecretKey, SecurityError> {
        self.mac_key.as_ref().ok_or(SecurityError::NotInitialized { component: "authenticator" })
    }
}

fn compute_tag(key: &SecretKey, signed: &[u8]) -> [u8; MAC_SIZE] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(signed);

    let mut tag = [0u8; MAC_SIZE];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    tag
}

fn tags_match(expected: &[u8; MAC_SIZE], received: &[u8; MAC_SIZE]) -> bool {
    bool::from(expected[..].ct_eq(&received[..]))
}
