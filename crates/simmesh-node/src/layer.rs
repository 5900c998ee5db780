//! Owned security layer handle.
//!
//! Bundles the key manager, cipher and authenticator of one node and wires
//! them in the right order. Ownership replaces any process-wide instance:
//! whoever holds the `SecurityLayer` is the only one who can mutate it, and
//! every mutating call takes `&mut self`.

use std::fmt;

use simmesh_security::{
    Environment, FormatError, KeyManager, KeySource, KeyStatus, KeyStore, MeshCipher,
    MessageAuthenticator, SecurityConfig, SecurityError,
};

use crate::{error::NodeError, health::HealthReporter};

/// Diagnostic snapshot of the whole layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityStatus {
    /// Key manager view
    pub keys: KeyStatus,
    /// Cipher has a key loaded
    pub cipher_ready: bool,
    /// Authenticator has a key loaded
    pub auth_ready: bool,
    /// Pairs currently held in the replay cache
    pub replay_entries: usize,
}

impl fmt::Display for SecurityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yes_no = |flag: bool| if flag { "yes" } else { "no" };

        writeln!(f, "keys initialized:   {}", yes_no(self.keys.keys_initialized))?;
        writeln!(f, "key generation:     {}", self.keys.generation)?;
        writeln!(f, "since rotation:     {} s", self.keys.since_rotation_ms / 1_000)?;
        writeln!(f, "until rotation:     {} s", self.keys.until_rotation_ms / 1_000)?;
        writeln!(f, "rotation due:       {}", yes_no(self.keys.rotation_due))?;
        writeln!(f, "cipher ready:       {}", yes_no(self.cipher_ready))?;
        writeln!(f, "authenticator ready: {}", yes_no(self.auth_ready))?;
        write!(f, "replay cache:       {} entries", self.replay_entries)
    }
}

/// A started security layer.
pub struct SecurityLayer<E: Environment, S: KeyStore, H: HealthReporter> {
    keys: KeyManager<E, S>,
    cipher: MeshCipher,
    auth: MessageAuthenticator<E>,
    health: H,
}

impl<E: Environment, S: KeyStore, H: HealthReporter> SecurityLayer<E, S, H> {
    /// Validate `config`, then begin the key manager, cipher and
    /// authenticator in that order.
    ///
    /// Device faults are reported to `health` before being returned.
    pub fn start(env: E, store: S, config: SecurityConfig, health: H) -> Result<Self, NodeError> {
        config.validate()?;

        let mut keys = KeyManager::new(env.clone(), store, config);
        let mut cipher = MeshCipher::new();
        let mut auth = MessageAuthenticator::new(env, config);

        let started = keys
            .begin()
            .and_then(|()| cipher.begin(&keys))
            .and_then(|()| auth.begin(&keys));
        raise_on_fault(&health, &started);
        started?;

        tracing::info!(generation = keys.generation(), "Security layer started");
        Ok(Self { keys, cipher, auth, health })
    }

    /// Encrypt then authenticate an outbound payload.
    ///
    /// The envelope payload is the hex ciphertext.
    pub fn seal(&self, payload: &[u8]) -> Result<Vec<u8>, SecurityError> {
        let sealed = self
            .cipher
            .encrypt(payload)
            .and_then(|ciphertext| self.auth.append_hmac(ciphertext.as_bytes()));
        self.report(sealed)
    }

    /// Verify then decrypt an inbound envelope.
    pub fn open(&mut self, envelope: &[u8]) -> Result<Vec<u8>, SecurityError> {
        let ciphertext = self.auth.verify_and_extract(envelope).inspect_err(|e| {
            if matches!(e, SecurityError::Auth) {
                tracing::debug!(
                    generation = self.keys.generation(),
                    "Envelope rejected, possibly stale key on sender or receiver"
                );
            }
        })?;

        let ciphertext = std::str::from_utf8(&ciphertext).map_err(|_| FormatError::NotUtf8)?;
        self.cipher.decrypt(ciphertext)
    }

    /// Rotate if the schedule says so. Returns whether a rotation happened.
    ///
    /// Meant for a low-priority periodic task, not the receive path.
    pub fn check_rotation(&mut self) -> Result<bool, SecurityError> {
        if !self.keys.should_rotate_keys() {
            return Ok(false);
        }

        self.rotate_now()?;
        Ok(true)
    }

    /// Rotate unconditionally and reload the cipher and authenticator.
    ///
    /// On failure the previous keys stay active everywhere.
    pub fn rotate_now(&mut self) -> Result<(), SecurityError> {
        let rotated = self
            .keys
            .rotate_keys()
            .and_then(|()| self.cipher.reload(&self.keys))
            .and_then(|()| self.auth.reload(&self.keys));
        self.report(rotated)
    }

    /// Diagnostic snapshot.
    pub fn status(&self) -> SecurityStatus {
        SecurityStatus {
            keys: self.keys.status(),
            cipher_ready: self.cipher.is_initialized(),
            auth_ready: self.auth.is_initialized(),
            replay_entries: self.auth.replay_cache().len(),
        }
    }

    /// Key accessors for collaborators (OTA, secure boot).
    pub fn keys(&self) -> &KeyManager<E, S> {
        &self.keys
    }

    fn report<T>(&self, result: Result<T, SecurityError>) -> Result<T, SecurityError> {
        raise_on_fault(&self.health, &result);
        result
    }
}

fn raise_on_fault<T>(health: &impl HealthReporter, result: &Result<T, SecurityError>) {
    if let Some(e) = result.as_ref().err().filter(|e| e.is_device_fault()) {
        health.raise_alarm(e);
    }
}
