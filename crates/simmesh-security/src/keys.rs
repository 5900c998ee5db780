//! Key lifecycle management.
//!
//! The [`KeyManager`] owns the node's two long-term secrets (cipher key and
//! MAC key), bootstraps them on first boot, rotates them on a schedule, and
//! hands out copies through the [`KeySource`] accessors.
//!
//! # Rotation commit order
//!
//! ```text
//! generate cipher key ─┐
//! generate MAC key   ──┤  RngError here: nothing written
//!                      ▼
//! put aes_key ─► put hmac_key ─► put last_rotation
//!                      │  StorageError here: in-memory keys unchanged
//!                      ▼
//! commit in-memory active keys, bump generation
//! ```
//!
//! Readers only ever see the in-memory pair, so they observe either the old
//! keys or the new keys, never a mix. A crash partway through the writes can
//! leave the persisted blobs from two generations; the next boot loads
//! whatever is on flash, and peers treat the mismatch like any other stale
//! key (authentication failures until the next rotation).

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    config::SecurityConfig,
    env::Environment,
    error::SecurityError,
    store::{KeyStore, StoreError},
};

/// Length of every long-term key, in bytes.
pub const KEY_SIZE: usize = 32;

/// Blob name of the persisted rotation timestamp.
const ROTATION_TIME_NAME: &str = "last_rotation";

/// A 256-bit secret.
///
/// Zeroized on drop. Neither `Clone` nor `PartialEq`: copies
/// leave the key manager only through [`KeySource`] into caller-owned
/// buffers.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_SIZE]);

impl SecretKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Borrow the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Which of the node's two keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// AES-256 key for payload encryption
    Cipher,
    /// HMAC-SHA256 key for envelope authentication
    Mac,
}

impl KeyKind {
    /// Blob name in the key store.
    pub fn store_name(self) -> &'static str {
        match self {
            Self::Cipher => "aes_key",
            Self::Mac => "hmac_key",
        }
    }
}

/// Persisted time of the last completed rotation.
///
/// Stored as a 4-byte little-endian blob. Zero means "never rotated".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationRecord {
    /// Monotonic milliseconds at which the last rotation committed
    pub last_rotation_ms: u32,
}

impl RotationRecord {
    /// Encoded blob length.
    pub const SIZE: usize = 4;

    fn to_bytes(self) -> [u8; Self::SIZE] {
        self.last_rotation_ms.to_le_bytes()
    }

    fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self { last_rotation_ms: u32::from_le_bytes(bytes) }
    }

    fn never_rotated(self) -> bool {
        self.last_rotation_ms == 0
    }
}

/// Read-only access to the active keys.
///
/// Implemented by [`KeyManager`]. Consumed by the cipher and authenticator,
/// and by modules (OTA, secure boot) that need a key but implement no crypto
/// of their own.
pub trait KeySource {
    /// Copy the active cipher key into `out`.
    ///
    /// # Errors
    ///
    /// - `KeyLength` if `out.len() != 32`
    /// - `Storage(NotFound)` if no key is active
    fn cipher_key(&self, out: &mut [u8]) -> Result<(), SecurityError>;

    /// Copy the active MAC key into `out`. Same contract as
    /// [`cipher_key`](Self::cipher_key).
    fn mac_key(&self, out: &mut [u8]) -> Result<(), SecurityError>;

    /// Number of key sets committed since `begin()`.
    ///
    /// Consumers compare it with the generation they loaded to notice a
    /// rotation.
    fn generation(&self) -> u64;
}

/// Snapshot of rotation state for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStatus {
    /// Both keys are active in memory
    pub keys_initialized: bool,
    /// Committed key sets since `begin()`
    pub generation: u64,
    /// Milliseconds since the last rotation (0 if never)
    pub since_rotation_ms: u32,
    /// Milliseconds until rotation is due (0 if already due)
    pub until_rotation_ms: u32,
    /// Whether a rotation check would rotate now
    pub rotation_due: bool,
}

/// Owns key generation, scheduled rotation and the active key pair.
pub struct KeyManager<E: Environment, S: KeyStore> {
    env: E,
    store: S,
    config: SecurityConfig,
    rotation: RotationRecord,
    cipher_key: Option<SecretKey>,
    mac_key: Option<SecretKey>,
    generation: u64,
}

impl<E: Environment, S: KeyStore> KeyManager<E, S> {
    /// Create a manager over `store`. Nothing is read until [`begin`].
    ///
    /// [`begin`]: Self::begin
    pub fn new(env: E, store: S, config: SecurityConfig) -> Self {
        Self {
            env,
            store,
            config,
            rotation: RotationRecord { last_rotation_ms: 0 },
            cipher_key: None,
            mac_key: None,
            generation: 0,
        }
    }

    /// Open the store, load the rotation record, and load or bootstrap both
    /// keys.
    ///
    /// # Errors
    ///
    /// - `Storage` if the store cannot be opened or read
    /// - `Rng` if the entropy source cannot produce bytes
    pub fn begin(&mut self) -> Result<(), SecurityError> {
        self.store.open().inspect_err(|e| {
            tracing::error!("Key store failed to open: {e}");
        })?;

        // Probe the entropy source before trusting it with key generation.
        let mut probe = [0u8; 4];
        self.env.fill_random(&mut probe).inspect_err(|e| {
            tracing::error!("Entropy source failed: {e}");
        })?;

        self.rotation = self.load_rotation_record()?;

        if self.keys_initialized()? {
            let cipher_key = self.load_key(KeyKind::Cipher)?;
            let mac_key = self.load_key(KeyKind::Mac)?;
            self.cipher_key = Some(cipher_key);
            self.mac_key = Some(mac_key);
            self.generation += 1;
            tracing::info!("Keys loaded from secure store");
        } else {
            tracing::info!("Keys not found, generating new keys");
            self.rotate_keys()?;
            tracing::info!("Initial keys generated");
        }

        Ok(())
    }

    /// Fill `out` with cryptographically secure random bytes.
    pub fn generate_secure_key(&self, out: &mut [u8]) -> Result<(), SecurityError> {
        self.env.fill_random(out).map_err(|e| {
            tracing::error!("Key generation failed: {e}");
            SecurityError::Rng(e)
        })
    }

    /// Replace both keys.
    ///
    /// Generates two keys, persists cipher key, MAC key and rotation time in
    /// that order, then commits them as the active pair. On any failure the
    /// previously active keys stay in effect.
    pub fn rotate_keys(&mut self) -> Result<(), SecurityError> {
        tracing::info!(generation = self.generation, "Starting key rotation");

        let mut cipher_bytes = [0u8; KEY_SIZE];
        let mut mac_bytes = [0u8; KEY_SIZE];
        let result = self.generate_and_persist(&mut cipher_bytes, &mut mac_bytes);

        match &result {
            Ok(record) => {
                self.cipher_key = Some(SecretKey::from_bytes(cipher_bytes));
                self.mac_key = Some(SecretKey::from_bytes(mac_bytes));
                self.rotation = *record;
                self.generation += 1;
                tracing::info!(generation = self.generation, "Key rotation completed");
            },
            Err(e) => {
                tracing::warn!("Key rotation failed, previous keys remain active: {e}");
            },
        }

        cipher_bytes.zeroize();
        mac_bytes.zeroize();
        result.map(|_| ())
    }

    fn generate_and_persist(
        &self,
        cipher_bytes: &mut [u8; KEY_SIZE],
        mac_bytes: &mut [u8; KEY_SIZE],
    ) -> Result<RotationRecord, SecurityError> {
        self.generate_secure_key(&mut cipher_bytes[..])?;
        self.generate_secure_key(&mut mac_bytes[..])?;

        self.store.put(KeyKind::Cipher.store_name(), &cipher_bytes[..])?;
        self.store.put(KeyKind::Mac.store_name(), &mac_bytes[..])?;

        let record = RotationRecord { last_rotation_ms: self.env.now_millis() };
        self.store.put(ROTATION_TIME_NAME, &record.to_bytes())?;

        Ok(record)
    }

    /// Whether the scheduled rotation is due.
    ///
    /// True if never rotated, if at least one interval has elapsed, or if the
    /// elapsed time exceeds twice the interval. The last case is a heuristic
    /// for a counter that restarted (reboot) or wrapped past the persisted
    /// timestamp: the wrapping difference then looks implausibly large, and
    /// rotating early is preferred over trusting it. It is approximate, not
    /// exact clock arithmetic.
    pub fn should_rotate_keys(&self) -> bool {
        if self.rotation.never_rotated() {
            return true;
        }

        let elapsed = self.time_since_last_rotation();
        let interval = self.config.rotation_interval_ms;

        if elapsed > interval.saturating_mul(2) {
            return true;
        }

        elapsed >= interval
    }

    /// Milliseconds since the last rotation, or 0 if never rotated.
    pub fn time_since_last_rotation(&self) -> u32 {
        if self.rotation.never_rotated() {
            return 0;
        }
        self.env.now_millis().wrapping_sub(self.rotation.last_rotation_ms)
    }

    /// Milliseconds until the next rotation is due (0 if due now).
    pub fn time_until_rotation(&self) -> u32 {
        if self.should_rotate_keys() {
            return 0;
        }
        self.config.rotation_interval_ms.saturating_sub(self.time_since_last_rotation())
    }

    /// Whether both key blobs are present in the store with the right length.
    pub fn keys_initialized(&self) -> Result<bool, SecurityError> {
        let cipher_len = self.store.len_of(KeyKind::Cipher.store_name())?;
        let mac_len = self.store.len_of(KeyKind::Mac.store_name())?;
        Ok(cipher_len == Some(KEY_SIZE) && mac_len == Some(KEY_SIZE))
    }

    /// Persisted rotation record as last loaded or committed.
    pub fn rotation_record(&self) -> RotationRecord {
        self.rotation
    }

    /// Active configuration.
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Diagnostic snapshot.
    pub fn status(&self) -> KeyStatus {
        KeyStatus {
            keys_initialized: self.cipher_key.is_some() && self.mac_key.is_some(),
            generation: self.generation,
            since_rotation_ms: self.time_since_last_rotation(),
            until_rotation_ms: self.time_until_rotation(),
            rotation_due: self.should_rotate_keys(),
        }
    }

    fn load_rotation_record(&self) -> Result<RotationRecord, SecurityError> {
        let mut bytes = [0u8; RotationRecord::SIZE];
        match self.store.get(ROTATION_TIME_NAME, &mut bytes) {
            Ok(()) => Ok(RotationRecord::from_bytes(bytes)),
            Err(StoreError::NotFound { .. } | StoreError::LengthMismatch { .. }) => {
                Ok(RotationRecord { last_rotation_ms: 0 })
            },
            Err(e) => Err(e.into()),
        }
    }

    fn load_key(&self, kind: KeyKind) -> Result<SecretKey, SecurityError> {
        let mut bytes = [0u8; KEY_SIZE];
        let loaded = self.store.get(kind.store_name(), &mut bytes);
        let key = SecretKey::from_bytes(bytes);
        bytes.zeroize();
        loaded.inspect_err(|e| tracing::error!("Failed to load {kind:?} key: {e}"))?;
        Ok(key)
    }

    fn copy_key(
        key: Option<&SecretKey>,
        kind: KeyKind,
        out: &mut [u8],
    ) -> Result<(), SecurityError> {
        if out.len() != KEY_SIZE {
            return Err(SecurityError::KeyLength { expected: KEY_SIZE, actual: out.len() });
        }

        let key = key.ok_or_else(|| {
            SecurityError::Storage(StoreError::NotFound { name: kind.store_name().to_string() })
        })?;

        out.copy_from_slice(key.as_bytes());
        Ok(())
    }
}

impl<E: Environment, S: KeyStore> KeySource for KeyManager<E, S> {
    fn cipher_key(&self, out: &mut [u8]) -> Result<(), SecurityError> {
        Self::copy_key(self.cipher_key.as_ref(), KeyKind::Cipher, out)
    }

    fn mac_key(&self, out: &mut [u8]) -> Result<(), SecurityError> {
        Self::copy_key(self.mac_key.as_ref(), KeyKind::Mac, out)
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}
