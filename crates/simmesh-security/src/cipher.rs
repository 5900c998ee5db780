//! AES-256 payload cipher.
//!
//! Pads the plaintext to whole 16-byte blocks, encrypts each block
//! independently with AES-256, and hex-encodes the result for transport.
//!
//! # Security
//!
//! Blocks are encrypted with no chaining and no IV (ECB). Identical
//! plaintext blocks under the same key produce identical ciphertext blocks,
//! and there is no integrity protection of its own. Integrity comes from the
//! authenticated envelope wrapped around the ciphertext. The scheme is kept
//! as-is for wire compatibility with deployed nodes. The intended
//! replacement is AES-256-CTR with the counter block built from the
//! envelope's nonce and timestamp, switched on all nodes at once.

use aes::{
    Aes256,
    cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray},
};
use zeroize::Zeroizing;

use crate::{
    env::Environment,
    error::{FormatError, SecurityError},
    keys::{KEY_SIZE, KeySource},
};

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Hex characters per encoded block.
pub const ENCODED_BLOCK_SIZE: usize = BLOCK_SIZE * 2;

/// Payload cipher keyed from the key manager.
pub struct MeshCipher {
    /// Expanded key schedule, zeroized on drop by the `aes` crate
    aes: Option<Aes256>,
    /// Key generation the schedule was loaded from (0 for a local key)
    key_generation: u64,
}

impl MeshCipher {
    /// Uninitialized cipher. Call [`begin`](Self::begin) before use.
    pub fn new() -> Self {
        Self { aes: None, key_generation: 0 }
    }

    /// Load the 256-bit cipher key from `keys`.
    pub fn begin(&mut self, keys: &impl KeySource) -> Result<(), SecurityError> {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        keys.cipher_key(&mut key[..])?;

        self.aes = Some(Aes256::new(GenericArray::from_slice(&key[..])));
        self.key_generation = keys.generation();

        tracing::debug!(generation = self.key_generation, "Cipher keyed");
        Ok(())
    }

    /// Reload after a completed rotation. Same as [`begin`](Self::begin).
    pub fn reload(&mut self, keys: &impl KeySource) -> Result<(), SecurityError> {
        self.begin(keys)
    }

    /// Rekey from fresh random bytes.
    ///
    /// The new key is not persisted and is known only to this instance.
    /// Persistent rotation belongs to [`crate::KeyManager::rotate_keys`].
    pub fn rotate_key(&mut self, env: &impl Environment) -> Result<(), SecurityError> {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        env.fill_random(&mut key[..])?;

        self.aes = Some(Aes256::new(GenericArray::from_slice(&key[..])));
        self.key_generation = 0;

        tracing::info!("Cipher rekeyed with local key");
        Ok(())
    }

    /// Whether a key is loaded.
    pub fn is_initialized(&self) -> bool {
        self.aes.is_some()
    }

    /// Generation of the loaded key (0 if local or unloaded).
    pub fn key_generation(&self) -> u64 {
        self.key_generation
    }

    /// Whether `keys` has committed a newer key set than the one loaded.
    pub fn is_stale(&self, keys: &impl KeySource) -> bool {
        self.key_generation != keys.generation()
    }

    /// Encrypt `plaintext`, returning upper-case hex ciphertext.
    ///
    /// Output length is `2 * 16 * (plaintext.len() / 16 + 1)` characters;
    /// padding is always added, a full block of it on exact multiples.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, SecurityError> {
        let aes = self.schedule()?;

        let mut blocks = Zeroizing::new(pad(plaintext));
        for chunk in blocks.chunks_exact_mut(BLOCK_SIZE) {
            aes.encrypt_block(GenericArray::from_mut_slice(chunk));
        }

        Ok(hex::encode_upper(&blocks[..]))
    }

    /// Decrypt hex ciphertext produced by [`encrypt`](Self::encrypt).
    ///
    /// Valid padding is stripped. Structurally invalid padding is left in
    /// place and the decrypted bytes are returned unchanged; callers rely on
    /// the envelope MAC, not on padding, to detect tampering.
    ///
    /// # Errors
    ///
    /// - `Format(CiphertextLength)` if the length is zero or not a multiple
    ///   of 32 hex characters
    /// - `Format(InvalidEncoding)` if the input is not hex
    pub fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>, SecurityError> {
        let aes = self.schedule()?;

        let len = ciphertext.len();
        if len == 0 || len % ENCODED_BLOCK_SIZE != 0 {
            tracing::debug!(len, "Rejecting ciphertext with invalid length");
            return Err(FormatError::CiphertextLength { len }.into());
        }

        let mut blocks = hex::decode(ciphertext).map_err(|_| FormatError::InvalidEncoding)?;
        for chunk in blocks.chunks_exact_mut(BLOCK_SIZE) {
            aes.decrypt_block(GenericArray::from_mut_slice(chunk));
        }

        Ok(unpad(blocks))
    }

    fn schedule(&self) -> Result<&Aes256, SecurityError> {
        self.aes.as_ref().ok_or(SecurityError::NotInitialized { component: "cipher" })
    }
}

impl Default for MeshCipher {
    fn default() -> Self {
        Self::new()
    }
}

/// Append `n` bytes of value `n`, where `n = 16 - len % 16` (1..=16).
fn pad(input: &[u8]) -> Vec<u8> {
    let padding = BLOCK_SIZE - input.len() % BLOCK_SIZE;

    let mut padded = Vec::with_capacity(input.len() + padding);
    padded.extend_from_slice(input);
    padded.resize(input.len() + padding, padding as u8);
    padded
}

/// Strip padding if well formed, otherwise return the input unchanged.
fn unpad(mut input: Vec<u8>) -> Vec<u8> {
    let Some(&last) = input.last() else {
        return input;
    };

    let padding = last as usize;
    if padding == 0 || padding > BLOCK_SIZE || padding > input.len() {
        return input;
    }

    let start = input.len() - padding;
    if input[start..].iter().any(|&byte| byte != last) {
        return input;
    }

    input.truncate(start);
    input
}
