//! Property-based tests for the security layer
//!
//! These tests verify the invariants a peer relies on:
//!
//! 1. **Round-trip**: decrypt(encrypt(p)) == p for all payloads
//! 2. **Envelope round-trip**: verify_and_extract(append_hmac(p)) == p
//! 3. **Tamper evidence**: any single flipped bit fails verification
//! 4. **Size**: envelopes are exactly payload + 40 bytes, ciphertext is a
//!    whole number of padded blocks

use proptest::prelude::*;
use simmesh_security::{
    ENVELOPE_OVERHEAD, KeyManager, MemoryStore, MeshCipher, MessageAuthenticator, SecurityConfig,
    SecurityError, SimEnv,
};

struct Node {
    keys: KeyManager<SimEnv, MemoryStore>,
    cipher: MeshCipher,
    auth: MessageAuthenticator<SimEnv>,
}

fn node(seed: u64) -> Node {
    let env = SimEnv::new(seed, 10_000);
    let mut keys = KeyManager::new(env.clone(), MemoryStore::new(), SecurityConfig::default());
    keys.begin().unwrap();

    let mut cipher = MeshCipher::new();
    cipher.begin(&keys).unwrap();

    let mut auth = MessageAuthenticator::new(env, SecurityConfig::default());
    auth.begin(&keys).unwrap();

    Node { keys, cipher, auth }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_cipher_roundtrip(
        seed in any::<u64>(),
        payload in prop::collection::vec(any::<u8>(), 0..=512),
    ) {
        let node = node(seed);

        let ciphertext = node.cipher.encrypt(&payload).unwrap();
        let decrypted = node.cipher.decrypt(&ciphertext).unwrap();

        prop_assert_eq!(decrypted, payload.clone());
        prop_assert_eq!(ciphertext.len(), 32 * (payload.len() / 16 + 1));
    }

    #[test]
    fn prop_envelope_roundtrip(
        seed in any::<u64>(),
        payload in prop::collection::vec(any::<u8>(), 0..=512),
    ) {
        let mut node = node(seed);

        let sealed = node.auth.append_hmac(&payload).unwrap();
        prop_assert_eq!(sealed.len(), payload.len() + ENVELOPE_OVERHEAD);

        let extracted = node.auth.verify_and_extract(&sealed).unwrap();
        prop_assert_eq!(extracted, payload);
    }

    #[test]
    fn prop_bit_flip_fails(
        seed in any::<u64>(),
        payload in prop::collection::vec(any::<u8>(), 0..128),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut node = node(seed);
        let mut sealed = node.auth.append_hmac(&payload).unwrap();

        let byte = position.index(sealed.len());
        sealed[byte] ^= 1 << bit;

        prop_assert!(node.auth.verify_and_extract(&sealed).is_err());
        prop_assert!(node.auth.replay_cache().is_empty());
    }

    #[test]
    fn prop_full_pipeline(
        seed in any::<u64>(),
        payload in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let mut node = node(seed);

        let ciphertext = node.cipher.encrypt(&payload).unwrap();
        let sealed = node.auth.append_hmac(ciphertext.as_bytes()).unwrap();

        let received = node.auth.verify_and_extract(&sealed).unwrap();
        let received = String::from_utf8(received).unwrap();
        prop_assert_eq!(node.cipher.decrypt(&received).unwrap(), payload);
    }

    #[test]
    fn prop_foreign_key_rejected(
        seed in any::<u64>(),
        payload in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let sender = node(seed);
        let mut receiver = node(seed.wrapping_add(1));

        let sealed = sender.auth.append_hmac(&payload).unwrap();

        prop_assert_eq!(receiver.auth.verify_and_extract(&sealed), Err(SecurityError::Auth));
    }
}

#[test]
fn generation_is_shared_by_consumers() {
    let node = node(1);
    assert_eq!(node.cipher.key_generation(), 1);
    assert_eq!(node.auth.key_generation(), 1);
    assert!(!node.cipher.is_stale(&node.keys));
}

#[test]
fn largest_payload_roundtrips() {
    let mut node = node(512);
    let payload = vec![0xA5; 512];

    let ciphertext = node.cipher.encrypt(&payload).unwrap();
    assert_eq!(ciphertext.len(), 32 * 33);
    assert_eq!(node.cipher.decrypt(&ciphertext).unwrap(), payload);

    let sealed = node.auth.append_hmac(ciphertext.as_bytes()).unwrap();
    assert_eq!(node.auth.verify_and_extract(&sealed).unwrap(), ciphertext.as_bytes());
}
