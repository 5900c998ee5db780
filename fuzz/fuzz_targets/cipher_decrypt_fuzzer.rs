//! Fuzz target for ciphertext decoding
//!
//! Exercises `MeshCipher::decrypt` with arbitrary strings and checks the
//! round trip for arbitrary plaintexts.
//!
//! # Invariants
//!
//! - Never panics
//! - Lengths that are zero or not a multiple of 32 are rejected
//! - decrypt(encrypt(p)) == p
//! - Ciphertext is upper-case hex of length 32 * (len / 16 + 1)

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use simmesh_security::{
    FormatError, KeyManager, MemoryStore, MeshCipher, SecurityConfig, SecurityError, SimEnv,
};

#[derive(Debug, Arbitrary)]
struct Input {
    ciphertext: String,
    plaintext: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let env = SimEnv::new(0xC1F, 1_000);
    let mut keys = KeyManager::new(env, MemoryStore::new(), SecurityConfig::default());
    keys.begin().unwrap();
    let mut cipher = MeshCipher::new();
    cipher.begin(&keys).unwrap();

    let len = input.ciphertext.len();
    let result = cipher.decrypt(&input.ciphertext);
    if len == 0 || len % 32 != 0 {
        assert_eq!(result, Err(SecurityError::Format(FormatError::CiphertextLength { len })));
    }

    let encrypted = cipher.encrypt(&input.plaintext).unwrap();
    assert_eq!(encrypted.len(), 32 * (input.plaintext.len() / 16 + 1));
    assert!(encrypted.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)));
    assert_eq!(cipher.decrypt(&encrypted).unwrap(), input.plaintext);
});
