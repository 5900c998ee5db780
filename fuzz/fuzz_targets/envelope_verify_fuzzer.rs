//! Fuzz target for envelope verification
//!
//! Feeds adversarial bytes and mutated genuine envelopes to
//! `verify_and_extract`.
//!
//! # Strategy
//!
//! - Raw arbitrary bytes (short, long, empty)
//! - Genuine envelopes with arbitrary byte mutations
//! - Clock jumps between sealing and verifying
//!
//! # Invariants
//!
//! - Never panics
//! - Inputs shorter than 40 bytes are format errors
//! - A mutated envelope never verifies
//! - A rejected envelope never changes the replay cache

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use simmesh_security::{
    FormatError, KeyManager, MemoryStore, MessageAuthenticator, SecurityConfig, SecurityError,
    SimEnv, ENVELOPE_OVERHEAD,
};

#[derive(Debug, Arbitrary)]
enum Input {
    Raw(Vec<u8>),
    Mutated { payload: Vec<u8>, mutations: Vec<(u16, u8)>, delay_ms: u32 },
}

fuzz_target!(|input: Input| {
    let env = SimEnv::new(0xF022, 1_000_000);
    let mut keys = KeyManager::new(env.clone(), MemoryStore::new(), SecurityConfig::default());
    keys.begin().unwrap();
    let mut auth = MessageAuthenticator::new(env.clone(), SecurityConfig::default());
    auth.begin(&keys).unwrap();

    match input {
        Input::Raw(bytes) => {
            let result = auth.verify_and_extract(&bytes);
            if bytes.len() < ENVELOPE_OVERHEAD {
                assert!(matches!(
                    result,
                    Err(SecurityError::Format(FormatError::EnvelopeTooShort { .. }))
                ));
            }
            if result.is_err() {
                assert!(auth.replay_cache().is_empty());
            }
        },
        Input::Mutated { payload, mutations, delay_ms } => {
            let original = auth.append_hmac(&payload).unwrap();
            let mut sealed = original.clone();
            for (position, xor) in mutations {
                let index = position as usize % sealed.len();
                sealed[index] ^= xor;
            }

            env.advance(delay_ms);
            let result = auth.verify_and_extract(&sealed);

            if sealed != original {
                assert!(result.is_err(), "mutated envelope verified");
            }
            if result.is_err() {
                assert!(auth.replay_cache().is_empty());
            } else {
                assert_eq!(result.unwrap(), payload);
            }
        },
    }
});
