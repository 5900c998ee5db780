//! Fuzz target for key rotation under storage chaos
//!
//! Drives a key manager through arbitrary clock advances, rotations and
//! restarts on top of a failure-injecting store.
//!
//! # Invariants
//!
//! - Never panics
//! - A failed rotation leaves the active keys and generation unchanged
//! - A successful rotation bumps the generation by one
//! - After a restart the loaded keys are whatever is persisted

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use simmesh_security::{
    ChaoticStore, KeyManager, KeySource, MemoryStore, SecurityConfig, SimEnv, KEY_SIZE,
};

#[derive(Debug, Arbitrary)]
enum Operation {
    Advance(u32),
    Rotate,
    RotateIfDue,
    Restart,
    WriteBudget(Option<u8>),
}

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    failure_percent: u8,
    operations: Vec<Operation>,
}

fn cipher_key(keys: &impl KeySource) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    keys.cipher_key(&mut key).unwrap();
    key
}

fuzz_target!(|scenario: Scenario| {
    let env = SimEnv::new(scenario.seed, 1_000);
    let memory = MemoryStore::new();
    let failure_rate = f64::from(scenario.failure_percent % 50) / 100.0;
    let store = ChaoticStore::with_seed(memory, failure_rate, scenario.seed);

    let mut keys = KeyManager::new(env.clone(), store.clone(), SecurityConfig::default());
    if keys.begin().is_err() {
        return;
    }

    for operation in scenario.operations.into_iter().take(64) {
        match operation {
            Operation::Advance(ms) => env.advance(ms),
            Operation::Rotate | Operation::RotateIfDue => {
                if matches!(operation, Operation::RotateIfDue) && !keys.should_rotate_keys() {
                    continue;
                }
                let before = cipher_key(&keys);
                let generation = keys.generation();
                match keys.rotate_keys() {
                    Ok(()) => assert_eq!(keys.generation(), generation + 1),
                    Err(_) => {
                        assert_eq!(cipher_key(&keys), before);
                        assert_eq!(keys.generation(), generation);
                    },
                }
            },
            Operation::Restart => {
                let mut restarted =
                    KeyManager::new(env.clone(), store.clone(), SecurityConfig::default());
                if restarted.begin().is_err() {
                    return;
                }
                keys = restarted;
            },
            Operation::WriteBudget(budget) => store.set_write_budget(budget.map(usize::from)),
        }
    }
});
