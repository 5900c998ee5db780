//! End-to-end scenarios for `SecurityLayer`.
//!
//! Two nodes sharing a key store exchange envelopes while the clock moves,
//! keys rotate, and devices fail underneath them.

#![allow(clippy::disallowed_types, reason = "Collecting alarms in tests")]

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use simmesh_node::{HealthReporter, NodeError, SecurityLayer};
use simmesh_security::{
    ChaoticStore, FormatError, KeyManager, KeyStore, MemoryStore, MessageAuthenticator,
    ReplayReason, SecurityConfig, SecurityError, SimEnv,
};

/// Health reporter that remembers every alarm.
#[derive(Clone, Default)]
struct RecordingHealth {
    alarms: Arc<Mutex<Vec<SecurityError>>>,
}

impl RecordingHealth {
    fn alarms(&self) -> Vec<SecurityError> {
        self.alarms.lock().unwrap().clone()
    }
}

impl HealthReporter for RecordingHealth {
    fn raise_alarm(&self, error: &SecurityError) {
        self.alarms.lock().unwrap().push(error.clone());
    }
}

type TestLayer<S> = SecurityLayer<SimEnv, S, RecordingHealth>;

fn start<S: KeyStore>(env: &SimEnv, store: S) -> (TestLayer<S>, RecordingHealth) {
    let health = RecordingHealth::default();
    let layer =
        SecurityLayer::start(env.clone(), store, SecurityConfig::default(), health.clone()).unwrap();
    (layer, health)
}

#[test]
fn two_nodes_with_shared_keys_exchange_envelopes() {
    let env = SimEnv::new(31, 10_000);
    let store = MemoryStore::new();
    let (alice, _) = start(&env, store.clone());
    let (mut bob, _) = start(&env, store);

    let sealed = alice.seal(b"SIM 3 ready").unwrap();
    env.advance(250);

    assert_eq!(bob.open(&sealed).unwrap(), b"SIM 3 ready");
    assert_eq!(bob.open(&sealed), Err(SecurityError::Replay(ReplayReason::Duplicate)));
}

#[test]
fn envelope_older_than_window_rejected() {
    let env = SimEnv::new(32, 10_000);
    let (mut layer, health) = start(&env, MemoryStore::new());

    let sealed = layer.seal(b"late").unwrap();
    env.advance(5 * 60 * 1_000 + 1);

    assert!(matches!(layer.open(&sealed), Err(SecurityError::Replay(ReplayReason::Stale { .. }))));
    assert!(health.alarms().is_empty(), "replay is not a device fault");
}

#[test]
fn check_rotation_only_when_due() {
    let env = SimEnv::new(33, 10_000);
    let (mut layer, _) = start(&env, MemoryStore::new());

    assert!(!layer.check_rotation().unwrap());
    assert_eq!(layer.status().keys.generation, 1);

    env.advance(24 * 3_600_000);

    assert!(layer.check_rotation().unwrap());
    assert_eq!(layer.status().keys.generation, 2);
    assert!(!layer.status().keys.rotation_due);

    let sealed = layer.seal(b"after rotation").unwrap();
    assert_eq!(layer.open(&sealed).unwrap(), b"after rotation");
}

#[test]
fn peer_with_old_keys_fails_auth_until_reloaded() {
    let env = SimEnv::new(34, 10_000);
    let store = MemoryStore::new();
    let (mut rotated, _) = start(&env, store.clone());
    let (mut stale, _) = start(&env, store.clone());

    rotated.rotate_now().unwrap();
    let sealed = rotated.seal(b"new keys").unwrap();

    assert_eq!(stale.open(&sealed), Err(SecurityError::Auth));

    // Peer reboots and picks up the persisted keys.
    let (mut restarted, _) = start(&env, store);
    assert_eq!(restarted.open(&sealed).unwrap(), b"new keys");
    assert!(stale.open(&rotated.seal(b"again").unwrap()).is_err());
}

#[test]
fn rotation_store_failure_raises_alarm_and_keeps_layer_usable() {
    let env = SimEnv::new(35, 10_000);
    let chaotic = ChaoticStore::new(MemoryStore::new(), 0.0);
    let (mut layer, health) = start(&env, chaotic.clone());
    let generation = layer.status().keys.generation;

    chaotic.set_write_budget(Some(1));
    assert!(matches!(layer.rotate_now(), Err(SecurityError::Storage(_))));

    assert_eq!(health.alarms().len(), 1);
    assert!(health.alarms()[0].is_device_fault());
    assert_eq!(layer.status().keys.generation, generation);

    let sealed = layer.seal(b"still here").unwrap();
    assert_eq!(layer.open(&sealed).unwrap(), b"still here");
}

#[test]
fn entropy_failure_raises_alarm_on_seal() {
    let env = SimEnv::new(36, 10_000);
    let (layer, health) = start(&env, MemoryStore::new());

    env.set_entropy_failing(true);

    assert!(matches!(layer.seal(b"x"), Err(SecurityError::Rng(_))));
    assert_eq!(health.alarms().len(), 1);
}

#[test]
fn unavailable_store_refuses_start_and_raises_alarm() {
    let health = RecordingHealth::default();

    let result = SecurityLayer::start(
        SimEnv::default(),
        MemoryStore::unavailable(),
        SecurityConfig::default(),
        health.clone(),
    );

    assert!(matches!(result, Err(NodeError::Security(SecurityError::Storage(_)))));
    assert_eq!(health.alarms().len(), 1);
}

#[test]
fn envelope_with_non_utf8_payload_is_format_error() {
    let env = SimEnv::new(37, 10_000);
    let store = MemoryStore::new();
    let (mut layer, _) = start(&env, store.clone());

    // Authentic envelope whose payload is not hex text.
    let mut auth = MessageAuthenticator::new(env.clone(), SecurityConfig::default());
    let mut keys = KeyManager::new(env.clone(), store, SecurityConfig::default());
    keys.begin().unwrap();
    auth.begin(&keys).unwrap();
    let sealed = auth.append_hmac(&[0xFF, 0xFE]).unwrap();

    assert_eq!(
        layer.open(&sealed),
        Err(SecurityError::Format(FormatError::NotUtf8))
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_seal_open_roundtrip(
        seed in any::<u64>(),
        payload in prop::collection::vec(any::<u8>(), 0..300),
        delay_ms in 0u32..=300_000,
    ) {
        let env = SimEnv::new(seed, 10_000);
        let (mut layer, _) = start(&env, MemoryStore::new());

        let sealed = layer.seal(&payload).unwrap();
        env.advance(delay_ms);

        prop_assert_eq!(layer.open(&sealed).unwrap(), payload);
    }
}
