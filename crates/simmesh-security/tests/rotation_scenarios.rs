//! Key rotation scenarios.
//!
//! Covers bootstrap on an empty store, reload across restarts, scheduled and
//! forced rotation as seen by the cipher and authenticator, and crashes
//! partway through persisting a new key set.

use simmesh_security::{
    ChaoticStore, KEY_SIZE, KeyManager, KeySource, KeyStore, MemoryStore, MeshCipher,
    MessageAuthenticator, SecurityConfig, SecurityError, SimEnv,
};

const HOUR_MS: u32 = 3_600_000;

fn cipher_key(keys: &impl KeySource) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    keys.cipher_key(&mut key).unwrap();
    key
}

fn mac_key(keys: &impl KeySource) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    keys.mac_key(&mut key).unwrap();
    key
}

#[test]
fn fresh_store_then_restart_yields_same_keys() {
    let env = SimEnv::new(11, 5_000);
    let store = MemoryStore::new();

    let mut first = KeyManager::new(env.clone(), store.clone(), SecurityConfig::default());
    first.begin().unwrap();

    assert_ne!(cipher_key(&first), [0u8; KEY_SIZE]);
    assert_ne!(mac_key(&first), [0u8; KEY_SIZE]);
    assert_eq!(store.len_of("aes_key").unwrap(), Some(KEY_SIZE));
    assert_eq!(store.len_of("hmac_key").unwrap(), Some(KEY_SIZE));
    assert_eq!(store.len_of("last_rotation").unwrap(), Some(4));

    let mut second = KeyManager::new(env, store, SecurityConfig::default());
    second.begin().unwrap();

    assert_eq!(cipher_key(&first), cipher_key(&second));
    assert_eq!(mac_key(&first), mac_key(&second));
}

#[test]
fn rotation_changes_ciphertext_and_both_decrypt_under_own_key() {
    let env = SimEnv::new(12, 5_000);
    let mut keys = KeyManager::new(env.clone(), MemoryStore::new(), SecurityConfig::default());
    keys.begin().unwrap();

    let mut cipher = MeshCipher::new();
    cipher.begin(&keys).unwrap();
    let before = cipher.encrypt(b"PING").unwrap();

    let mut old_cipher = MeshCipher::new();
    old_cipher.begin(&keys).unwrap();

    env.advance(HOUR_MS);
    keys.rotate_keys().unwrap();
    assert!(cipher.is_stale(&keys));
    cipher.reload(&keys).unwrap();

    let after = cipher.encrypt(b"PING").unwrap();

    assert_ne!(before, after);
    assert_eq!(cipher.decrypt(&after).unwrap(), b"PING");
    assert_eq!(old_cipher.decrypt(&before).unwrap(), b"PING");
}

#[test]
fn stale_authenticator_rejects_after_rotation() {
    let env = SimEnv::new(13, 5_000);
    let mut keys = KeyManager::new(env.clone(), MemoryStore::new(), SecurityConfig::default());
    keys.begin().unwrap();

    let mut sender = MessageAuthenticator::new(env.clone(), SecurityConfig::default());
    sender.begin(&keys).unwrap();
    let mut receiver = MessageAuthenticator::new(env.clone(), SecurityConfig::default());
    receiver.begin(&keys).unwrap();

    keys.rotate_keys().unwrap();
    sender.reload(&keys).unwrap();

    let sealed = sender.append_hmac(b"PING").unwrap();
    assert_eq!(receiver.verify_and_extract(&sealed), Err(SecurityError::Auth));

    receiver.reload(&keys).unwrap();
    assert_eq!(receiver.verify_and_extract(&sealed).unwrap(), b"PING");
}

#[test]
fn scheduled_rotation_fires_once_per_interval() {
    let env = SimEnv::new(14, 5_000);
    let config = SecurityConfig { rotation_interval_ms: HOUR_MS, ..SecurityConfig::default() };
    let mut keys = KeyManager::new(env.clone(), MemoryStore::new(), config);
    keys.begin().unwrap();

    let mut rotations = 0;
    for _ in 0..(5 * 60) {
        env.advance(60_000);
        if keys.should_rotate_keys() {
            keys.rotate_keys().unwrap();
            rotations += 1;
        }
    }

    assert_eq!(rotations, 5);
    assert_eq!(keys.generation(), 6);
}

#[test]
fn crash_mid_rotation_keeps_previous_keys_usable() {
    let env = SimEnv::new(15, 5_000);
    let chaotic = ChaoticStore::new(MemoryStore::new(), 0.0);
    let mut keys = KeyManager::new(env.clone(), chaotic.clone(), SecurityConfig::default());
    keys.begin().unwrap();

    let mut cipher = MeshCipher::new();
    cipher.begin(&keys).unwrap();
    let mut auth = MessageAuthenticator::new(env.clone(), SecurityConfig::default());
    auth.begin(&keys).unwrap();

    let old_cipher = cipher_key(&keys);
    let old_mac = mac_key(&keys);

    // Second put fails: aes_key on flash is new, hmac_key is old.
    chaotic.set_write_budget(Some(1));
    env.advance(25 * HOUR_MS);
    assert!(matches!(keys.rotate_keys(), Err(SecurityError::Storage(_))));

    assert_eq!(cipher_key(&keys), old_cipher);
    assert_eq!(mac_key(&keys), old_mac);
    assert!(!cipher.is_stale(&keys));
    assert!(keys.should_rotate_keys(), "rotation stays due after a failure");

    let ciphertext = cipher.encrypt(b"still up").unwrap();
    let sealed = auth.append_hmac(ciphertext.as_bytes()).unwrap();
    let received = auth.verify_and_extract(&sealed).unwrap();
    assert_eq!(cipher.decrypt(std::str::from_utf8(&received).unwrap()).unwrap(), b"still up");

    // Store recovers; the next attempt completes.
    chaotic.set_write_budget(None);
    keys.rotate_keys().unwrap();
    assert_ne!(cipher_key(&keys), old_cipher);
    assert!(!keys.should_rotate_keys());
}

#[test]
fn crash_after_key_writes_loads_new_keys_on_restart() {
    let env = SimEnv::new(16, 5_000);
    let memory = MemoryStore::new();
    let chaotic = ChaoticStore::new(memory.clone(), 0.0);
    let mut keys = KeyManager::new(env.clone(), chaotic.clone(), SecurityConfig::default());
    keys.begin().unwrap();
    let record = keys.rotation_record();

    // Both keys persisted, rotation time write fails.
    chaotic.set_write_budget(Some(2));
    env.advance(HOUR_MS);
    assert!(keys.rotate_keys().is_err());

    let mut restarted = KeyManager::new(env, memory.clone(), SecurityConfig::default());
    restarted.begin().unwrap();

    assert_eq!(memory.blob("aes_key"), Some(cipher_key(&restarted).to_vec()));
    assert_ne!(cipher_key(&restarted), cipher_key(&keys));
    assert_eq!(restarted.rotation_record(), record);
}
