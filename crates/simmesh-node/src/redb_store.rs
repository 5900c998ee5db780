//! Redb-backed durable key store.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. Each
//! `put` is its own transaction, so a crash between the writes of a rotation
//! leaves every blob either fully old or fully new.

use std::{path::Path, sync::Arc};

use redb::{Database, TableDefinition};
use simmesh_security::{KeyStore, StoreError};

/// Table: secure_keys
/// Key: blob name ("aes_key", "hmac_key", "last_rotation")
/// Value: raw blob bytes, no encoding
const SECURE_KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("secure_keys");

/// Durable key store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbKeyStore {
    db: Arc<Database>,
}

impl RedbKeyStore {
    /// Open or create a Redb database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the database cannot be opened or
    /// created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl KeyStore for RedbKeyStore {
    fn open(&self) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        {
            let _ =
                txn.open_table(SECURE_KEYS).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(())
    }

    fn get(&self, name: &str, out: &mut [u8]) -> Result<(), StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Io(e.to_string()))?;
        let table = txn.open_table(SECURE_KEYS).map_err(|e| StoreError::Io(e.to_string()))?;

        let Some(value) = table.get(name).map_err(|e| StoreError::Io(e.to_string()))? else {
            return Err(StoreError::NotFound { name: name.to_string() });
        };

        let bytes = value.value();
        if bytes.len() != out.len() {
            return Err(StoreError::LengthMismatch {
                name: name.to_string(),
                expected: out.len(),
                actual: bytes.len(),
            });
        }

        out.copy_from_slice(bytes);
        Ok(())
    }

    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table =
                txn.open_table(SECURE_KEYS).map_err(|e| StoreError::Io(e.to_string()))?;
            table.insert(name, bytes).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(())
    }

    fn len_of(&self, name: &str) -> Result<Option<usize>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Io(e.to_string()))?;
        let table = txn.open_table(SECURE_KEYS).map_err(|e| StoreError::Io(e.to_string()))?;

        let len = table
            .get(name)
            .map_err(|e| StoreError::Io(e.to_string()))?
            .map(|value| value.value().len());
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn store() -> (tempfile::TempDir, RedbKeyStore) {
        let dir = tempdir().unwrap();
        let store = RedbKeyStore::create(dir.path().join("keys.redb")).unwrap();
        store.open().unwrap();
        (dir, store)
    }

    #[test]
    fn put_then_get() {
        let (_dir, store) = store();

        store.put("aes_key", &[7u8; 32]).unwrap();

        let mut out = [0u8; 32];
        store.get("aes_key", &mut out).unwrap();
        assert_eq!(out, [7u8; 32]);
        assert_eq!(store.len_of("aes_key").unwrap(), Some(32));
    }

    #[test]
    fn missing_blob_is_not_found() {
        let (_dir, store) = store();

        let mut out = [0u8; 4];
        assert!(matches!(store.get("last_rotation", &mut out), Err(StoreError::NotFound { .. })));
        assert_eq!(store.len_of("last_rotation").unwrap(), None);
    }

    #[test]
    fn wrong_length_is_mismatch_and_buffer_untouched() {
        let (_dir, store) = store();
        store.put("hmac_key", &[1u8; 16]).unwrap();

        let mut out = [9u8; 32];
        assert_eq!(
            store.get("hmac_key", &mut out),
            Err(StoreError::LengthMismatch {
                name: "hmac_key".to_string(),
                expected: 32,
                actual: 16
            })
        );
        assert_eq!(out, [9u8; 32]);
    }

    #[test]
    fn open_is_idempotent() {
        let (_dir, store) = store();
        store.put("aes_key", &[3u8; 32]).unwrap();

        store.open().unwrap();

        assert_eq!(store.len_of("aes_key").unwrap(), Some(32));
    }
}
