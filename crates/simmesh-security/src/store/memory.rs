#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use zeroize::Zeroizing;

use super::{KeyStore, StoreError};

/// In-memory key store for testing and simulation
///
/// Uses `HashMap` keyed by blob name. All state is wrapped in Arc<Mutex<>> so
/// that clones share contents, which is how tests model "the same flash
/// partition seen after a reboot". Blobs are zeroized when overwritten or
/// dropped. Thread-safe through Mutex, but uses `lock().expect()` which will
/// panic if the mutex is poisoned - acceptable for test code.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

struct MemoryStoreInner {
    /// Blob name -> contents
    blobs: HashMap<String, Zeroizing<Vec<u8>>>,

    /// Whether `open` can succeed
    available: bool,

    /// Whether `open` has succeeded
    opened: bool,

    /// Successful `put` calls, for write-ordering assertions
    writes: usize,
}

impl MemoryStore {
    /// Create a new empty `MemoryStore`
    pub fn new() -> Self {
        Self::with_availability(true)
    }

    /// Create a store whose `open` always fails (missing or corrupt
    /// partition).
    pub fn unavailable() -> Self {
        Self::with_availability(false)
    }

    fn with_availability(available: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                blobs: HashMap::new(),
                available,
                opened: false,
                writes: 0,
            })),
        }
    }

    /// Copy of a stored blob, bypassing the open check.
    ///
    /// Useful for asserting on persisted state in tests.
    #[allow(clippy::expect_used)]
    pub fn blob(&self, name: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        inner.blobs.get(name).map(|blob| blob.to_vec())
    }

    /// Remove a blob, bypassing the open check (simulates partial erase).
    #[allow(clippy::expect_used)]
    pub fn erase(&self, name: &str) {
        self.inner.lock().expect("Mutex poisoned").blobs.remove(name);
    }

    /// Number of successful writes since creation.
    #[allow(clippy::expect_used)]
    pub fn write_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").writes
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for MemoryStore {
    #[allow(clippy::expect_used)]
    fn open(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        if !inner.available {
            return Err(StoreError::Unavailable("partition not present".to_string()));
        }
        inner.opened = true;
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn get(&self, name: &str, out: &mut [u8]) -> Result<(), StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        if !inner.opened {
            return Err(StoreError::Unavailable("store not open".to_string()));
        }

        let blob =
            inner.blobs.get(name).ok_or_else(|| StoreError::NotFound { name: name.to_string() })?;

        if blob.len() != out.len() {
            return Err(StoreError::LengthMismatch {
                name: name.to_string(),
                expected: out.len(),
                actual: blob.len(),
            });
        }

        out.copy_from_slice(blob);
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        if !inner.opened {
            return Err(StoreError::Unavailable("store not open".to_string()));
        }

        inner.blobs.insert(name.to_string(), Zeroizing::new(bytes.to_vec()));
        inner.writes += 1;
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn len_of(&self, name: &str) -> Result<Option<usize>, StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        if !inner.opened {
            return Err(StoreError::Unavailable("store not open".to_string()));
        }
        Ok(inner.blobs.get(name).map(|blob| blob.len()))
    }
}
