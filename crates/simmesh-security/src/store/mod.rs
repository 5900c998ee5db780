//! Secure key store abstraction.
//!
//! Named fixed-length blobs in protected non-volatile storage. The trait is
//! synchronous: every call is a bounded flash or database transaction, and
//! the layer above performs no I/O of its own.

mod chaotic;
mod error;
mod memory;

pub use chaotic::ChaoticStore;
pub use error::StoreError;
pub use memory::MemoryStore;

/// Named-blob key store with exact-length semantics.
///
/// Must be Clone (shared by the key manager and diagnostics), Send + Sync,
/// and synchronous. Implementations typically share internal state via Arc,
/// so clones access the same underlying storage.
///
/// # Invariants
///
/// - `get` either fills the whole buffer or leaves it untouched
/// - `put` replaces the blob wholesale; no implicit encoding is applied
pub trait KeyStore: Clone + Send + Sync + 'static {
    /// Make the store ready for use.
    ///
    /// Idempotent. Fails with [`StoreError::Unavailable`] if the backing
    /// partition cannot be opened.
    fn open(&self) -> Result<(), StoreError>;

    /// Read the blob `name` into `out`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no blob with that name exists
    /// - `LengthMismatch` if the stored length differs from `out.len()`
    fn get(&self, name: &str, out: &mut [u8]) -> Result<(), StoreError>;

    /// Store `bytes` under `name`, replacing any previous blob.
    fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Stored length of `name`, or `None` if absent.
    fn len_of(&self, name: &str) -> Result<Option<usize>, StoreError>;
}
