//! Node error types.

use simmesh_security::{ConfigError, SecurityError, StoreError};
use thiserror::Error;

/// Errors that can occur while bringing up or driving the security layer.
#[derive(Error, Debug)]
pub enum NodeError {
    /// Configuration rejected before anything was started.
    ///
    /// Fatal. Fix the arguments and restart.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Key store could not be created.
    ///
    /// Fatal for startup (missing directory, permissions, corrupt file).
    #[error("key store error: {0}")]
    Store(#[from] StoreError),

    /// Security layer operation failed. See [`SecurityError`] for the
    /// classification helpers.
    #[error("security error: {0}")]
    Security(#[from] SecurityError),
}

impl NodeError {
    /// Returns true for failures the node cannot run without.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) | Self::Store(_) => true,
            Self::Security(e) => e.is_device_fault(),
        }
    }
}
