//! Simmesh node glue.
//!
//! Production wiring for [`simmesh_security`]: real clock and OS entropy,
//! a durable key store, a health reporting seam, and the owned
//! [`SecurityLayer`] handle the rest of the firmware talks to.
//!
//! # Components
//!
//! - [`SecurityLayer`]: key manager, cipher and authenticator started together
//! - [`SystemEnv`]: production environment (system clock, getrandom)
//! - [`RedbKeyStore`]: durable key store via Redb
//! - [`HealthReporter`]: where device faults are reported

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod health;
mod layer;
mod redb_store;
mod system_env;

pub use error::NodeError;
pub use health::{HealthReporter, TracingHealth};
pub use layer::{SecurityLayer, SecurityStatus};
pub use redb_store::RedbKeyStore;
pub use system_env::SystemEnv;
