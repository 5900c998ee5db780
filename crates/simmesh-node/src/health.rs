//! Health reporting seam.
//!
//! The watchdog and health monitor live outside the security layer. This
//! trait is the only thing the layer knows about them: device-level faults
//! (key store, entropy source) are handed over before the error is returned
//! to the caller.

use simmesh_security::SecurityError;

/// Receives operator-visible alarms from the security layer.
pub trait HealthReporter: Send + Sync {
    /// A device fault occurred. Called once per failed operation.
    fn raise_alarm(&self, error: &SecurityError);
}

/// Reports alarms through `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHealth;

impl HealthReporter for TracingHealth {
    fn raise_alarm(&self, error: &SecurityError) {
        tracing::error!(alarm = true, "Security device fault: {error}");
    }
}
