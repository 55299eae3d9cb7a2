//! Error-telemetry sink.
//!
//! Failures that a user would otherwise never see (a teardown that
//! errored, a channel that couldn't be resolved) still need to reach
//! whoever operates the app. [`Telemetry`] is the narrow interface for
//! that: one synchronous `capture` call tagged with the component that
//! failed. Wire it to your error tracker; the default just logs.

use std::error::Error;

/// Receives errors for out-of-band reporting.
///
/// Implementations must not block: `capture` is called from inside the
/// session manager's task.
pub trait Telemetry: Send + Sync + 'static {
    /// Records `error`, tagged with the `component` it came from
    /// (`"session"`, `"teardown"`, or `"channel"`).
    fn capture(&self, component: &'static str, error: &(dyn Error + 'static));
}

/// A [`Telemetry`] sink that writes captured errors to `tracing` at
/// `warn` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn capture(&self, component: &'static str, error: &(dyn Error + 'static)) {
        tracing::warn!(component, error = %error, "error captured");
    }
}
