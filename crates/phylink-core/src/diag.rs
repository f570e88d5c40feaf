//! Injected diagnostic sink for protocol-usage errors.
//!
//! The state machine reports every illegal command/signal through a
//! [`DiagSink`] handed to it at construction, one error entry per event.
//! Production code uses [`TracingSink`]; tests use a capturing sink so the
//! one-diagnostic-per-illegal-call contract can be asserted exactly.

/// Leveled diagnostic capability.
///
/// Only error severity is needed by the state machine: illegal calls are
/// recoverable, logged, and functionally ignored.
pub trait DiagSink: Send {
    /// Record one error-severity diagnostic entry.
    fn error(&mut self, message: &str);
}

/// Default sink that forwards to the `tracing` ecosystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagSink for TracingSink {
    fn error(&mut self, message: &str) {
        tracing::error!(target: "phylink", "{message}");
    }
}
