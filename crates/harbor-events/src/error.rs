//! Error types for the event bus.

use thiserror::Error;

/// Errors that can occur in bus operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No matching event arrived within the wait deadline.
    #[error("timed out after {waited_ms}ms waiting for '{event_type}'")]
    Timeout {
        /// Event type that was awaited
        event_type: String,
        /// How long the wait lasted
        waited_ms: u64,
    },

    /// A listener failed during synchronous emission; delivery was aborted
    /// and the failure re-raised to the emitter.
    #[error("listener failed during sync emission of '{event_type}': {source}")]
    Listener {
        /// Type of the event being delivered
        event_type: String,
        /// The listener's own error
        #[source]
        source: anyhow::Error,
    },

    /// Unexpected internal failure.
    #[error("{0}")]
    Internal(String),
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
