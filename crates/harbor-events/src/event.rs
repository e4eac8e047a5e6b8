//! The event value carried by the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable domain event.
///
/// Producers create one at emission time; the bus clones it into its
/// bounded history buffer and hands clones to listeners and waiters,
/// never mutating it. `data` is opaque payload owned by the producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// String tag routing the event to subscribers (e.g. `"task:created"`)
    pub event_type: String,
    /// When the producer emitted it
    pub timestamp: DateTime<Utc>,
    /// Producer identity (e.g. `"task-service"`)
    pub source: String,
    /// Opaque payload
    pub data: Value,
}

impl Event {
    /// Build an event stamped with the current time.
    #[must_use]
    pub fn new(event_type: impl Into<String>, source: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: Utc::now(),
            source: source.into(),
            data,
        }
    }
}
