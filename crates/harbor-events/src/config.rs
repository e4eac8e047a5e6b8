//! Construction-time configuration for [`EventBus`].
//!
//! [`EventBus`]: crate::EventBus

/// How `publish` delivers an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionMode {
    /// Per-listener failure isolation; every listener runs.
    Isolated,
    /// Subscription-order delivery; the first failure aborts the rest
    /// and propagates to the emitter.
    Sequential,
}

/// Bus configuration, passed at construction.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// How many events the diagnostic history buffer retains before the
    /// oldest entry is evicted.
    pub max_history: usize,
    /// Delivery mode used by `publish`.
    pub default_mode: EmissionMode,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_history: 1000,
            default_mode: EmissionMode::Isolated,
        }
    }
}

impl BusConfig {
    /// Set the history retention cap.
    #[must_use]
    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history = max;
        self
    }

    /// Set the delivery mode used by `publish`.
    #[must_use]
    pub fn with_default_mode(mut self, mode: EmissionMode) -> Self {
        self.default_mode = mode;
        self
    }
}
