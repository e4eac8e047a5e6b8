//! `EventBus` — in-process publish/subscribe dispatch.

use crate::config::{BusConfig, EmissionMode};
use crate::error::{Error, Result};
use crate::event::Event;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;


/// Event type that matches every emission.
pub const WILDCARD: &str = "*";

/// A registered event listener.
///
/// Listeners report their own failures as `anyhow::Error`; what the bus
/// does with a failure depends on the emission mode.
pub type Listener = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

struct Registration {
    id: Uuid,
    listener: Listener,
}

struct Waiter {
    id: Uuid,
    event_type: String,
    tx: oneshot::Sender<Event>,
}

impl Waiter {
    fn matches(&self, event_type: &str) -> bool {
        self.event_type == event_type || self.event_type == WILDCARD
    }
}

struct Inner {
    /// Listener registrations per event type, in subscription order.
    listeners: RwLock<HashMap<String, Vec<Registration>>>,
    /// Bounded diagnostic history, oldest first.
    history: RwLock<VecDeque<Event>>,
    /// Pending `wait_for_event` calls.
    waiters: Mutex<Vec<Waiter>>,
    /// Listener failures swallowed during isolated delivery.
    failures: AtomicU64,
    config: BusConfig,
}

/// Listener count for one event type.
#[derive(Debug, Clone, Serialize)]
pub struct ListenerStats {
    /// The subscribed event type
    pub event_type: String,
    /// Number of active listeners
    pub count: usize,
}

/// In-process publish/subscribe dispatcher.
///
/// Decouples producers of domain events from consumers via named event
/// types. Cloning is cheap and every clone shares the same listener map,
/// history buffer, and pending waits.
///
/// Delivery comes in two flavors: [`emit`](Self::emit) isolates listener
/// failures so the whole fan-out always runs, while
/// [`emit_sync`](Self::emit_sync) delivers in subscription order and
/// re-raises the first failure to the emitter. Use the latter only when
/// delivery order and success are part of a correctness contract.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl EventBus {
    /// Create a bus with the given configuration.
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        info!(
            max_history = config.max_history,
            "event bus initialized"
        );
        Self {
            inner: Arc::new(Inner {
                listeners: RwLock::new(HashMap::new()),
                history: RwLock::new(VecDeque::new()),
                waiters: Mutex::new(Vec::new()),
                failures: AtomicU64::new(0),
                config,
            }),
        }
    }

    // ── Subscription lifecycle ──────────────────────────────────

    /// Register a listener for an event type.
    ///
    /// Subscribing to [`WILDCARD`] receives every emission in addition to
    /// its type-specific listeners. The returned [`Subscription`] is the
    /// unsubscribe token.
    pub async fn subscribe<F>(&self, event_type: impl Into<String>, listener: F) -> Subscription
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let id = Uuid::new_v4();
        let mut listeners = self.inner.listeners.write().await;
        listeners
            .entry(event_type.clone())
            .or_default()
            .push(Registration {
                id,
                listener: Arc::new(listener),
            });
        debug!(%event_type, "listener subscribed");
        Subscription {
            id,
            event_type,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Remove every listener for an event type. Returns how many were
    /// removed (0 if none existed).
    pub async fn unsubscribe_all(&self, event_type: &str) -> usize {
        let mut listeners = self.inner.listeners.write().await;
        let removed = listeners.remove(event_type).map_or(0, |regs| regs.len());
        if removed > 0 {
            debug!(%event_type, removed, "listeners removed");
        }
        removed
    }

    // ── Emission ────────────────────────────────────────────────

    /// Deliver an event with per-listener failure isolation.
    ///
    /// The event lands in history first, then every matching listener is
    /// invoked; a listener failure is logged and counted but never stops
    /// the remaining listeners.
    pub async fn emit(&self, event: Event) {
        self.record(&event).await;
        for listener in self.matching_listeners(&event.event_type).await {
            if let Err(error) = listener(&event) {
                self.inner.failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    event_type = %event.event_type,
                    %error,
                    "listener failed; continuing delivery"
                );
            }
        }
    }

    /// Deliver an event in subscription order, aborting on the first
    /// listener failure and re-raising it as [`Error::Listener`].
    pub async fn emit_sync(&self, event: Event) -> Result<()> {
        self.record(&event).await;
        for listener in self.matching_listeners(&event.event_type).await {
            listener(&event).map_err(|source| Error::Listener {
                event_type: event.event_type.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Deliver an event using the configured default mode.
    ///
    /// In [`EmissionMode::Isolated`] this never fails.
    pub async fn publish(&self, event: Event) -> Result<()> {
        match self.inner.config.default_mode {
            EmissionMode::Isolated => {
                self.emit(event).await;
                Ok(())
            }
            EmissionMode::Sequential => self.emit_sync(event).await,
        }
    }

    /// Deliver a sequence of events, each with the isolation of
    /// [`emit`](Self::emit).
    pub async fn emit_batch(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.emit(event).await;
        }
    }

    // ── Waiting ─────────────────────────────────────────────────

    /// Suspend until an event of the given type arrives, or the timeout
    /// elapses, whichever comes first.
    ///
    /// The timeout is a hard cap: on expiry the pending wait is removed
    /// (no listener leak) and [`Error::Timeout`] is returned; a late
    /// emission will not resolve the abandoned wait. Waiting on
    /// [`WILDCARD`] resolves on the next emission of any type. Other
    /// subscribers and emissions are not blocked while waiting.
    pub async fn wait_for_event(
        &self,
        event_type: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Event> {
        let event_type = event_type.into();
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        {
            let mut waiters = self.inner.waiters.lock().await;
            waiters.push(Waiter {
                id,
                event_type: event_type.clone(),
                tx,
            });
        }

        tokio::select! {
            received = rx => received
                .map_err(|_| Error::Internal("wait channel closed".to_string())),
            () = tokio::time::sleep(timeout) => {
                let mut waiters = self.inner.waiters.lock().await;
                waiters.retain(|w| w.id != id);
                Err(Error::Timeout {
                    event_type,
                    waited_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    // ── History & diagnostics ───────────────────────────────────

    /// A copy of retained history, oldest first, optionally filtered by
    /// event type and capped to the `limit` most recent matches.
    pub async fn event_history(
        &self,
        event_type: Option<&str>,
        limit: Option<usize>,
    ) -> Vec<Event> {
        let history = self.inner.history.read().await;
        let mut matches: Vec<Event> = history
            .iter()
            .filter(|e| event_type.map_or(true, |t| e.event_type == t))
            .cloned()
            .collect();
        match limit {
            Some(limit) if matches.len() > limit => matches.split_off(matches.len() - limit),
            _ => matches,
        }
    }

    /// Drop all retained history. Delivery is unaffected.
    pub async fn clear_history(&self) {
        let mut history = self.inner.history.write().await;
        history.clear();
    }

    /// Listener counts per event type, sorted by type for stable output.
    pub async fn listener_stats(&self) -> Vec<ListenerStats> {
        let listeners = self.inner.listeners.read().await;
        let mut stats: Vec<ListenerStats> = listeners
            .iter()
            .map(|(event_type, regs)| ListenerStats {
                event_type: event_type.clone(),
                count: regs.len(),
            })
            .collect();
        stats.sort_by(|a, b| a.event_type.cmp(&b.event_type));
        stats
    }

    /// Total number of active listeners across all event types.
    pub async fn listener_count(&self) -> usize {
        let listeners = self.inner.listeners.read().await;
        listeners.values().map(Vec::len).sum()
    }

    /// How many listener failures have been swallowed by isolated
    /// delivery since construction.
    pub fn delivery_failure_count(&self) -> u64 {
        self.inner.failures.load(Ordering::Relaxed)
    }

    // ── Internals ───────────────────────────────────────────────

    /// Append to bounded history and resolve matching waiters. Runs
    /// before listener delivery on every emission path.
    async fn record(&self, event: &Event) {
        if self.inner.config.max_history > 0 {
            let mut history = self.inner.history.write().await;
            history.push_back(event.clone());
            while history.len() > self.inner.config.max_history {
                history.pop_front();
            }
        }

        let mut waiters = self.inner.waiters.lock().await;
        let pending = std::mem::take(&mut *waiters);
        let (matched, rest): (Vec<Waiter>, Vec<Waiter>) = pending
            .into_iter()
            .partition(|w| w.matches(&event.event_type));
        *waiters = rest;
        drop(waiters);
        for waiter in matched {
            // The receiver may already be gone (timed-out wait racing us)
            let _ = waiter.tx.send(event.clone());
        }
    }

    /// Snapshot of listeners for one emission: type-specific first, then
    /// wildcard, each group in subscription order.
    async fn matching_listeners(&self, event_type: &str) -> Vec<Listener> {
        let listeners = self.inner.listeners.read().await;
        let mut out = Vec::new();
        if let Some(regs) = listeners.get(event_type) {
            out.extend(regs.iter().map(|r| Arc::clone(&r.listener)));
        }
        if event_type != WILDCARD {
            if let Some(regs) = listeners.get(WILDCARD) {
                out.extend(regs.iter().map(|r| Arc::clone(&r.listener)));
            }
        }
        out
    }
}

/// Unsubscribe token returned by [`EventBus::subscribe`].
///
/// Removes exactly the listener it was created for; calling
/// [`unsubscribe`](Self::unsubscribe) twice is a no-op, not an error.
pub struct Subscription {
    id: Uuid,
    event_type: String,
    inner: Arc<Inner>,
}

impl Subscription {
    /// The event type this subscription listens for.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Remove the listener. Returns `true` if it was still registered,
    /// `false` if it had already been removed.
    pub async fn unsubscribe(&self) -> bool {
        let mut listeners = self.inner.listeners.write().await;
        let Some(regs) = listeners.get_mut(&self.event_type) else {
            return false;
        };
        let before = regs.len();
        regs.retain(|r| r.id != self.id);
        let removed = regs.len() < before;
        if regs.is_empty() {
            listeners.remove(&self.event_type);
        }
        if removed {
            debug!(event_type = %self.event_type, "listener unsubscribed");
        }
        removed
    }
}
