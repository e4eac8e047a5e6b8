//! Harbor Events — in-process publish/subscribe
//!
//! Lets independent components react to state changes without direct
//! coupling:
//!
//! - [`Event`]: an immutable `{event_type, timestamp, source, data}` value
//! - [`EventBus`]: per-type listener registration with a wildcard, two
//!   delivery contracts ([`EventBus::emit`] isolates listener failures,
//!   [`EventBus::emit_sync`] propagates the first one), timed waits, and
//!   a bounded diagnostic history buffer
//! - [`Subscription`]: the idempotent unsubscribe token
//! - [`BusConfig`]: history retention and default delivery mode
//!
//! The bus does not infer events from anything: producers construct and
//! emit events explicitly. Buses are plain values; construct one and hand
//! clones to producers and consumers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bus;
pub mod config;
pub mod error;
pub mod event;

pub use bus::{EventBus, Listener, ListenerStats, Subscription, WILDCARD};
pub use config::{BusConfig, EmissionMode};
pub use error::{Error, Result};
pub use event::Event;
