//! Harbor Store — generic in-memory entity storage
//!
//! A TTL-aware, keyed collection with typed CRUD, predicate queries,
//! stable sorting, and pagination, parameterized over any record type
//! that carries a unique id and timestamps:
//!
//! - [`Entity`]: the trait bound a stored record must satisfy
//! - [`EntityStore`]: the store itself (create/get/update/delete/query)
//! - [`StoreConfig`]: default TTL, capacity cap, resource naming
//! - [`PageRequest`] / [`Page`]: paged-read request and envelope
//!
//! Validation and sanitation are injected strategy functions, so the store
//! composes with any entity type instead of requiring subclassing. Stores
//! are plain values: construct one and pass it to whoever needs it.
//!
//! The store is a library with no persistence or network surface; a
//! service layer above it owns durability and event publication.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod entity;
pub mod error;
pub mod pagination;
pub mod store;

pub use config::StoreConfig;
pub use entity::{Entity, Sanitizer, Validator};
pub use error::{Error, Result, ValidationIssue};
pub use pagination::{Page, PageRequest, SortOrder};
pub use store::EntityStore;
