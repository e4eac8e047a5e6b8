//! The contract an entity type must satisfy to live in an [`EntityStore`].
//!
//! Storage is a trait bound, not a base class: any `Clone + Serialize`
//! record that exposes an id and creation/update timestamps qualifies.
//! Validation and sanitation are injected strategy functions rather than
//! overridable methods, so entity types stay plain data.
//!
//! [`EntityStore`]: crate::EntityStore

use crate::error::ValidationIssue;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// A uniquely identified, timestamped record.
///
/// The store owns the `id` and timestamp fields: it assigns them on insert
/// and refreshes `updated_at` on every successful mutation. Domain fields
/// are opaque payload. An empty `id` on a record handed to `create` means
/// "assign one for me".
pub trait Entity: Clone + Serialize + Send + Sync + 'static {
    /// Unique identifier within one store instance.
    fn id(&self) -> &str;

    /// Replace the identifier. Called by the store during insertion only.
    fn set_id(&mut self, id: String);

    /// When this entity was inserted.
    fn created_at(&self) -> DateTime<Utc>;

    /// Stamp the insertion time. Called by the store during insertion only.
    fn set_created_at(&mut self, at: DateTime<Utc>);

    /// When this entity was last mutated.
    fn updated_at(&self) -> DateTime<Utc>;

    /// Stamp the mutation time. Called by the store on every commit.
    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

/// Caller-supplied validation hook, run against the full candidate before
/// any mutation is committed.
pub type Validator<T> =
    Arc<dyn Fn(&T) -> std::result::Result<(), ValidationIssue> + Send + Sync>;

/// Caller-supplied sanitation hook (trimming, normalizing), run before
/// validation so validation sees the canonical form.
pub type Sanitizer<T> = Arc<dyn Fn(&mut T) + Send + Sync>;
