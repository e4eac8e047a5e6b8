//! `EntityStore` — generic, TTL-aware, in-memory keyed storage.

use crate::config::StoreConfig;
use crate::entity::{Entity, Sanitizer, Validator};
use crate::error::{Error, Result, ValidationIssue};
use crate::pagination::{Page, PageRequest, SortOrder};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[cfg(test)]
mod tests;

/// Internal wrapper around a stored entity. Never exposed to callers.
struct StoredRecord<T> {
    entity: T,
    /// Absolute expiry; `None` lives forever.
    expires_at: Option<DateTime<Utc>>,
    /// Insertion counter; snapshot order and sort tie-breaks come from it.
    seq: u64,
}

impl<T> StoredRecord<T> {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

struct State<T> {
    records: HashMap<String, StoredRecord<T>>,
    next_seq: u64,
}

/// Generic in-memory keyed store with validation hooks, TTL expiry,
/// and paged queries.
///
/// All mutations are per-call atomic: a failed `create`/`update` leaves the
/// store exactly as it was. Every read treats an expired record as absent;
/// expiry is checked lazily rather than via per-key timers.
///
/// Reads hand out defensive clones, never references into internal state.
pub struct EntityStore<T> {
    state: RwLock<State<T>>,
    config: StoreConfig,
    validator: Option<Validator<T>>,
    sanitizer: Option<Sanitizer<T>>,
}

impl<T: Entity> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl<T: Entity> EntityStore<T> {
    /// Create a store with the given configuration.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        info!(resource = %config.resource, "entity store initialized");
        Self {
            state: RwLock::new(State {
                records: HashMap::new(),
                next_seq: 0,
            }),
            config,
            validator: None,
            sanitizer: None,
        }
    }

    /// Attach a validation hook, run against every candidate before commit.
    #[must_use]
    pub fn with_validator<F>(mut self, validate: F) -> Self
    where
        F: Fn(&T) -> std::result::Result<(), ValidationIssue> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validate));
        self
    }

    /// Attach a sanitation hook, run before validation on every mutation.
    #[must_use]
    pub fn with_sanitizer<F>(mut self, sanitize: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.sanitizer = Some(Arc::new(sanitize));
        self
    }

    // ── Mutations ───────────────────────────────────────────────

    /// Insert a new entity using the configured default TTL.
    ///
    /// An empty `id` is replaced with a generated unique one; a caller-supplied
    /// `id` must not collide with a live record. Both timestamps are stamped
    /// to now. Returns the stored entity (a copy, not an alias).
    pub async fn create(&self, entity: T) -> Result<T> {
        self.create_with_ttl(entity, self.config.default_ttl).await
    }

    /// Insert a new entity with an explicit lifespan (`None` = no expiry),
    /// overriding the configured default.
    pub async fn create_with_ttl(&self, mut entity: T, ttl: Option<Duration>) -> Result<T> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        // Expired records must not consume capacity.
        state.records.retain(|_, r| r.is_live(now));
        if let Some(max) = self.config.max_entities {
            if state.records.len() >= max {
                return Err(Error::Capacity { max });
            }
        }

        if entity.id().is_empty() {
            let mut id = Uuid::new_v4().to_string();
            while state.records.contains_key(&id) {
                id = Uuid::new_v4().to_string();
            }
            entity.set_id(id);
        } else if state.records.contains_key(entity.id()) {
            return Err(Error::Validation {
                field: "id".to_string(),
                rule: "unique".to_string(),
                value: entity.id().to_string(),
            });
        }

        let id = entity.id().to_string();
        if let Some(sanitize) = &self.sanitizer {
            sanitize(&mut entity);
        }
        // Store-owned fields are stamped after sanitation so hooks
        // cannot clobber them.
        entity.set_id(id.clone());
        entity.set_created_at(now);
        entity.set_updated_at(now);
        if let Some(validate) = &self.validator {
            validate(&entity).map_err(Error::from)?;
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.records.insert(
            id.clone(),
            StoredRecord {
                entity: entity.clone(),
                expires_at: ttl.map(|t| now + t),
                seq,
            },
        );
        debug!(resource = %self.config.resource, %id, "created");
        Ok(entity)
    }

    /// Apply a partial mutation to a live entity.
    ///
    /// The patch closure sees a clone of the current value; `id` and
    /// `created_at` stay immutable even if the patch touches them.
    /// Sanitation and validation run against the merged candidate, and a
    /// validation failure leaves the stored value untouched. Fails with
    /// [`Error::NotFound`] when the id is absent or expired.
    pub async fn update<F>(&self, id: &str, patch: F) -> Result<T>
    where
        F: FnOnce(&mut T),
    {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let current = match state.records.get(id) {
            Some(record) if record.is_live(now) => record.entity.clone(),
            Some(_) => {
                state.records.remove(id);
                return Err(self.not_found(id));
            }
            None => return Err(self.not_found(id)),
        };

        let mut candidate = current.clone();
        patch(&mut candidate);
        if let Some(sanitize) = &self.sanitizer {
            sanitize(&mut candidate);
        }
        candidate.set_id(current.id().to_string());
        candidate.set_created_at(current.created_at());
        candidate.set_updated_at(now);

        if let Some(validate) = &self.validator {
            validate(&candidate).map_err(Error::from)?;
        }

        if let Some(record) = state.records.get_mut(id) {
            record.entity = candidate.clone();
        }
        debug!(resource = %self.config.resource, %id, "updated");
        Ok(candidate)
    }

    /// Remove an entity. Returns `true` only if a live entity was removed;
    /// a missing (or already-expired) id is `false`, never an error.
    pub async fn delete(&self, id: &str) -> bool {
        let now = Utc::now();
        let mut state = self.state.write().await;
        match state.records.remove(id) {
            Some(record) if record.is_live(now) => {
                debug!(resource = %self.config.resource, %id, "deleted");
                true
            }
            _ => false,
        }
    }

    /// Adjust the lifespan of a live entity (`None` clears the expiry).
    ///
    /// Fails with [`Error::NotFound`] when the id is absent or expired.
    /// The entity value itself is untouched, so `updated_at` is not stamped.
    pub async fn set_ttl(&self, id: &str, ttl: Option<Duration>) -> Result<()> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        match state.records.get_mut(id) {
            Some(record) if record.is_live(now) => {
                record.expires_at = ttl.map(|t| now + t);
                Ok(())
            }
            Some(_) => {
                state.records.remove(id);
                Err(self.not_found(id))
            }
            None => Err(self.not_found(id)),
        }
    }

    /// Remove every entity. Intended for test isolation.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.records.clear();
        debug!(resource = %self.config.resource, "cleared");
    }

    /// Drop every expired record now instead of waiting for lazy checks.
    /// Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let before = state.records.len();
        state.records.retain(|_, r| r.is_live(now));
        let removed = before - state.records.len();
        if removed > 0 {
            debug!(resource = %self.config.resource, removed, "purged expired");
        }
        removed
    }

    // ── Reads ───────────────────────────────────────────────────

    /// Fetch a copy of a live entity, `None` when absent or expired.
    pub async fn get(&self, id: &str) -> Option<T> {
        let now = Utc::now();
        let state = self.state.read().await;
        state
            .records
            .get(id)
            .filter(|r| r.is_live(now))
            .map(|r| r.entity.clone())
    }

    /// Whether a live entity with this id exists.
    pub async fn exists(&self, id: &str) -> bool {
        let now = Utc::now();
        let state = self.state.read().await;
        state.records.get(id).is_some_and(|r| r.is_live(now))
    }

    /// Number of live entities.
    pub async fn count(&self) -> usize {
        let now = Utc::now();
        let state = self.state.read().await;
        state.records.values().filter(|r| r.is_live(now)).count()
    }

    /// Snapshot of all live entities in insertion order.
    pub async fn list(&self) -> Vec<T> {
        self.snapshot().await
    }

    /// One page of a consistent snapshot, optionally sorted by a named
    /// serialized field (stable; ties keep insertion order).
    ///
    /// `page` is 1-based; a page past the end yields empty `items` with
    /// correct totals. An unknown `sort_by` field, a zero `page`, or a zero
    /// `page_size` fails with [`Error::Validation`].
    pub async fn list_paged(&self, req: &PageRequest) -> Result<Page<T>> {
        if req.page == 0 {
            return Err(Error::Validation {
                field: "page".to_string(),
                rule: "one_based".to_string(),
                value: "0".to_string(),
            });
        }
        if req.page_size == 0 {
            return Err(Error::Validation {
                field: "page_size".to_string(),
                rule: "positive".to_string(),
                value: "0".to_string(),
            });
        }

        let mut items = self.snapshot().await;
        if let Some(field) = &req.sort_by {
            items = sort_by_field(items, field, req.sort_order)?;
        }

        let total_items = items.len();
        let start = (req.page - 1).saturating_mul(req.page_size);
        let page_items: Vec<T> = if start >= total_items {
            Vec::new()
        } else {
            items.into_iter().skip(start).take(req.page_size).collect()
        };
        Ok(Page::assemble(page_items, total_items, req.page, req.page_size))
    }

    /// Linear scan over live entities, insertion order.
    pub async fn find_where<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.snapshot()
            .await
            .into_iter()
            .filter(|e| predicate(e))
            .collect()
    }

    // ── Internals ───────────────────────────────────────────────

    async fn snapshot(&self) -> Vec<T> {
        let now = Utc::now();
        let state = self.state.read().await;
        let mut live: Vec<(u64, T)> = state
            .records
            .values()
            .filter(|r| r.is_live(now))
            .map(|r| (r.seq, r.entity.clone()))
            .collect();
        live.sort_by_key(|(seq, _)| *seq);
        live.into_iter().map(|(_, entity)| entity).collect()
    }

    fn not_found(&self, id: &str) -> Error {
        Error::NotFound {
            kind: self.config.resource.clone(),
            id: id.to_string(),
        }
    }
}

/// Stable sort by a named field of the serialized entity.
///
/// Fails with a `Validation` error naming the field as soon as any entity
/// serializes without it.
fn sort_by_field<T: Entity>(items: Vec<T>, field: &str, order: SortOrder) -> Result<Vec<T>> {
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let value = serde_json::to_value(&item)
            .map_err(|e| Error::Internal(format!("serialize for sort: {e}")))?;
        let key = match value {
            Value::Object(mut map) => map.remove(field),
            _ => None,
        };
        match key {
            Some(key) => keyed.push((item, key)),
            None => {
                return Err(Error::Validation {
                    field: field.to_string(),
                    rule: "sortable_field".to_string(),
                    value: field.to_string(),
                })
            }
        }
    }
    // Vec::sort_by is stable, so equal keys keep insertion order in
    // either direction.
    keyed.sort_by(|(_, a), (_, b)| match order {
        SortOrder::Asc => compare_values(a, b),
        SortOrder::Desc => compare_values(a, b).reverse(),
    });
    Ok(keyed.into_iter().map(|(item, _)| item).collect())
}

/// Total order over JSON values: null < bool < number < string < rest;
/// same-type values compare naturally.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            // Integers compare exactly; f64 only for genuine floats or
            // mixed-sign/width pairs, where 2^53 truncation cannot bite.
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x.cmp(&y)
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x.cmp(&y)
            } else {
                let (x, y) = (x.as_f64(), y.as_f64());
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
