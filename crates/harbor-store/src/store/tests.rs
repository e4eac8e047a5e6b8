use super::EntityStore;
use crate::config::StoreConfig;
use crate::entity::Entity;
use crate::error::{Error, ValidationIssue};
use crate::pagination::{PageRequest, SortOrder};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Task {
    id: String,
    title: String,
    priority: u32,
    done: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    fn new(title: &str, priority: u32) -> Self {
        Self {
            id: String::new(),
            title: title.to_string(),
            priority,
            done: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

impl Entity for Task {
    fn id(&self) -> &str {
        &self.id
    }
    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

fn task_store() -> EntityStore<Task> {
    EntityStore::new(StoreConfig::for_resource("task"))
}

fn validated_store() -> EntityStore<Task> {
    EntityStore::new(StoreConfig::for_resource("task"))
        .with_sanitizer(|task: &mut Task| task.title = task.title.trim().to_string())
        .with_validator(|task: &Task| {
            if task.title.is_empty() {
                Err(ValidationIssue::new("title", "non_empty", task.title.as_str()))
            } else {
                Ok(())
            }
        })
}

// ── Create ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_assigns_id_and_timestamps() {
    let store = task_store();
    let task = store.create(Task::new("Buy milk", 1)).await.unwrap();

    assert!(!task.id.is_empty());
    assert_eq!(task.created_at, task.updated_at);
    assert_eq!(store.count().await, 1);

    let got = store.get(&task.id).await.unwrap();
    assert_eq!(got, task);
}

#[tokio::test]
async fn test_create_ids_are_unique() {
    let store = task_store();
    let mut ids = HashSet::new();
    for i in 0..100 {
        let task = store.create(Task::new(&format!("t{i}"), i)).await.unwrap();
        assert!(ids.insert(task.id));
    }
    assert_eq!(store.count().await, 100);
}

#[tokio::test]
async fn test_create_accepts_caller_supplied_id_once() {
    let store = task_store();
    let mut task = Task::new("pinned", 1);
    task.id = "task-1".to_string();
    let created = store.create(task.clone()).await.unwrap();
    assert_eq!(created.id, "task-1");

    // Same id again is a failed uniqueness rule
    let err = store.create(task).await.unwrap_err();
    match err {
        Error::Validation { field, rule, value } => {
            assert_eq!(field, "id");
            assert_eq!(rule, "unique");
            assert_eq!(value, "task-1");
        }
        other => panic!("expected Validation, got: {other:?}"),
    }
    assert_eq!(store.count().await, 1);
}

#[tokio::test]
async fn test_create_validation_failure_is_atomic() {
    let store = validated_store();
    let err = store.create(Task::new("   ", 1)).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(store.count().await, 0);
}

#[tokio::test]
async fn test_sanitize_runs_before_validate() {
    let store = validated_store();
    // Whitespace padding survives only if sanitation ran first
    let task = store.create(Task::new("  trimmed  ", 1)).await.unwrap();
    assert_eq!(task.title, "trimmed");
}

#[tokio::test]
async fn test_sanitizer_cannot_clobber_store_owned_fields() {
    let store =
        EntityStore::new(StoreConfig::for_resource("task")).with_sanitizer(|task: &mut Task| {
            task.id = "forged".to_string();
            task.created_at = Utc::now() + Duration::days(365);
            task.updated_at = Utc::now() + Duration::days(365);
        });

    let before = Utc::now();
    let task = store.create(Task::new("t", 1)).await.unwrap();

    // id and timestamps are assigned by the store, not the hook
    assert_ne!(task.id, "forged");
    assert_eq!(task.created_at, task.updated_at);
    assert!(task.created_at >= before);
    assert!(task.created_at <= Utc::now());
    assert!(store.get(&task.id).await.is_some());
}

#[tokio::test]
async fn test_capacity_cap() {
    let store =
        EntityStore::new(StoreConfig::for_resource("task").with_max_entities(2));
    store.create(Task::new("a", 1)).await.unwrap();
    let b = store.create(Task::new("b", 2)).await.unwrap();

    let err = store.create(Task::new("c", 3)).await.unwrap_err();
    assert!(matches!(err, Error::Capacity { max: 2 }));

    // Deleting frees capacity
    assert!(store.delete(&b.id).await);
    store.create(Task::new("c", 3)).await.unwrap();
}

#[tokio::test]
async fn test_expired_records_do_not_consume_capacity() {
    let store =
        EntityStore::new(StoreConfig::for_resource("task").with_max_entities(1));
    store
        .create_with_ttl(Task::new("ephemeral", 1), Some(Duration::milliseconds(20)))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    store.create(Task::new("replacement", 2)).await.unwrap();
    assert_eq!(store.count().await, 1);
}

// ── TTL ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ttl_entity_visible_before_expiry_absent_after() {
    let store = task_store();
    let task = store
        .create_with_ttl(Task::new("ephemeral", 1), Some(Duration::milliseconds(60)))
        .await
        .unwrap();

    assert!(store.exists(&task.id).await);
    assert!(store.get(&task.id).await.is_some());

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    assert!(!store.exists(&task.id).await);
    assert!(store.get(&task.id).await.is_none());
    assert_eq!(store.count().await, 0);
    assert!(store.list().await.is_empty());
}

#[tokio::test]
async fn test_default_ttl_from_config() {
    let store = EntityStore::new(
        StoreConfig::for_resource("task").with_default_ttl(Duration::milliseconds(20)),
    );
    let task = store.create(Task::new("fleeting", 1)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(store.get(&task.id).await.is_none());
}

#[tokio::test]
async fn test_set_ttl_extends_and_clears() {
    let store = task_store();
    let task = store
        .create_with_ttl(Task::new("t", 1), Some(Duration::milliseconds(20)))
        .await
        .unwrap();

    // Clearing the TTL keeps the entity alive past the original expiry
    store.set_ttl(&task.id, None).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(store.exists(&task.id).await);

    let err = store.set_ttl("missing", None).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn test_update_preserves_original_expiry() {
    let store = task_store();
    let task = store
        .create_with_ttl(Task::new("t", 1), Some(Duration::milliseconds(100)))
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // A mid-life update neither clears nor restarts the lifespan
    store.update(&task.id, |t| t.done = true).await.unwrap();
    assert!(store.exists(&task.id).await);

    // Past the original deadline (but well short of a restarted one)
    tokio::time::sleep(std::time::Duration::from_millis(80)).await;
    assert!(!store.exists(&task.id).await);
}

#[tokio::test]
async fn test_purge_expired() {
    let store = task_store();
    store
        .create_with_ttl(Task::new("a", 1), Some(Duration::milliseconds(10)))
        .await
        .unwrap();
    store
        .create_with_ttl(Task::new("b", 2), Some(Duration::milliseconds(10)))
        .await
        .unwrap();
    store.create(Task::new("keep", 3)).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(40)).await;
    assert_eq!(store.purge_expired().await, 2);
    assert_eq!(store.purge_expired().await, 0);
    assert_eq!(store.count().await, 1);
}

// ── Update ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_merges_and_refreshes_updated_at() {
    let store = task_store();
    let task = store.create(Task::new("draft", 1)).await.unwrap();

    let updated = store
        .update(&task.id, |t| {
            t.title = "final".to_string();
            t.done = true;
        })
        .await
        .unwrap();

    assert_eq!(updated.title, "final");
    assert!(updated.done);
    assert_eq!(updated.id, task.id);
    assert_eq!(updated.created_at, task.created_at);
    assert!(updated.updated_at > task.updated_at);
}

#[tokio::test]
async fn test_update_keeps_id_and_created_at_immutable() {
    let store = task_store();
    let task = store.create(Task::new("t", 1)).await.unwrap();

    let updated = store
        .update(&task.id, |t| {
            t.id = "hijacked".to_string();
            t.created_at = Utc::now() + Duration::days(1);
        })
        .await
        .unwrap();

    assert_eq!(updated.id, task.id);
    assert_eq!(updated.created_at, task.created_at);
    assert!(store.get("hijacked").await.is_none());
}

#[tokio::test]
async fn test_update_missing_id_is_not_found() {
    let store = task_store();
    let err = store.update("nope", |t| t.done = true).await.unwrap_err();
    match err {
        Error::NotFound { kind, id } => {
            assert_eq!(kind, "task");
            assert_eq!(id, "nope");
        }
        other => panic!("expected NotFound, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_update_expired_id_is_not_found() {
    let store = task_store();
    let task = store
        .create_with_ttl(Task::new("t", 1), Some(Duration::milliseconds(10)))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(40)).await;
    let err = store.update(&task.id, |t| t.done = true).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn test_update_validation_failure_is_atomic() {
    let store = validated_store();
    let task = store.create(Task::new("keep me", 1)).await.unwrap();

    let err = store
        .update(&task.id, |t| t.title = "  ".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    // Pre-patch value is unchanged
    let current = store.get(&task.id).await.unwrap();
    assert_eq!(current, task);
}

// ── Delete / clear ──────────────────────────────────────────────

#[tokio::test]
async fn test_delete_returns_whether_removed() {
    let store = task_store();
    let task = store.create(Task::new("t", 1)).await.unwrap();

    assert!(store.delete(&task.id).await);
    assert!(!store.delete(&task.id).await);
    assert!(!store.delete("never-existed").await);
}

#[tokio::test]
async fn test_clear() {
    let store = task_store();
    for i in 0..5 {
        store.create(Task::new(&format!("t{i}"), i)).await.unwrap();
    }
    store.clear().await;
    assert_eq!(store.count().await, 0);
}

// ── Queries ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_preserves_insertion_order() {
    let store = task_store();
    for i in 0..5 {
        store.create(Task::new(&format!("t{i}"), i)).await.unwrap();
    }
    let titles: Vec<String> = store.list().await.into_iter().map(|t| t.title).collect();
    assert_eq!(titles, vec!["t0", "t1", "t2", "t3", "t4"]);
}

#[tokio::test]
async fn test_find_where() {
    let store = task_store();
    for i in 0..6 {
        store.create(Task::new(&format!("t{i}"), i)).await.unwrap();
    }
    let high: Vec<Task> = store.find_where(|t| t.priority >= 4).await;
    assert_eq!(high.len(), 2);
    assert_eq!(high[0].title, "t4");
    assert_eq!(high[1].title, "t5");
}

#[tokio::test]
async fn test_pagination_envelope() {
    let store = task_store();
    for i in 0..25 {
        store.create(Task::new(&format!("t{i:02}"), i)).await.unwrap();
    }

    let page = store.list_paged(&PageRequest::new(2, 10)).await.unwrap();
    assert_eq!(page.items.len(), 10);
    assert_eq!(page.total_items, 25);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.current_page, 2);
    assert!(page.has_next);
    assert!(page.has_prev);

    let last = store.list_paged(&PageRequest::new(3, 10)).await.unwrap();
    assert_eq!(last.items.len(), 5);
    assert!(!last.has_next);
    assert!(last.has_prev);
}

#[tokio::test]
async fn test_pages_cover_the_set_exactly_once() {
    let store = task_store();
    for i in 0..25 {
        store.create(Task::new(&format!("t{i:02}"), i)).await.unwrap();
    }

    let mut seen = Vec::new();
    for page in 1..=3 {
        let req = PageRequest::new(page, 10).sorted_by("title", SortOrder::Asc);
        let result = store.list_paged(&req).await.unwrap();
        seen.extend(result.items.into_iter().map(|t| t.title));
    }
    let expected: Vec<String> = (0..25).map(|i| format!("t{i:02}")).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_page_past_the_end_is_empty_with_correct_totals() {
    let store = task_store();
    for i in 0..3 {
        store.create(Task::new(&format!("t{i}"), i)).await.unwrap();
    }
    let page = store.list_paged(&PageRequest::new(9, 2)).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_items, 3);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.current_page, 9);
    assert!(!page.has_next);
}

#[tokio::test]
async fn test_sort_by_numeric_field_desc() {
    let store = task_store();
    store.create(Task::new("low", 1)).await.unwrap();
    store.create(Task::new("high", 9)).await.unwrap();
    store.create(Task::new("mid", 5)).await.unwrap();

    let req = PageRequest::new(1, 10).sorted_by("priority", SortOrder::Desc);
    let page = store.list_paged(&req).await.unwrap();
    let titles: Vec<String> = page.items.into_iter().map(|t| t.title).collect();
    assert_eq!(titles, vec!["high", "mid", "low"]);
}

#[tokio::test]
async fn test_sort_is_stable_on_ties() {
    let store = task_store();
    store.create(Task::new("first", 1)).await.unwrap();
    store.create(Task::new("second", 1)).await.unwrap();
    store.create(Task::new("third", 1)).await.unwrap();

    let req = PageRequest::new(1, 10).sorted_by("priority", SortOrder::Asc);
    let page = store.list_paged(&req).await.unwrap();
    let titles: Vec<String> = page.items.into_iter().map(|t| t.title).collect();
    // Equal keys keep insertion order
    assert_eq!(titles, vec!["first", "second", "third"]);
}

#[test]
fn test_integer_sort_keys_compare_exactly_beyond_f64_precision() {
    use serde_json::json;
    use std::cmp::Ordering;

    // 2^53 and 2^53 + 1 are equal as f64
    let a = json!(9_007_199_254_740_992_u64);
    let b = json!(9_007_199_254_740_993_u64);
    assert_eq!(super::compare_values(&a, &b), Ordering::Less);
    assert_eq!(super::compare_values(&b, &a), Ordering::Greater);
    assert_eq!(super::compare_values(&a, &a), Ordering::Equal);

    let negative = json!(-5);
    assert_eq!(super::compare_values(&negative, &a), Ordering::Less);
}

#[tokio::test]
async fn test_unknown_sort_field_is_rejected() {
    let store = task_store();
    store.create(Task::new("t", 1)).await.unwrap();

    let req = PageRequest::new(1, 10).sorted_by("no_such_field", SortOrder::Asc);
    let err = store.list_paged(&req).await.unwrap_err();
    match err {
        Error::Validation { field, .. } => assert_eq!(field, "no_such_field"),
        other => panic!("expected Validation, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_zero_page_and_page_size_are_rejected() {
    let store = task_store();
    assert!(store.list_paged(&PageRequest::new(0, 10)).await.is_err());
    assert!(store.list_paged(&PageRequest::new(1, 0)).await.is_err());
}
