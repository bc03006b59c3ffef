//! Drift-tolerant writes against simulated deployments of the daily report table.

use serde_json::json;
use sitelog::app::daily_reports::daily_report_policy;
use sitelog::storage::{InMemoryRecordStore, RecordStore};
use sitelog::{
    AdaptiveUpsert, KnownMissingColumns, Payload, RecordId, StoreError, UpsertError, WriteIntent,
    WritePolicy, WriteTarget,
};

const TABLE: &str = "daily_reports";

fn policy() -> WritePolicy {
    daily_report_policy(8, false)
}

fn full_report() -> Payload {
    Payload::from_value(json!({
        "site_id": "site-7",
        "work_date": "2024-05-01",
        "status": "submitted",
        "author_name": "Kim",
        "weather": "sunny",
        "headcount": 14,
        "notes": "slab poured on level 3",
        "work_content": { "tasks": ["formwork", "pour"] },
        "location": { "lat": 35.68, "lng": 139.76 }
    }))
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn matching_schema_writes_once_and_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryRecordStore::baseline();
    let policy = policy();
    let payload = full_report();

    let outcome = AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::insert(payload.clone()))
        .await?;

    assert_eq!(outcome.attempts, 1);
    assert!(outcome.dropped.is_empty());
    assert!(outcome.defaulted.is_empty());
    for (column, value) in payload.iter() {
        assert_eq!(outcome.row.get(column), Some(value), "column {column}");
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_optional_column_is_dropped_and_remembered() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryRecordStore::baseline().without_column(TABLE, "weather");
    let policy = policy();
    let known = KnownMissingColumns::new();

    let first = AdaptiveUpsert::new(&store, &policy)
        .with_known_missing(&known)
        .execute(WriteIntent::insert(full_report()))
        .await?;
    assert!(first.attempts <= 2);
    assert_eq!(first.dropped, vec!["weather".to_string()]);
    assert!(first.row.get("weather").is_none());
    assert!(known.contains(TABLE, "weather").await);

    // The next write skips the column up front.
    let mut next = full_report();
    next.insert("work_date", json!("2024-05-02"));
    let second = AdaptiveUpsert::new(&store, &policy)
        .with_known_missing(&known)
        .execute(WriteIntent::insert(next))
        .await?;
    assert_eq!(second.attempts, 1);
    assert_eq!(second.dropped, vec!["weather".to_string()]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_essential_column_fails_without_retry() {
    let store = InMemoryRecordStore::baseline().without_column(TABLE, "site_id");
    let policy = policy();

    let err = AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::insert(full_report()))
        .await
        .unwrap_err();

    match err {
        UpsertError::EssentialColumn { column, .. } => assert_eq!(column, "site_id"),
        other => panic!("expected essential column failure, got {other:?}"),
    }
    assert_eq!(store.write_calls(TABLE).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn required_column_gets_its_default() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryRecordStore::baseline().require_column(TABLE, "headcount");
    let policy = policy();
    let mut payload = full_report();
    payload.remove("headcount");

    let outcome = AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::insert(payload))
        .await?;

    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.defaulted, vec!["headcount".to_string()]);
    assert_eq!(outcome.row["headcount"], json!(0));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_default_follows_the_requested_status() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryRecordStore::baseline();
    let policy = policy();

    let mut asked = full_report();
    asked.remove("status");
    let outcome = AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::insert(asked).with_desired_status(Some("submitted".to_string())))
        .await?;
    assert_eq!(outcome.row["status"], json!("submitted"));

    let mut silent = full_report();
    silent.remove("status");
    silent.insert("work_date", json!("2024-05-09"));
    let outcome = AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::insert(silent))
        .await?;
    assert_eq!(outcome.row["status"], json!("draft"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn required_column_without_rule_is_fatal() {
    let store = InMemoryRecordStore::baseline().require_column(TABLE, "location");
    let policy = policy();
    let mut payload = full_report();
    payload.remove("location");

    let err = AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::insert(payload))
        .await
        .unwrap_err();
    assert!(matches!(err, UpsertError::NoDefault { ref column } if column == "location"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn not_null_on_essential_column_is_fatal() {
    let store = InMemoryRecordStore::baseline();
    store
        .fail_next_write(TABLE, StoreError::NotNull { column: "work_date".to_string() })
        .await;
    let policy = policy();

    let err = AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::insert(full_report()))
        .await
        .unwrap_err();
    assert!(matches!(err, UpsertError::EssentialColumn { ref column, .. } if column == "work_date"));
    assert_eq!(store.write_calls(TABLE).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_insert_becomes_update() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryRecordStore::baseline();
    let existing = store
        .seed_row(
            TABLE,
            json!({
                "site_id": "site-7",
                "work_date": "2024-05-01",
                "status": "draft",
                "author_name": "Lee"
            }),
        )
        .await?;
    let existing_id = RecordId::from_row(&existing, "id").ok_or("seeded row has no id")?;
    let policy = policy();

    let outcome = AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::insert(full_report()))
        .await?;

    assert_eq!(outcome.target, WriteTarget::Update(existing_id));
    assert_eq!(outcome.attempts, 2);
    let rows = store.rows(TABLE).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["notes"], json!("slab poured on level 3"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_with_vanished_row_is_unresolved() {
    let store = InMemoryRecordStore::baseline();
    store
        .fail_next_write(TABLE, StoreError::UniqueConflict { constraint: None })
        .await;
    let policy = policy();

    let err = AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::insert(full_report()))
        .await
        .unwrap_err();
    assert!(matches!(err, UpsertError::ConflictUnresolved));
    assert_eq!(store.write_calls(TABLE).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_on_update_is_fatal() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryRecordStore::baseline();
    let policy = policy();
    AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::insert(full_report()))
        .await?;
    let mut second = full_report();
    second.insert("work_date", json!("2024-05-02"));
    let second = AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::insert(second))
        .await?;
    let second_id = RecordId::from_row(&second.row, "id").ok_or("no id")?;

    let mut clash = Payload::new();
    clash.insert("work_date", json!("2024-05-01"));
    let err = AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::update(second_id, clash))
        .await
        .unwrap_err();
    assert!(matches!(err, UpsertError::Store(StoreError::UniqueConflict { .. })));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stale_cache_drops_json_columns() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryRecordStore::baseline();
    store.fail_next_write(TABLE, StoreError::StaleSchemaCache).await;
    let policy = policy();

    let outcome = AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::insert(full_report()))
        .await?;

    assert_eq!(outcome.attempts, 2);
    assert!(outcome.dropped.contains(&"work_content".to_string()));
    assert!(outcome.dropped.contains(&"location".to_string()));
    assert!(outcome.row.get("work_content").is_none());
    assert_eq!(outcome.row["notes"], json!("slab poured on level 3"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn persistent_failure_stops_at_the_ceiling() {
    let store = InMemoryRecordStore::baseline();
    store
        .fail_all_writes(TABLE, StoreError::MissingColumn { column: "notes".to_string() })
        .await;
    let policy = policy();

    let err = AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::insert(full_report()))
        .await
        .unwrap_err();

    match err {
        UpsertError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 8);
            assert_eq!(last, StoreError::MissingColumn { column: "notes".to_string() });
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(store.write_calls(TABLE).await, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn strict_progress_aborts_on_a_repeated_failure() {
    let store = InMemoryRecordStore::baseline();
    store
        .fail_all_writes(TABLE, StoreError::MissingColumn { column: "notes".to_string() })
        .await;
    let policy = daily_report_policy(8, true);

    let err = AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::insert(full_report()))
        .await
        .unwrap_err();

    assert!(matches!(err, UpsertError::Stalled { attempt: 2, .. }));
    assert_eq!(store.write_calls(TABLE).await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unclassified_failure_surfaces_immediately() {
    let store = InMemoryRecordStore::baseline();
    store
        .fail_next_write(TABLE, StoreError::PermissionDenied("row-level security".to_string()))
        .await;
    let policy = policy();

    let err = AdaptiveUpsert::new(&store, &policy)
        .execute(WriteIntent::insert(full_report()))
        .await
        .unwrap_err();

    assert!(matches!(err, UpsertError::Store(StoreError::PermissionDenied(_))));
    assert_eq!(store.write_calls(TABLE).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn known_missing_never_strips_essential_columns() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryRecordStore::baseline();
    let known = KnownMissingColumns::new();
    known.insert(TABLE, "site_id").await;
    known.insert(TABLE, "notes").await;
    let policy = policy();

    let outcome = AdaptiveUpsert::new(&store, &policy)
        .with_known_missing(&known)
        .execute(WriteIntent::insert(full_report()))
        .await?;

    assert_eq!(outcome.dropped, vec!["notes".to_string()]);
    assert_eq!(outcome.row["site_id"], json!("site-7"));
    assert!(store.find_one(TABLE, &vec![("site_id".to_string(), json!("site-7"))]).await?.is_some());
    Ok(())
}
