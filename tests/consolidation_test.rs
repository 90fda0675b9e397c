use chrono::NaiveDate;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use incident_history_consolidator::{consolidate, db};

/// Fresh single-connection in-memory store with the schema applied.
async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    db::init_db(&pool).await.expect("migrations");
    pool
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
}

async fn insert_incident(
    pool: &SqlitePool,
    product_id: &str,
    incident_date: &str,
    category: Option<&str>,
    created_at: Option<&str>,
    closed_at: Option<&str>,
) {
    sqlx::query(
        "INSERT INTO incidents (id, product_id, incident_date, created_at, closed_at, category) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(product_id)
    .bind(day(incident_date))
    .bind(created_at)
    .bind(closed_at)
    .bind(category)
    .execute(pool)
    .await
    .expect("insert incident");
}

#[tokio::test]
async fn two_incident_scenario_produces_expected_summary() {
    let pool = test_pool().await;
    insert_incident(
        &pool,
        "P1",
        "2025-01-01",
        Some("X"),
        Some("2025-01-01T00:00:00Z"),
        Some("2025-01-01T00:10:00Z"),
    )
    .await;
    insert_incident(
        &pool,
        "P1",
        "2025-01-01",
        Some("X"),
        Some("2025-01-01T00:00:00Z"),
        Some("2025-01-01T00:30:00Z"),
    )
    .await;

    let outcome = consolidate::run(&pool).await.expect("run");
    assert_eq!(outcome.created.len(), 1);
    assert_eq!(outcome.skipped, 0);
    assert!(outcome.failed.is_empty());

    let summaries = db::fetch_summaries(&pool, None).await.expect("fetch");
    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert_eq!(summary.product_id, "P1");
    assert_eq!(summary.summary_date, day("2025-01-01"));
    assert_eq!(summary.volume, 2);
    assert_eq!(summary.category.as_deref(), Some("X"));
    assert_eq!(summary.resolution_time_minutes, Some(20));
}

#[tokio::test]
async fn second_run_is_a_noop() {
    let pool = test_pool().await;
    insert_incident(&pool, "P1", "2025-01-01", Some("A"), None, None).await;
    insert_incident(&pool, "P2", "2025-01-02", Some("B"), None, None).await;

    let first = consolidate::run(&pool).await.expect("first run");
    assert_eq!(first.created.len(), 2);

    let before = db::fetch_summaries(&pool, None).await.expect("fetch");

    let second = consolidate::run(&pool).await.expect("second run");
    assert!(second.created.is_empty());
    assert_eq!(second.skipped, 2);
    assert!(second.failed.is_empty());

    let after = db::fetch_summaries(&pool, None).await.expect("fetch");
    assert_eq!(before.len(), after.len());
    for (a, b) in before.iter().zip(after.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.volume, b.volume);
        assert_eq!(a.created_at, b.created_at);
    }
}

#[tokio::test]
async fn every_key_with_incidents_gets_exactly_one_row() {
    let pool = test_pool().await;
    insert_incident(&pool, "P1", "2025-01-01", None, None, None).await;
    insert_incident(&pool, "P1", "2025-01-01", None, None, None).await;
    insert_incident(&pool, "P1", "2025-01-02", None, None, None).await;
    insert_incident(&pool, "P2", "2025-01-01", None, None, None).await;

    let outcome = consolidate::run(&pool).await.expect("run");
    assert_eq!(outcome.created.len(), 3);

    let summaries = db::fetch_summaries(&pool, None).await.expect("fetch");
    assert_eq!(summaries.len(), 3);

    let p1_day1 = summaries
        .iter()
        .find(|s| s.product_id == "P1" && s.summary_date == day("2025-01-01"))
        .expect("P1 2025-01-01 summary");
    assert_eq!(p1_day1.volume, 2);
}

#[tokio::test]
async fn existing_summary_rows_are_never_touched() {
    let pool = test_pool().await;
    insert_incident(&pool, "P1", "2025-01-01", Some("X"), None, None).await;

    // Pre-existing row with a volume the consolidator would never compute.
    sqlx::query(
        "INSERT INTO historical_summaries \
         (id, product_id, summary_date, volume, created_at, updated_at) \
         VALUES (?, 'P1', ?, 99, '2024-12-31T00:00:00Z', '2024-12-31T00:00:00Z')",
    )
    .bind(Uuid::new_v4())
    .bind(day("2025-01-01"))
    .execute(&pool)
    .await
    .expect("insert existing summary");

    let outcome = consolidate::run(&pool).await.expect("run");
    assert!(outcome.created.is_empty());
    assert_eq!(outcome.skipped, 1);

    let summaries = db::fetch_summaries(&pool, None).await.expect("fetch");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].volume, 99);
}

#[tokio::test]
async fn racing_insert_for_same_key_resolves_to_skip() {
    use chrono::Utc;
    use incident_history_consolidator::models::HistoricalSummary;

    let pool = test_pool().await;
    let make = || HistoricalSummary {
        id: Uuid::new_v4(),
        product_id: "P1".to_string(),
        summary_date: day("2025-01-01"),
        volume: 1,
        category: None,
        priority: None,
        group_name: None,
        resolution_time_minutes: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let first = db::insert_summary(&pool, &make()).await.expect("first");
    let second = db::insert_summary(&pool, &make()).await.expect("second");
    assert!(first);
    assert!(!second);

    let summaries = db::fetch_summaries(&pool, None).await.expect("fetch");
    assert_eq!(summaries.len(), 1);
}

#[tokio::test]
async fn all_null_classifications_stay_null() {
    let pool = test_pool().await;
    insert_incident(&pool, "P1", "2025-01-01", None, None, None).await;
    insert_incident(&pool, "P1", "2025-01-01", None, None, None).await;

    consolidate::run(&pool).await.expect("run");

    let summaries = db::fetch_summaries(&pool, None).await.expect("fetch");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].category, None);
    assert_eq!(summaries[0].priority, None);
    assert_eq!(summaries[0].group_name, None);
    assert_eq!(summaries[0].resolution_time_minutes, None);
}

#[tokio::test]
async fn one_poisoned_key_does_not_stop_the_run() {
    let pool = test_pool().await;
    insert_incident(&pool, "bad", "2025-01-01", Some("X"), None, None).await;
    insert_incident(&pool, "good-a", "2025-01-01", Some("Y"), None, None).await;
    insert_incident(&pool, "good-b", "2025-01-02", Some("Z"), None, None).await;

    sqlx::query(
        "CREATE TRIGGER poison_bad BEFORE INSERT ON historical_summaries \
         WHEN NEW.product_id = 'bad' \
         BEGIN SELECT RAISE(ABORT, 'simulated storage failure'); END",
    )
    .execute(&pool)
    .await
    .expect("create trigger");

    let outcome = consolidate::run(&pool).await.expect("run");
    assert_eq!(outcome.created.len(), 2);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].product_id, "bad");
    assert_eq!(outcome.failed[0].summary_date, Some(day("2025-01-01")));
    assert!(outcome.failed[0].reason.contains("write failed"));

    let summaries = db::fetch_summaries(&pool, None).await.expect("fetch");
    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.product_id != "bad"));
}

#[tokio::test]
async fn empty_store_yields_empty_outcome() {
    let pool = test_pool().await;
    let outcome = consolidate::run(&pool).await.expect("run");
    assert!(outcome.created.is_empty());
    assert_eq!(outcome.skipped, 0);
    assert!(outcome.failed.is_empty());
}

#[tokio::test]
async fn grouping_follows_incident_date_not_created_at() {
    let pool = test_pool().await;
    // created_at falls on a different calendar day than incident_date.
    insert_incident(
        &pool,
        "P1",
        "2025-01-01",
        Some("X"),
        Some("2025-01-03T23:00:00Z"),
        None,
    )
    .await;

    let outcome = consolidate::run(&pool).await.expect("run");
    assert_eq!(outcome.created.len(), 1);
    assert_eq!(outcome.created[0].summary_date, day("2025-01-01"));
}
