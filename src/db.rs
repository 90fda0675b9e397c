use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{HistoricalSummary, Incident};

/// Per-key storage failures. Uniqueness conflicts never surface here; the
/// insert path swallows them via `ON CONFLICT ... DO NOTHING`.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("read failed: {0}")]
    Read(#[source] sqlx::Error),
    #[error("write failed: {0}")]
    Write(#[source] sqlx::Error),
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &SqlitePool) -> anyhow::Result<()> {
    let incidents = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "billing",
            NaiveDate::from_ymd_opt(2026, 2, 2).context("invalid date")?,
            Some("2026-02-02T08:00:00Z"),
            Some("2026-02-02T09:10:00Z"),
            Some("outage"),
            Some("high"),
            Some("payments-oncall"),
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "billing",
            NaiveDate::from_ymd_opt(2026, 2, 2).context("invalid date")?,
            Some("2026-02-02T10:00:00Z"),
            Some("2026-02-02T10:30:00Z"),
            Some("outage"),
            Some("medium"),
            Some("payments-oncall"),
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "billing",
            NaiveDate::from_ymd_opt(2026, 2, 3).context("invalid date")?,
            Some("2026-02-03T14:00:00Z"),
            None,
            Some("latency"),
            Some("low"),
            Some("payments-oncall"),
        ),
        (
            Uuid::parse_str("7b6e9a41-55c0-4f0e-9a37-1d2c83f4be19")?,
            "mobile-app",
            NaiveDate::from_ymd_opt(2026, 2, 2).context("invalid date")?,
            Some("2026-02-02T12:00:00Z"),
            Some("2026-02-02T13:00:00Z"),
            Some("crash"),
            Some("high"),
            Some("mobile-support"),
        ),
    ];

    for (id, product_id, incident_date, created_at, closed_at, category, priority, routed_group) in
        incidents
    {
        sqlx::query(
            r#"
            INSERT INTO incidents
            (id, product_id, incident_date, created_at, closed_at, category, priority, routed_group)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(product_id)
        .bind(incident_date)
        .bind(created_at)
        .bind(closed_at)
        .bind(category)
        .bind(priority)
        .bind(routed_group)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &SqlitePool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        product_id: String,
        incident_date: NaiveDate,
        created_at: Option<String>,
        closed_at: Option<String>,
        category: Option<String>,
        priority: Option<String>,
        routed_group: Option<String>,
        problem: Option<String>,
        solution: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let outcome = sqlx::query(
            r#"
            INSERT INTO incidents
            (id, product_id, incident_date, created_at, closed_at,
             category, priority, routed_group, problem, solution)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.product_id)
        .bind(row.incident_date)
        .bind(&row.created_at)
        .bind(&row.closed_at)
        .bind(&row.category)
        .bind(&row.priority)
        .bind(&row.routed_group)
        .bind(&row.problem)
        .bind(&row.solution)
        .execute(pool)
        .await?;

        if outcome.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn list_products(pool: &SqlitePool) -> Result<Vec<String>, StorageError> {
    let rows = sqlx::query("SELECT DISTINCT product_id FROM incidents ORDER BY product_id")
        .fetch_all(pool)
        .await
        .map_err(StorageError::Read)?;

    Ok(rows.iter().map(|row| row.get("product_id")).collect())
}

pub async fn list_incident_dates(
    pool: &SqlitePool,
    product_id: &str,
) -> Result<Vec<NaiveDate>, StorageError> {
    let rows = sqlx::query(
        "SELECT DISTINCT incident_date FROM incidents \
         WHERE product_id = ? ORDER BY incident_date",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await
    .map_err(StorageError::Read)?;

    Ok(rows.iter().map(|row| row.get("incident_date")).collect())
}

pub async fn summary_exists(
    pool: &SqlitePool,
    product_id: &str,
    summary_date: NaiveDate,
) -> Result<bool, StorageError> {
    let row = sqlx::query(
        "SELECT COUNT(1) AS n FROM historical_summaries \
         WHERE product_id = ? AND summary_date = ?",
    )
    .bind(product_id)
    .bind(summary_date)
    .fetch_one(pool)
    .await
    .map_err(StorageError::Read)?;

    Ok(row.get::<i64, _>("n") > 0)
}

/// Incidents for one key, ordered by id so frequency tie-breaks are
/// deterministic within a run.
pub async fn fetch_incidents(
    pool: &SqlitePool,
    product_id: &str,
    incident_date: NaiveDate,
) -> Result<Vec<Incident>, StorageError> {
    let rows = sqlx::query(
        "SELECT id, product_id, incident_date, created_at, closed_at, \
         category, priority, routed_group \
         FROM incidents WHERE product_id = ? AND incident_date = ? \
         ORDER BY id",
    )
    .bind(product_id)
    .bind(incident_date)
    .fetch_all(pool)
    .await
    .map_err(StorageError::Read)?;

    let mut incidents = Vec::new();
    for row in rows {
        incidents.push(Incident {
            id: row.get("id"),
            product_id: row.get("product_id"),
            incident_date: row.get("incident_date"),
            created_at: row.get("created_at"),
            closed_at: row.get("closed_at"),
            category: row.get("category"),
            priority: row.get("priority"),
            routed_group: row.get("routed_group"),
        });
    }

    Ok(incidents)
}

/// Single atomic insert per key. Returns `false` when another writer already
/// holds the (product, date) key; the unique constraint is the only
/// coordination between concurrent runs.
pub async fn insert_summary(
    pool: &SqlitePool,
    summary: &HistoricalSummary,
) -> Result<bool, StorageError> {
    let outcome = sqlx::query(
        r#"
        INSERT INTO historical_summaries
        (id, product_id, summary_date, volume, category, priority, group_name,
         resolution_time_minutes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (product_id, summary_date) DO NOTHING
        "#,
    )
    .bind(summary.id)
    .bind(&summary.product_id)
    .bind(summary.summary_date)
    .bind(summary.volume)
    .bind(&summary.category)
    .bind(&summary.priority)
    .bind(&summary.group_name)
    .bind(summary.resolution_time_minutes)
    .bind(summary.created_at)
    .bind(summary.updated_at)
    .execute(pool)
    .await
    .map_err(StorageError::Write)?;

    Ok(outcome.rows_affected() > 0)
}

pub async fn fetch_summaries(
    pool: &SqlitePool,
    product_id: Option<&str>,
) -> Result<Vec<HistoricalSummary>, StorageError> {
    let mut query = String::from(
        "SELECT id, product_id, summary_date, volume, category, priority, \
         group_name, resolution_time_minutes, created_at, updated_at \
         FROM historical_summaries",
    );

    if product_id.is_some() {
        query.push_str(" WHERE product_id = ?");
    }
    query.push_str(" ORDER BY product_id, summary_date");

    let mut rows = sqlx::query(&query);
    if let Some(value) = product_id {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await.map_err(StorageError::Read)?;
    let mut summaries = Vec::new();

    for row in records {
        summaries.push(HistoricalSummary {
            id: row.get("id"),
            product_id: row.get("product_id"),
            summary_date: row.get("summary_date"),
            volume: row.get("volume"),
            category: row.get("category"),
            priority: row.get("priority"),
            group_name: row.get("group_name"),
            resolution_time_minutes: row.get("resolution_time_minutes"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        });
    }

    Ok(summaries)
}
