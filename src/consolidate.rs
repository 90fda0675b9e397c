use anyhow::Context;
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::db::{self, StorageError};
use crate::models::{FailedKey, RunOutcome, SummaryKey};
use crate::stats;

enum KeyOutcome {
    Created,
    Skipped,
}

/// One consolidation run: every (product, date) key with incidents and no
/// summary row gets exactly one row. A failing key is recorded and the run
/// moves on; only an unreachable store aborts the whole run.
pub async fn run(pool: &SqlitePool) -> anyhow::Result<RunOutcome> {
    let products = db::list_products(pool)
        .await
        .context("cannot enumerate products, store unreachable")?;

    let mut outcome = RunOutcome::default();

    for product_id in &products {
        let dates = match db::list_incident_dates(pool, product_id).await {
            Ok(dates) => dates,
            Err(err) => {
                tracing::warn!(product = %product_id, error = %err, "date listing failed");
                outcome.failed.push(FailedKey {
                    product_id: product_id.clone(),
                    summary_date: None,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        for summary_date in dates {
            match consolidate_key(pool, product_id, summary_date).await {
                Ok(KeyOutcome::Created) => {
                    tracing::info!(product = %product_id, date = %summary_date, "summary created");
                    outcome.created.push(SummaryKey {
                        product_id: product_id.clone(),
                        summary_date,
                    });
                }
                Ok(KeyOutcome::Skipped) => {
                    outcome.skipped += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        product = %product_id,
                        date = %summary_date,
                        error = %err,
                        "key failed"
                    );
                    outcome.failed.push(FailedKey {
                        product_id: product_id.clone(),
                        summary_date: Some(summary_date),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    Ok(outcome)
}

/// The unit of atomicity: exists-check, fetch, aggregate, single insert.
/// Interrupting between keys leaves no partial state behind.
async fn consolidate_key(
    pool: &SqlitePool,
    product_id: &str,
    summary_date: NaiveDate,
) -> Result<KeyOutcome, StorageError> {
    if db::summary_exists(pool, product_id, summary_date).await? {
        return Ok(KeyOutcome::Skipped);
    }

    let incidents = db::fetch_incidents(pool, product_id, summary_date).await?;
    if incidents.is_empty() {
        // Key vanished between enumeration and fetch (concurrent deletion).
        return Ok(KeyOutcome::Skipped);
    }

    let summary = stats::summarize(product_id, summary_date, &incidents, Utc::now());
    if db::insert_summary(pool, &summary).await? {
        Ok(KeyOutcome::Created)
    } else {
        // Lost the uniqueness race to a concurrent run.
        Ok(KeyOutcome::Skipped)
    }
}
