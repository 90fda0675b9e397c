use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One raw ticket row, as written by the ingestion side. The consolidator
/// never mutates these.
#[derive(Debug, Clone)]
pub struct Incident {
    pub id: Uuid,
    pub product_id: String,
    /// The calendar date the incident is attributed to. Deliberately
    /// independent of `created_at`'s calendar date.
    pub incident_date: NaiveDate,
    /// Raw timestamp strings; may be absent or unparseable.
    pub created_at: Option<String>,
    pub closed_at: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub routed_group: Option<String>,
}

/// One aggregated row per (product, date).
#[derive(Debug, Clone)]
pub struct HistoricalSummary {
    pub id: Uuid,
    pub product_id: String,
    pub summary_date: NaiveDate,
    pub volume: i64,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub group_name: Option<String>,
    pub resolution_time_minutes: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryKey {
    pub product_id: String,
    pub summary_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedKey {
    pub product_id: String,
    /// None when the date listing itself failed and no key was reached.
    pub summary_date: Option<NaiveDate>,
    pub reason: String,
}

/// Tally of a single consolidation run.
#[derive(Debug, Default, Serialize)]
pub struct RunOutcome {
    pub created: Vec<SummaryKey>,
    pub skipped: usize,
    pub failed: Vec<FailedKey>,
}

impl RunOutcome {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Per-product aggregate over the summary table, for the coverage report.
#[derive(Debug, Clone)]
pub struct ProductRollup {
    pub product_id: String,
    pub days_summarized: usize,
    pub total_volume: i64,
    pub dominant_category: Option<String>,
    pub avg_resolution_minutes: Option<i64>,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}
