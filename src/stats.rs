use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::models::{HistoricalSummary, Incident};

/// Mode of the non-blank values. Ties go to the value whose first occurrence
/// comes earliest in the input.
pub fn most_frequent<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();

    for (idx, value) in values.into_iter().enumerate() {
        if value.is_empty() {
            continue;
        }
        let entry = counts.entry(value).or_insert((0, idx));
        entry.0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(value, _)| value.to_string())
}

/// Mean rounded to the nearest integer, half away from zero. Empty input
/// yields `None`.
pub fn mean_rounded(values: &[f64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some(mean.round() as i64)
}

/// Lenient timestamp parsing for the raw incident columns: RFC 3339, or a
/// bare `YYYY-MM-DD HH:MM:SS` taken as UTC. Anything else is treated as
/// absent.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// `closed_at - created_at` in minutes, when both timestamps are present and
/// parse. Malformed or missing values exclude the incident silently.
pub fn resolution_minutes(incident: &Incident) -> Option<f64> {
    let created = parse_timestamp(incident.created_at.as_deref()?)?;
    let closed = parse_timestamp(incident.closed_at.as_deref()?)?;
    Some((closed - created).num_seconds() as f64 / 60.0)
}

/// Aggregate one (product, date) key's incidents into a summary row.
pub fn summarize(
    product_id: &str,
    summary_date: NaiveDate,
    incidents: &[Incident],
    now: DateTime<Utc>,
) -> HistoricalSummary {
    let resolutions: Vec<f64> = incidents.iter().filter_map(resolution_minutes).collect();

    HistoricalSummary {
        id: Uuid::new_v4(),
        product_id: product_id.to_string(),
        summary_date,
        volume: incidents.len() as i64,
        category: most_frequent(incidents.iter().filter_map(|i| i.category.as_deref())),
        priority: most_frequent(incidents.iter().filter_map(|i| i.priority.as_deref())),
        group_name: most_frequent(incidents.iter().filter_map(|i| i.routed_group.as_deref())),
        resolution_time_minutes: mean_rounded(&resolutions),
        created_at: now,
        updated_at: now,
    }
}
