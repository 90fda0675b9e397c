use std::fmt::Write;

use crate::models::{HistoricalSummary, ProductRollup};
use crate::stats;

pub fn rollup_by_product(summaries: &[HistoricalSummary]) -> Vec<ProductRollup> {
    let mut rollups: Vec<ProductRollup> = Vec::new();

    for summary in summaries {
        let existing = rollups
            .iter_mut()
            .find(|r| r.product_id == summary.product_id);
        match existing {
            Some(rollup) => {
                rollup.days_summarized += 1;
                rollup.total_volume += summary.volume;
                rollup.first_date = rollup.first_date.min(summary.summary_date);
                rollup.last_date = rollup.last_date.max(summary.summary_date);
            }
            None => rollups.push(ProductRollup {
                product_id: summary.product_id.clone(),
                days_summarized: 1,
                total_volume: summary.volume,
                dominant_category: None,
                avg_resolution_minutes: None,
                first_date: summary.summary_date,
                last_date: summary.summary_date,
            }),
        }
    }

    for rollup in rollups.iter_mut() {
        rollup.dominant_category = stats::most_frequent(
            summaries
                .iter()
                .filter(|s| s.product_id == rollup.product_id)
                .filter_map(|s| s.category.as_deref()),
        );

        let resolutions: Vec<f64> = summaries
            .iter()
            .filter(|s| s.product_id == rollup.product_id)
            .filter_map(|s| s.resolution_time_minutes)
            .map(|m| m as f64)
            .collect();
        rollup.avg_resolution_minutes = stats::mean_rounded(&resolutions);
    }

    rollups.sort_by(|a, b| b.total_volume.cmp(&a.total_volume));
    rollups
}

pub fn build_report(product: Option<&str>, summaries: &[HistoricalSummary]) -> String {
    let rollups = rollup_by_product(summaries);

    let mut output = String::new();
    let scope_label = product.unwrap_or("all products");

    let _ = writeln!(output, "# Incident History Coverage");
    let _ = writeln!(
        output,
        "Generated for {} ({} summarized days)",
        scope_label,
        summaries.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Products");

    if rollups.is_empty() {
        let _ = writeln!(output, "No historical summaries recorded yet.");
    } else {
        for rollup in rollups.iter() {
            let category = rollup.dominant_category.as_deref().unwrap_or("n/a");
            let resolution = rollup
                .avg_resolution_minutes
                .map(|m| format!("{m} min"))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(
                output,
                "- {}: {} days ({} to {}), volume {}, top category {}, avg resolution {}",
                rollup.product_id,
                rollup.days_summarized,
                rollup.first_date,
                rollup.last_date,
                rollup.total_volume,
                category,
                resolution
            );
        }
    }

    let mut recent: Vec<&HistoricalSummary> = summaries.iter().collect();
    recent.sort_by(|a, b| b.summary_date.cmp(&a.summary_date));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Days");

    if recent.is_empty() {
        let _ = writeln!(output, "No historical summaries recorded yet.");
    } else {
        for summary in recent.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} on {}: {} incidents ({})",
                summary.product_id,
                summary.summary_date,
                summary.volume,
                summary.category.as_deref().unwrap_or("uncategorized")
            );
        }
    }

    output
}
