use crate::types::{ColumnMissing, MissingStats};
use crate::utils::percentage;
use polars::prelude::*;

/// Per-column null accounting.
pub struct MissingValueAnalyzer;

impl MissingValueAnalyzer {
    /// Count nulls per column.
    ///
    /// Only columns with at least one null are listed, in original column
    /// order. Percentages are 0.0 for a table without rows.
    pub fn analyze(df: &DataFrame) -> MissingStats {
        let rows = df.height();
        let mut stats = MissingStats::default();

        for column in df.get_columns() {
            let count = column.null_count();
            if count == 0 {
                continue;
            }
            stats.total_missing += count;
            stats.columns_with_missing.push(ColumnMissing {
                column: column.name().to_string(),
                count,
                percentage: percentage(count, rows),
            });
        }

        stats
    }

    /// Null percentage of every column, in original column order.
    pub fn null_percentages(df: &DataFrame) -> Vec<(String, f64)> {
        let rows = df.height();
        df.get_columns()
            .iter()
            .map(|column| {
                (
                    column.name().to_string(),
                    percentage(column.null_count(), rows),
                )
            })
            .collect()
    }
}
