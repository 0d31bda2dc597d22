//! Statistical imputation methods.

use crate::error::{HealingError, Result, ResultExt};
use crate::types::ImputedColumn;
use crate::utils::{fill_numeric_nulls, is_numeric_dtype, median, numeric_values};
use polars::prelude::*;

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Replace the nulls of a numeric column with the median of its non-null values.
    ///
    /// The column is replaced in place (as Float64) and keeps its position.
    /// Returns `Ok(None)` when the column has no non-null value to take a
    /// median from.
    pub fn apply_numeric_median(
        df: &mut DataFrame,
        col_name: &str,
    ) -> Result<Option<ImputedColumn>> {
        let series = df
            .column(col_name)
            .map_err(|_| HealingError::ColumnNotFound(col_name.to_string()))?
            .as_materialized_series()
            .clone();

        if !is_numeric_dtype(series.dtype()) {
            return Err(HealingError::Compute(format!(
                "median imputation needs a numeric column, '{}' is {}",
                col_name,
                series.dtype()
            )));
        }

        let values = numeric_values(&series).context(format!("Reading '{}'", col_name))?;
        let Some(median_val) = median(&values) else {
            return Ok(None);
        };

        Self::fill_with_value(df, col_name, median_val, &series)?;

        Ok(Some(ImputedColumn {
            column: col_name.to_string(),
            method: "median".to_string(),
            value: median_val,
        }))
    }

    /// Fill numeric column with a specific value.
    fn fill_with_value(
        df: &mut DataFrame,
        col_name: &str,
        fill_value: f64,
        series: &Series,
    ) -> Result<()> {
        let filled = fill_numeric_nulls(series, fill_value)
            .context(format!("Filling '{}'", col_name))?;
        df.replace(col_name, filled)
            .context(format!("Replacing '{}'", col_name))?;
        Ok(())
    }
}
