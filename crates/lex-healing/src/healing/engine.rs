//! Healing engine.
//!
//! Applies the drop / impute / flag policy to a table:
//!
//! 1. Columns with more than `drop_threshold`% nulls are dropped.
//! 2. Numeric columns with fewer than `impute_threshold`% nulls get their
//!    nulls replaced with the column median.
//! 3. Columns between the two thresholds (inclusive) are flagged for manual
//!    review and left untouched.
//!
//! Non-numeric columns below the imputation threshold have no automatic
//! repair and are recorded as skipped.

use crate::config::EngineConfig;
use crate::error::{HealingError, Result, ResultExt};
use crate::imputers::StatisticalImputer;
use crate::quality::MissingValueAnalyzer;
use crate::types::{FlaggedColumn, HealingLog, SkippedColumn};
use crate::utils::{format_bytes, is_numeric_dtype};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Applies the repair policy and writes cleaned tables.
#[derive(Debug, Clone)]
pub struct HealingEngine {
    drop_threshold: f64,
    impute_threshold: f64,
    fallback_output_path: PathBuf,
}

impl Default for HealingEngine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl HealingEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            drop_threshold: config.drop_threshold,
            impute_threshold: config.impute_threshold,
            fallback_output_path: config.fallback_output_path.clone(),
        }
    }

    /// Repair a table in memory.
    ///
    /// Returns the cleaned table and a log without output details; see
    /// [`persist`](Self::persist) for writing the result.
    pub fn heal_frame(&self, mut df: DataFrame) -> Result<(DataFrame, HealingLog)> {
        let mut log = HealingLog::new(df.height());
        let percentages = MissingValueAnalyzer::null_percentages(&df);

        info!(
            "Healing {} rows, {} columns",
            df.height(),
            df.width()
        );

        // Drop first so later tiers only see surviving columns
        for (column, pct) in &percentages {
            if *pct > self.drop_threshold {
                df.drop_in_place(column)
                    .context(format!("Dropping '{}'", column))?;
                debug!("Dropped '{}' ({:.1}% missing)", column, pct);
                log.columns_dropped.push(column.clone());
            }
        }

        for (column, pct) in &percentages {
            let pct = *pct;
            if pct == 0.0 || pct > self.drop_threshold {
                continue;
            }

            if pct >= self.impute_threshold {
                debug!("Flagged '{}' ({:.1}% missing)", column, pct);
                log.columns_flagged.push(FlaggedColumn {
                    column: column.clone(),
                    null_percentage: pct,
                });
                continue;
            }

            let numeric = df
                .column(column)
                .map(|c| is_numeric_dtype(c.dtype()))
                .map_err(|_| HealingError::ColumnNotFound(column.clone()))?;

            if !numeric {
                log.columns_skipped.push(SkippedColumn {
                    column: column.clone(),
                    null_percentage: pct,
                    reason: "non-numeric column has no automatic imputation".to_string(),
                });
                continue;
            }

            match StatisticalImputer::apply_numeric_median(&mut df, column)? {
                Some(imputed) => {
                    debug!("Imputed '{}' with median {:.4}", column, imputed.value);
                    log.columns_imputed.push(imputed);
                }
                None => log.columns_skipped.push(SkippedColumn {
                    column: column.clone(),
                    null_percentage: pct,
                    reason: "no non-null values to take a median from".to_string(),
                }),
            }
        }

        info!(
            "Healing complete: {} dropped, {} imputed, {} flagged, {} skipped",
            log.columns_dropped.len(),
            log.columns_imputed.len(),
            log.columns_flagged.len(),
            log.columns_skipped.len()
        );

        Ok((df, log))
    }

    /// Where a cleaned table is written.
    ///
    /// An explicit path wins. Otherwise the cleaned file sits next to the
    /// source as `<stem>_cleaned.csv`; in-memory sources use the configured
    /// fallback path.
    pub fn resolve_output_path(&self, source: Option<&Path>, explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match source.and_then(|p| p.file_stem().map(|stem| (p, stem))) {
            Some((path, stem)) => {
                path.with_file_name(format!("{}_cleaned.csv", stem.to_string_lossy()))
            }
            None => self.fallback_output_path.clone(),
        }
    }

    /// Write a table as CSV, creating parent directories.
    ///
    /// Returns the human-readable size of the written file.
    pub fn persist(&self, df: &mut DataFrame, output_path: &Path) -> Result<String> {
        let persist_err = |reason: String| HealingError::Persist {
            path: output_path.to_path_buf(),
            reason,
        };

        if let Some(parent) = output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| persist_err(e.to_string()))?;
        }

        let mut file = File::create(output_path).map_err(|e| persist_err(e.to_string()))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .with_quote_char(b'"')
            .finish(df)
            .map_err(|e| persist_err(e.to_string()))?;

        let size = fs::metadata(output_path)
            .map_err(|e| persist_err(e.to_string()))?
            .len();

        info!("Cleaned table saved: {}", output_path.display());
        Ok(format_bytes(size))
    }

    /// Repair a table and write the result.
    pub fn heal_and_persist(
        &self,
        df: DataFrame,
        source: Option<&Path>,
        explicit_output: Option<&Path>,
    ) -> Result<(DataFrame, HealingLog)> {
        let (mut cleaned, mut log) = self.heal_frame(df)?;
        let output_path = self.resolve_output_path(source, explicit_output);
        let size = self.persist(&mut cleaned, &output_path)?;
        log.output_path = Some(output_path);
        log.output_size = Some(size);
        Ok((cleaned, log))
    }
}
