//! End-to-end smoke test of the engine.
//!
//! Writes a small table with known missingness to a scratch directory, scans
//! and heals it, and checks the results. The scratch directory is removed
//! when the check returns, whether it passed or not.

use crate::config::{EngineConfig, ExecutionMode};
use crate::engine::Engine;
use crate::error::{HealingError, Result};
use crate::loader::TableSource;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const HEALTH_CHECK_ROWS: usize = 100;
const VALUE_NULL_PROBABILITY: f64 = 0.3;
const CATEGORIES: [&str; 3] = ["A", "B", "C"];

/// Outcome of a passing health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckReport {
    pub execution_mode: ExecutionMode,
    pub drift_score: f64,
    /// Gaps the scan found in the generated `value` column.
    pub value_missing: usize,
    pub num_rows: usize,
    pub num_columns: usize,
    pub rows_processed: usize,
    pub columns_dropped: usize,
    pub columns_imputed: usize,
    pub columns_flagged: usize,
    pub output_size: Option<String>,
}

/// Run the scan and heal cycle on generated data.
pub fn run_health_check(config: &EngineConfig) -> Result<HealthCheckReport> {
    let engine = Engine::builder()
        .config(config.clone())
        .build()
        .map_err(|e| HealingError::InvalidConfig(e.to_string()))?;
    info!("Engine initialized in {} mode", engine.execution_mode().as_str());

    let scratch = tempfile::Builder::new()
        .prefix("lex-healing-health-")
        .tempdir()?;
    let input = scratch.path().join("health_check.csv");
    write_sample_table(&input, config.sample_seed)?;
    info!("Created test data: {}", input.display());

    let source = TableSource::path(&input);

    let scan = engine.scan(&source)?;
    info!(
        "Drift score {:.2}% over {} rows, {} columns",
        scan.drift_score * 100.0,
        scan.num_rows,
        scan.num_columns
    );
    ensure(
        (0.0..=1.0).contains(&scan.drift_score),
        format!("drift score {} outside [0, 1]", scan.drift_score),
    )?;
    let value_missing = scan
        .missing_stats
        .column("value")
        .map_or(0, |column| column.count);
    ensure(
        value_missing > 0,
        "scan did not report the gaps written to 'value'",
    )?;

    let log = engine.heal(&source, None)?;
    ensure(
        log.rows_processed == HEALTH_CHECK_ROWS,
        format!(
            "processed {} rows, expected {}",
            log.rows_processed, HEALTH_CHECK_ROWS
        ),
    )?;
    let output_exists = log.output_path.as_deref().is_some_and(Path::exists);
    ensure(output_exists, "cleaned output was not written")?;

    info!("Health check passed");
    Ok(HealthCheckReport {
        execution_mode: engine.execution_mode(),
        drift_score: scan.drift_score,
        value_missing,
        num_rows: scan.num_rows,
        num_columns: scan.num_columns,
        rows_processed: log.rows_processed,
        columns_dropped: log.columns_dropped.len(),
        columns_imputed: log.columns_imputed.len(),
        columns_flagged: log.columns_flagged.len(),
        output_size: log.output_size,
    })
}

fn ensure(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(HealingError::HealthCheck(message.into()))
    }
}

/// `id`, `value` (about 30% empty) and `category` columns.
fn write_sample_table(path: &Path, seed: Option<u64>) -> Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["id", "value", "category"])?;
    for id in 0..HEALTH_CHECK_ROWS {
        let value = if rng.gen_bool(VALUE_NULL_PROBABILITY) {
            String::new()
        } else {
            rng.gen_range(1..=100).to_string()
        };
        let category = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
        writer.write_record([id.to_string().as_str(), value.as_str(), category])?;
    }
    writer.flush()?;
    Ok(())
}
