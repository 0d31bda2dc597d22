//! The configured entry point for scans, healing and streaming.

use crate::config::{ConfigValidationError, EngineConfig, ExecutionMode, StreamConfig};
use crate::error::{Result, ResultExt};
use crate::healing::HealingEngine;
use crate::loader::{TableLoader, TableSource};
use crate::quality::{DriftScorer, MissingValueAnalyzer};
use crate::stream::{Batch, BatchAnalyzer, BatchSource, StreamController, SyntheticBatchSource};
use crate::types::{BatchResult, DriftResult, HealingLog};
use polars::prelude::*;
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

/// Self-healing data quality engine.
///
/// Use [`Engine::builder()`] to create an engine with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use lex_healing::{Engine, ExecutionMode, TableSource};
///
/// let engine = Engine::builder()
///     .execution_mode(ExecutionMode::detect())
///     .build()?;
///
/// let scan = engine.scan(&TableSource::path("data/raw/sales.csv"))?;
/// if scan.requires_healing {
///     let log = engine.heal(&TableSource::path("data/raw/sales.csv"), None)?;
///     println!("Dropped {:?}", log.columns_dropped);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    loader: TableLoader,
    scorer: DriftScorer,
    healer: HealingEngine,
    analyzer: BatchAnalyzer,
}

static_assertions::assert_impl_all!(Engine: Send, Sync);

impl Engine {
    /// Create a new engine builder.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.config.execution_mode
    }

    /// Memory budget hint for the current execution mode.
    pub fn memory_limit_mb(&self) -> u64 {
        self.config.execution_mode.memory_limit_mb()
    }

    /// Read every row of a table.
    pub fn load_table(&self, source: &TableSource) -> Result<DataFrame> {
        self.loader.load_full(source)
    }

    /// Scan a table for drift.
    ///
    /// In local mode path sources are sampled; see [`TableLoader`].
    pub fn scan(&self, source: &TableSource) -> Result<DriftResult> {
        let loaded = self
            .loader
            .load_for_scan(source)
            .context("During drift scan")?;

        let mut result = self.scan_frame(&loaded.data);
        if let Some(report) = result.report.as_object_mut() {
            report.insert("sampled".to_string(), json!(loaded.sampled));
            report.insert("source_rows".to_string(), json!(loaded.source_rows));
        }

        if result.requires_healing {
            warn!(
                "Critical drift: {:.1}% of columns have missing values",
                result.drift_score * 100.0
            );
        }
        Ok(result)
    }

    /// Scan an already loaded table.
    pub fn scan_frame(&self, df: &DataFrame) -> DriftResult {
        let drift_score = DriftScorer::score(df);
        let severity = self.scorer.classify(drift_score);
        let missing_stats = MissingValueAnalyzer::analyze(df);

        info!(
            "Drift score {:.3} ({}) over {} rows, {} columns",
            drift_score,
            severity.display_name(),
            df.height(),
            df.width()
        );

        DriftResult {
            drift_score,
            severity,
            requires_healing: self.scorer.requires_healing(drift_score),
            num_rows: df.height(),
            num_columns: df.width(),
            columns: df
                .get_column_names()
                .iter()
                .map(|name| name.to_string())
                .collect(),
            missing_stats,
            report: json!({
                "execution_mode": self.config.execution_mode.as_str(),
                "memory_limit_mb": self.memory_limit_mb(),
                "severity": severity,
                "recommendation": severity.recommendation(),
                "sampled": false,
                "source_rows": df.height(),
            }),
        }
    }

    /// Heal a table and write the cleaned copy.
    ///
    /// Always reads the full table. The output lands at `output` when given,
    /// otherwise next to the source as `<stem>_cleaned.csv`.
    pub fn heal(&self, source: &TableSource, output: Option<&Path>) -> Result<HealingLog> {
        let df = self
            .loader
            .load_full(source)
            .context("During healing")?;
        let (_, log) = self
            .healer
            .heal_and_persist(df, source.as_path(), output)?;
        Ok(log)
    }

    /// Heal a table in memory without writing it.
    pub fn heal_frame(&self, df: DataFrame) -> Result<(DataFrame, HealingLog)> {
        self.healer.heal_frame(df)
    }

    /// Analyze one streaming batch. Never fails; see [`BatchAnalyzer::analyze`].
    pub fn analyze_batch(&self, batch: &Batch) -> BatchResult {
        self.analyzer.analyze(batch)
    }

    /// Build a stream controller over any batch source.
    pub fn stream_controller<S: BatchSource>(
        &self,
        source: S,
        config: StreamConfig,
    ) -> Result<StreamController<S>> {
        StreamController::new(source, self.analyzer.clone(), config)
    }

    /// Build a stream controller over synthetic transaction batches.
    pub fn synthetic_stream(
        &self,
        config: StreamConfig,
    ) -> Result<StreamController<SyntheticBatchSource>> {
        let source = SyntheticBatchSource::new(&config)?;
        self.stream_controller(source, config)
    }
}

/// Builder for [`Engine`].
#[derive(Debug, Default)]
pub struct EngineBuilder {
    config: Option<EngineConfig>,
    execution_mode: Option<ExecutionMode>,
}

impl EngineBuilder {
    /// Set the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the execution mode of the configuration.
    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = Some(mode);
        self
    }

    /// Build the engine.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Engine, ConfigValidationError> {
        let mut config = self.config.unwrap_or_default();
        if let Some(mode) = self.execution_mode {
            config.execution_mode = mode;
        }
        config.validate()?;

        Ok(Engine {
            loader: TableLoader::new(&config),
            scorer: DriftScorer::new(&config),
            healer: HealingEngine::new(&config),
            analyzer: BatchAnalyzer::new(&config),
            config,
        })
    }
}
