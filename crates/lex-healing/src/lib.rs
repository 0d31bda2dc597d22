//! Self-Healing Data Quality Library
//!
//! Detects missing-value drift in tabular data, repairs what can be repaired
//! automatically and monitors streams of micro-batches.
//!
//! # Overview
//!
//! - **Drift Scanning**: share of columns with missing values, severity bands
//!   and per-column missing statistics
//! - **Healing**: drop mostly-empty columns, median-impute numeric columns with
//!   a few gaps, flag the rest for review
//! - **Batch Analysis**: drift, z-score outliers and a composite health score
//!   per micro-batch
//! - **Streaming**: a start/stop controller with a bounded rolling history and
//!   alert callbacks
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_healing::{Engine, ExecutionMode, StreamConfig, TableSource};
//!
//! let engine = Engine::builder()
//!     .execution_mode(ExecutionMode::detect())
//!     .build()?;
//!
//! let source = TableSource::path("data/raw/transactions.csv");
//! let scan = engine.scan(&source)?;
//! println!("Drift: {:.1}% ({})", scan.drift_score * 100.0, scan.severity.display_name());
//!
//! if scan.requires_healing {
//!     let log = engine.heal(&source, None)?;
//!     println!("Dropped: {:?}", log.columns_dropped);
//! }
//!
//! let summary = engine
//!     .synthetic_stream(StreamConfig::default())?
//!     .on_alert(|alert| println!("ALERT {}", alert.summary()))
//!     .run()?;
//! println!("Mean health: {:.2}", summary.mean_health_score);
//! ```
//!
//! # Execution Mode
//!
//! [`ExecutionMode`] is resolved once from the environment and passed in
//! through [`EngineConfig`]. In local mode scans of files on disk read a
//! reservoir sample instead of the whole file.

pub mod config;
pub mod engine;
pub mod error;
pub mod healing;
pub mod health;
pub mod imputers;
pub mod loader;
pub mod quality;
pub mod stream;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{
    ConfigValidationError, EngineConfig, EngineConfigBuilder, ExecutionMode, StreamConfig,
    StreamConfigBuilder,
};
pub use engine::{Engine, EngineBuilder};
pub use error::{HealingError, Result as HealingResult, ResultExt};
pub use healing::HealingEngine;
pub use health::{HealthCheckReport, run_health_check};
pub use imputers::StatisticalImputer;
pub use loader::{LoadedTable, ReservoirSampler, TableLoader, TableSource};
pub use quality::{DriftScorer, MissingValueAnalyzer};
pub use stream::{
    AlertReason, AlertSink, Batch, BatchAnalyzer, BatchSource, ClosureAlertSink, StopToken,
    StreamAlert, StreamController, StreamHistory, StreamState, SyntheticBatchSource,
    TableReplaySource,
};
pub use types::{
    BatchResult, ColumnMissing, DriftResult, DriftSeverity, FlaggedColumn, HealingLog,
    HistoryEntry, ImputedColumn, MissingStats, SkippedColumn, StreamSummary,
};
pub use utils::{format_bytes, is_numeric_dtype};
