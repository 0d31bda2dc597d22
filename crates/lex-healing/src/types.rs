use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Scan Types
// ============================================================================

/// Missing-value statistics for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMissing {
    pub column: String,
    pub count: usize,
    /// Null percentage (0 - 100).
    pub percentage: f64,
}

/// Missing-value statistics for a whole table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MissingStats {
    pub total_missing: usize,
    /// Columns with at least one null, in original column order.
    pub columns_with_missing: Vec<ColumnMissing>,
}

impl MissingStats {
    /// Look up the statistics for a column, if it has any nulls.
    pub fn column(&self, name: &str) -> Option<&ColumnMissing> {
        self.columns_with_missing.iter().find(|c| c.column == name)
    }
}

/// Severity band of a drift score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DriftSeverity {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// Operator recommendation for this severity.
    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Critical => {
                "Investigate the data source immediately and consider halting downstream pipelines."
            }
            Self::High => {
                "Review data quality within 24 hours and update the reference dataset if the pattern is valid."
            }
            Self::Medium => "Monitor the trend over the next batches; it may be seasonal variation.",
            Self::Low => "Data quality is within acceptable parameters.",
        }
    }
}

/// Result of a full-table drift scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftResult {
    /// Share of columns with at least one null (0.0 - 1.0).
    pub drift_score: f64,
    pub severity: DriftSeverity,
    /// True when the drift score crosses the critical threshold.
    pub requires_healing: bool,
    pub num_rows: usize,
    pub num_columns: usize,
    pub columns: Vec<String>,
    pub missing_stats: MissingStats,
    /// Diagnostic payload (execution mode, sampling details).
    pub report: serde_json::Value,
}

// ============================================================================
// Healing Types
// ============================================================================

/// A column whose nulls were replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputedColumn {
    pub column: String,
    pub method: String,
    pub value: f64,
}

/// A column left in place but marked for manual review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedColumn {
    pub column: String,
    pub null_percentage: f64,
}

/// A column with nulls that no repair strategy applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedColumn {
    pub column: String,
    pub null_percentage: f64,
    pub reason: String,
}

/// Record of one healing pass.
///
/// Every column that had nulls appears in exactly one of the dropped,
/// imputed, flagged or skipped lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealingLog {
    pub columns_dropped: Vec<String>,
    pub columns_imputed: Vec<ImputedColumn>,
    pub columns_flagged: Vec<FlaggedColumn>,
    pub columns_skipped: Vec<SkippedColumn>,
    /// Row count of the input table.
    pub rows_processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Human-readable size of the written file (e.g. "12.40 KB").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_size: Option<String>,
}

impl HealingLog {
    pub fn new(rows_processed: usize) -> Self {
        Self {
            rows_processed,
            ..Self::default()
        }
    }

    /// True when the pass dropped or imputed nothing.
    pub fn is_noop(&self) -> bool {
        self.columns_dropped.is_empty() && self.columns_imputed.is_empty()
    }

    /// Number of columns touched by any strategy, including advisory flags.
    pub fn columns_handled(&self) -> usize {
        self.columns_dropped.len()
            + self.columns_imputed.len()
            + self.columns_flagged.len()
            + self.columns_skipped.len()
    }
}

// ============================================================================
// Streaming Types
// ============================================================================

/// Analysis of one streaming micro-batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub drift_score: f64,
    pub anomaly_count: usize,
    /// Composite health (0.0 - 1.0), higher is healthier.
    pub health_score: f64,
    pub has_drift_event: bool,
    pub batch_size: usize,
    pub missing_values: usize,
    pub timestamp: DateTime<Utc>,
    pub alert: bool,
    /// Set when the analysis failed and the neutral result was substituted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResult {
    /// Neutral result used when a batch cannot be analyzed.
    pub fn neutral(error: impl Into<String>) -> Self {
        Self {
            drift_score: 0.0,
            anomaly_count: 0,
            health_score: 1.0,
            has_drift_event: false,
            batch_size: 0,
            missing_values: 0,
            timestamp: Utc::now(),
            alert: false,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One entry of the rolling stream history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// 1-based batch number since the last start.
    pub batch_num: usize,
    pub health_score: f64,
    pub drift_score: f64,
    pub anomaly_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_result(batch_num: usize, result: &BatchResult) -> Self {
        Self {
            batch_num,
            health_score: result.health_score,
            drift_score: result.drift_score,
            anomaly_count: result.anomaly_count,
            timestamp: result.timestamp,
        }
    }
}

/// Aggregate over the retained stream history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSummary {
    pub batches: usize,
    pub mean_health_score: f64,
    pub mean_drift_score: f64,
    pub total_anomalies: usize,
    /// Total batches processed since start, including evicted ones.
    pub batches_processed: usize,
    /// Alerts raised since start.
    pub alerts_raised: usize,
}
