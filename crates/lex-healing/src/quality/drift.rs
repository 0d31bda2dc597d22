//! Drift scoring.
//!
//! The drift score is the share of columns with at least one missing value.
//! It is a structural-missingness proxy for distributional drift, not a
//! statistical distance between a reference and a current dataset: it only
//! says how widely missingness has spread across the schema.

use crate::config::EngineConfig;
use crate::types::DriftSeverity;
use polars::prelude::*;

/// Converts per-column missingness into a scalar score and severity.
#[derive(Debug, Clone)]
pub struct DriftScorer {
    watch_threshold: f64,
    critical_threshold: f64,
    severe_threshold: f64,
}

impl Default for DriftScorer {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl DriftScorer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            watch_threshold: config.watch_drift_threshold,
            critical_threshold: config.critical_drift_threshold,
            severe_threshold: config.severe_drift_threshold,
        }
    }

    /// Share of columns with at least one null, in `[0, 1]`.
    ///
    /// A table without columns scores 0.0.
    pub fn score(df: &DataFrame) -> f64 {
        let width = df.width();
        if width == 0 {
            return 0.0;
        }
        let affected = df
            .get_columns()
            .iter()
            .filter(|column| column.null_count() > 0)
            .count();
        affected as f64 / width as f64
    }

    /// Severity band for a score.
    pub fn classify(&self, drift_score: f64) -> DriftSeverity {
        if drift_score > self.severe_threshold {
            DriftSeverity::Critical
        } else if drift_score > self.critical_threshold {
            DriftSeverity::High
        } else if drift_score > self.watch_threshold {
            DriftSeverity::Medium
        } else {
            DriftSeverity::Low
        }
    }

    /// Whether a score should trigger automatic healing.
    pub fn requires_healing(&self, drift_score: f64) -> bool {
        drift_score > self.critical_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_counts_columns_with_nulls() {
        let df = df![
            "a" => [Some(1.0), None, Some(3.0)],
            "b" => [Some(1), Some(2), Some(3)],
            "c" => [Some("x"), Some("y"), None],
            "d" => [1.0, 2.0, 3.0],
        ]
        .unwrap();

        assert_eq!(DriftScorer::score(&df), 0.5);
    }

    #[test]
    fn test_score_is_zero_without_nulls_or_columns() {
        let clean = df!["a" => [1, 2], "b" => ["x", "y"]].unwrap();
        assert_eq!(DriftScorer::score(&clean), 0.0);
        assert_eq!(DriftScorer::score(&DataFrame::empty()), 0.0);
    }

    #[test]
    fn test_score_is_one_when_every_column_has_nulls() {
        let df = df![
            "a" => [None, Some(1.0)],
            "b" => [Some("x"), None],
        ]
        .unwrap();
        assert_eq!(DriftScorer::score(&df), 1.0);
    }

    #[test]
    fn test_classify_bands() {
        let scorer = DriftScorer::default();
        assert_eq!(scorer.classify(0.0), DriftSeverity::Low);
        assert_eq!(scorer.classify(0.1), DriftSeverity::Low);
        assert_eq!(scorer.classify(0.2), DriftSeverity::Medium);
        assert_eq!(scorer.classify(0.3), DriftSeverity::Medium);
        assert_eq!(scorer.classify(0.4), DriftSeverity::High);
        assert_eq!(scorer.classify(0.5), DriftSeverity::High);
        assert_eq!(scorer.classify(0.75), DriftSeverity::Critical);
    }

    #[test]
    fn test_requires_healing_uses_configured_threshold() {
        let scorer = DriftScorer::default();
        assert!(!scorer.requires_healing(0.3));
        assert!(scorer.requires_healing(0.34));

        let strict = DriftScorer::new(
            &EngineConfig::builder()
                .critical_drift_threshold(0.2)
                .build()
                .unwrap(),
        );
        assert!(strict.requires_healing(0.25));
    }
}
