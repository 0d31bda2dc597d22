//! Per-batch quality analysis.

use super::signals::AlertReason;
use super::source::Batch;
use crate::config::EngineConfig;
use crate::error::{HealingError, Result, ResultExt};
use crate::quality::{DriftScorer, MissingValueAnalyzer};
use crate::types::BatchResult;
use crate::utils::{is_numeric_dtype, mean, numeric_values, sample_std};
use chrono::Utc;
use polars::prelude::*;
use tracing::warn;

/// Scores a micro-batch for drift, outliers and overall health.
#[derive(Debug, Clone)]
pub struct BatchAnalyzer {
    z_threshold: f64,
    anomaly_weight: f64,
    critical_drift_threshold: f64,
    health_alert_threshold: f64,
}

impl Default for BatchAnalyzer {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl BatchAnalyzer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            z_threshold: config.anomaly_z_threshold,
            anomaly_weight: config.anomaly_weight,
            critical_drift_threshold: config.critical_drift_threshold,
            health_alert_threshold: config.health_alert_threshold,
        }
    }

    /// Analyze a batch, substituting a neutral result on failure.
    pub fn analyze(&self, batch: &Batch) -> BatchResult {
        match self.try_analyze(batch) {
            Ok(result) => result,
            Err(e) => {
                warn!("Batch analysis failed, using neutral result: {}", e);
                BatchResult::neutral(e.to_string())
            }
        }
    }

    /// Analyze a batch, propagating computation errors.
    pub fn try_analyze(&self, batch: &Batch) -> Result<BatchResult> {
        let df = &batch.data;
        let batch_size = df.height();

        let drift_score = DriftScorer::score(df);
        let anomaly_count = self.count_anomalies(df)?;
        let missing_values = MissingValueAnalyzer::analyze(df).total_missing;
        let health_score = self.health_score(drift_score, anomaly_count, batch_size);
        let alert = !self
            .alert_reasons(batch.has_drift_event, drift_score, health_score)
            .is_empty();

        Ok(BatchResult {
            drift_score,
            anomaly_count,
            health_score,
            has_drift_event: batch.has_drift_event,
            batch_size,
            missing_values,
            timestamp: Utc::now(),
            alert,
            error: None,
        })
    }

    /// Count numeric cells more than `z_threshold` sample standard deviations
    /// from their column mean.
    ///
    /// Columns with fewer than two values or zero spread contribute nothing.
    /// A numeric column holding NaN or infinite values has no meaningful
    /// mean or spread and fails the analysis.
    pub fn count_anomalies(&self, df: &DataFrame) -> Result<usize> {
        let mut count = 0;

        for column in df.get_columns() {
            if !is_numeric_dtype(column.dtype()) || column.len() < 2 {
                continue;
            }

            let values = numeric_values(column.as_materialized_series())
                .context(format!("Reading '{}'", column.name()))?;
            if values.iter().any(|v| !v.is_finite()) {
                return Err(HealingError::Compute(format!(
                    "column '{}' holds non-finite values",
                    column.name()
                )));
            }
            let (Some(center), Some(std)) = (mean(&values), sample_std(&values)) else {
                continue;
            };
            if std == 0.0 {
                continue;
            }

            count += values
                .iter()
                .filter(|v| ((*v - center).abs() / std) > self.z_threshold)
                .count();
        }

        Ok(count)
    }

    /// `1 - (drift + anomaly_rate * weight)`, clamped to `[0, 1]`.
    pub fn health_score(&self, drift_score: f64, anomaly_count: usize, batch_size: usize) -> f64 {
        let anomaly_rate = if batch_size == 0 {
            0.0
        } else {
            anomaly_count as f64 / batch_size as f64
        };
        (1.0 - (drift_score + anomaly_rate * self.anomaly_weight)).clamp(0.0, 1.0)
    }

    /// Every condition that makes a batch alert-worthy.
    pub fn alert_reasons(
        &self,
        has_drift_event: bool,
        drift_score: f64,
        health_score: f64,
    ) -> Vec<AlertReason> {
        let mut reasons = Vec::new();
        if has_drift_event {
            reasons.push(AlertReason::DriftEvent);
        }
        if drift_score > self.critical_drift_threshold {
            reasons.push(AlertReason::CriticalDrift);
        }
        if health_score < self.health_alert_threshold {
            reasons.push(AlertReason::LowHealth);
        }
        reasons
    }

    /// Reasons behind an already computed result.
    pub fn reasons_for(&self, result: &BatchResult) -> Vec<AlertReason> {
        self.alert_reasons(result.has_drift_event, result.drift_score, result.health_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_variance_has_no_anomalies() {
        let df = df!["flat" => [5.0; 30]].unwrap();
        assert_eq!(BatchAnalyzer::default().count_anomalies(&df).unwrap(), 0);
    }

    #[test]
    fn test_single_outlier_is_counted() {
        let mut values = vec![10.0; 49];
        values.push(1000.0);
        let df = df![
            "amount" => values,
            "label" => vec!["x"; 50],
        ]
        .unwrap();

        let result = BatchAnalyzer::default().analyze(&Batch::new(df));

        assert_eq!(result.anomaly_count, 1);
        assert_eq!(result.batch_size, 50);
        assert_eq!(result.drift_score, 0.0);
        assert!((result.health_score - (1.0 - 0.01)).abs() < 1e-12);
        assert!(!result.alert);
    }

    #[test]
    fn test_single_row_columns_are_skipped() {
        let df = df!["a" => [1.0]].unwrap();
        assert_eq!(BatchAnalyzer::default().count_anomalies(&df).unwrap(), 0);
    }

    #[test]
    fn test_health_score_formula() {
        let analyzer = BatchAnalyzer::default();
        assert_eq!(analyzer.health_score(0.0, 0, 50), 1.0);
        assert!((analyzer.health_score(0.2, 10, 50) - 0.7).abs() < 1e-12);
        assert_eq!(analyzer.health_score(0.9, 50, 50), 0.0);
        assert_eq!(analyzer.health_score(0.25, 7, 0), 0.75);
    }

    #[test]
    fn test_alert_conditions() {
        let analyzer = BatchAnalyzer::default();
        assert!(analyzer.alert_reasons(false, 0.0, 1.0).is_empty());
        assert_eq!(
            analyzer.alert_reasons(true, 0.0, 1.0),
            vec![AlertReason::DriftEvent]
        );
        assert_eq!(
            analyzer.alert_reasons(false, 0.4, 0.65),
            vec![AlertReason::CriticalDrift, AlertReason::LowHealth]
        );
        assert!(analyzer.alert_reasons(false, 0.3, 0.7).is_empty());
    }

    #[test]
    fn test_drift_event_passes_through() {
        let df = df!["a" => [1.0, 2.0, 3.0]].unwrap();
        let result = BatchAnalyzer::default().analyze(&Batch::with_drift_event(df));
        assert!(result.has_drift_event);
        assert!(result.alert);
    }

    #[test]
    fn test_missing_values_raise_drift() {
        let df = df![
            "a" => [Some(1.0), None, Some(3.0)],
            "b" => [Some("x"), Some("y"), None],
            "c" => [1, 2, 3],
        ]
        .unwrap();
        let result = BatchAnalyzer::default().analyze(&Batch::new(df));
        assert!((result.drift_score - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(result.missing_values, 2);
        assert!(result.alert);
    }

    #[test]
    fn test_empty_batch() {
        let result = BatchAnalyzer::default().analyze(&Batch::new(DataFrame::empty()));
        assert_eq!(result.batch_size, 0);
        assert_eq!(result.health_score, 1.0);
        assert!(!result.is_error());
    }

    #[test]
    fn test_non_finite_values_yield_neutral_result() {
        let df = df![
            "amount" => [Some(1.0), None, Some(f64::INFINITY), Some(4.0)],
            "label" => [Some("x"), None, Some("y"), Some("z")],
        ]
        .unwrap();
        let batch = Batch::with_drift_event(df);
        let analyzer = BatchAnalyzer::default();

        let err = analyzer.try_analyze(&batch).unwrap_err();
        assert_eq!(err.error_code(), "COMPUTE_ERROR");

        let result = analyzer.analyze(&batch);
        assert_eq!(result.health_score, 1.0);
        assert_eq!(result.drift_score, 0.0);
        assert_eq!(result.batch_size, 0);
        assert!(!result.alert);
        assert!(result.error.as_deref().unwrap().contains("amount"));
    }

    #[test]
    fn test_nan_values_fail_analysis() {
        let df = df!["a" => [1.0, f64::NAN, 3.0]].unwrap();
        assert!(BatchAnalyzer::default().count_anomalies(&df).is_err());
    }

    #[test]
    fn test_neutral_result_does_not_alert() {
        let result = BatchResult::neutral(HealingError::Compute("boom".into()).to_string());
        assert!(BatchAnalyzer::default().reasons_for(&result).is_empty());
    }
}
